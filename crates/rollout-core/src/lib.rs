//! Rollout Core Library
//!
//! Provides the deployment logic behind the `rollout` binary: matching push
//! events against a trigger, resolving connection secrets, rendering the
//! remote deployment script and running it over an SSH session.

pub mod config;
pub mod context;
pub mod deploy;
pub mod history;
pub mod lock;
pub mod remote;
pub mod script;
pub mod secrets;
pub mod trigger;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{
        ConfigStore, HistoryConfig, RemoteConfig, RolloutConfig, ScriptConfig, TriggerConfig,
    };

    // Context
    pub use crate::context::AppContext;

    // Deployment
    pub use crate::deploy::{DeployOptions, DeployReport, DeployStatus, Deployer};

    // Remote execution
    pub use crate::remote::{LocalSession, RemoteSession, SessionError, SessionOutput, SshSession};

    // Script
    pub use crate::script::{DeployScript, Step};

    // Secrets
    pub use crate::secrets::{Identity, RemoteTarget};

    // Trigger
    pub use crate::trigger::{PushEvent, SkipReason, TriggerDecision};
}
