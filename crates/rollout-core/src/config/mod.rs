//! Configuration for rollout.toml
//!
//! A project carries a single `rollout.toml` next to its sources. Every
//! section is optional; missing values fall back to the defaults of the
//! deployment procedure (push to `main`, `.venv`, `requirements.txt`,
//! `python app.py -d`).

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_rollout_toml, parse_rollout_toml_str, to_toml};
pub use paths::{CONFIG_FILE_NAME, config_path_for};
pub use schema::{HistoryConfig, RemoteConfig, RolloutConfig, ScriptConfig, TriggerConfig};
pub use store::ConfigStore;
