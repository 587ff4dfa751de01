//! Config path resolution helpers.

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "rollout.toml";

pub fn config_path_for(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILE_NAME)
}
