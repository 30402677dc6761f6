// src/infra/paths.rs — Config and data locations
//
// PARLEY_HOME overrides everything: config and data both live under it.
// Otherwise config is ~/.parley/ and data follows XDG_DATA_HOME/parley.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;

fn parley_home() -> Option<PathBuf> {
    std::env::var_os("PARLEY_HOME").map(PathBuf::from)
}

/// Home directory, or the current directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $PARLEY_HOME/ or ~/.parley/
pub fn config_dir() -> PathBuf {
    if let Some(home) = parley_home() {
        return home;
    }
    dirs_home().join(".parley")
}

/// Data directory: $PARLEY_HOME/data/ or ~/.local/share/parley/
pub fn data_dir() -> PathBuf {
    if let Some(home) = parley_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "parley") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn credentials_dir() -> PathBuf {
    config_dir().join("credentials")
}

/// Exported transcripts
pub fn transcripts_dir() -> PathBuf {
    data_dir().join("transcripts")
}
