//! Broker password from the environment: `FILEQUEUE_BROKER_PASSWORD` → `.env` in the working dir.

use log::debug;
use std::path::Path;

const PASSWORD_SUFFIX: &str = "BROKER_PASSWORD";

fn read_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Password from env, falling back to a `.env` file in `dir`. `None` keeps the lower layers' value.
pub fn broker_password_from_env(dir: &Path) -> Option<String> {
    let key = crate::utils::config::PackagePaths::get().env_var(PASSWORD_SUFFIX);
    if let Some(s) = read_env(&key) {
        debug!("Broker password taken from {}", key);
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        if let Some(s) = read_env(&key) {
            debug!("Broker password taken from {}", env_path.display());
            return Some(s);
        }
    }
    None
}
