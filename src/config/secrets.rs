//! Workspace secrets loading
//!
//! Secrets for a workspace come from two places:
//! - a `.env` style file referenced by `secrets_file`
//! - inline `secrets` in the config file, which win on conflict

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Failed to read env file {0}: {1}")]
    EnvFileRead(String, String),

    #[error("Failed to parse env file {0}: {1}")]
    EnvFileParse(String, String),
}

/// Load all `KEY=VALUE` pairs from an env file.
///
/// Values are taken literally; nothing is exported into the process
/// environment.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>, SecretError> {
    let display = path.display().to_string();
    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| SecretError::EnvFileRead(display.clone(), e.to_string()))?;

    let mut values = HashMap::new();
    for item in iter {
        let (key, value) =
            item.map_err(|e| SecretError::EnvFileParse(display.clone(), e.to_string()))?;
        values.insert(key, value);
    }
    Ok(values)
}

/// Merge file-provided secrets with inline ones. Inline values override.
pub fn merge_secrets(
    mut from_file: HashMap<String, String>,
    inline: &HashMap<String, String>,
) -> HashMap<String, String> {
    for (key, value) in inline {
        from_file.insert(key.clone(), value.clone());
    }
    from_file
}
