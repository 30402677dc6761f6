// src/infra/credentials.rs — API key lookup and storage

use anyhow::Result;
use std::path::Path;

use crate::infra::errors::ParleyError;
use crate::infra::paths;

const KEY_FILE: &str = "openai.key";

/// Resolve the API key: environment variable first, then the stored key file.
pub async fn resolve_api_key(env_var: &str) -> Result<String, ParleyError> {
    if let Ok(key) = std::env::var(env_var) {
        let key = key.trim().to_string();
        if !key.is_empty() {
            tracing::debug!(env_var, "Using API key from environment");
            return Ok(key);
        }
    }
    match load_credential_from(&paths::credentials_dir()).await {
        Some(key) => Ok(key),
        None => Err(ParleyError::NoCredentials {
            env_var: env_var.to_string(),
        }),
    }
}

/// Save the API key. File is chmod 600, directory is chmod 700.
pub async fn save_credential(key: &str) -> Result<()> {
    save_credential_to(&paths::credentials_dir(), key).await
}

async fn save_credential_to(dir: &Path, key: &str) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let key_path = dir.join(KEY_FILE);
    tokio::fs::write(&key_path, key.trim()).await?;

    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, Permissions::from_mode(0o700)).await?;
        tokio::fs::set_permissions(&key_path, Permissions::from_mode(0o600)).await?;
    }

    Ok(())
}

async fn load_credential_from(dir: &Path) -> Option<String> {
    tokio::fs::read_to_string(dir.join(KEY_FILE))
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
