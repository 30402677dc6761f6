// src/cli/login.rs — Store the API key

use std::io::{self, BufRead, Write};

use crate::infra::{credentials, paths};

/// Read a key from stdin and save it under the credentials directory.
pub async fn run_login() -> anyhow::Result<()> {
    eprint!("API key: ");
    io::stderr().flush().ok();

    let mut key = String::new();
    io::stdin().lock().read_line(&mut key)?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("No key entered");
    }

    credentials::save_credential(key).await?;
    eprintln!("Saved to {}", paths::credentials_dir().display());
    Ok(())
}
