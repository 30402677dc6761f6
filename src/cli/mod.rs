// src/cli/mod.rs — CLI definition (clap derive) and session bootstrap

pub mod ask;
pub mod chat;
pub mod extract;
pub mod login;
pub mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::agent::openai::OpenAIAssistants;
use crate::agent::retry::{RetryConfig, RetryService};
use crate::agent::{AgentService, AgentSession};
use crate::core::RenderOrder;
use crate::extract::Extractor;
use crate::infra::config::Config;
use crate::infra::{credentials, paths};

#[derive(Parser)]
#[command(name = "parley", about = "Chat with a hosted assistant from the terminal", version)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Assistant id (overrides PARLEY_ASSISTANT_ID and config)
    #[arg(short, long, global = true)]
    pub assistant: Option<String>,

    /// Seconds to wait for one agent reply before giving up
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Show the newest messages first in /history
    #[arg(long, global = true)]
    pub newest_first: bool,

    /// Suppress progress output (only emit replies)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat session (default)
    Chat,
    /// Send one message and print the reply
    Ask {
        /// Attach text extracted from a file (txt, pdf, png, jpg)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Message text
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
    /// Print the text that would be sent for a file
    Extract {
        path: PathBuf,
    },
    /// Store an API key (read from stdin)
    Login,
}

impl Cli {
    /// Render order after applying `--newest-first` over the config value.
    pub fn render_order(&self, config: &Config) -> RenderOrder {
        if self.newest_first {
            RenderOrder::NewestFirst
        } else {
            config.transcript.order
        }
    }
}

/// Pick the assistant id: flag, then environment, then config.
pub fn resolve_assistant_id(
    flag: Option<&str>,
    env: Option<&str>,
    config: Option<&str>,
) -> Option<String> {
    [flag, env, config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|id| !id.is_empty())
        .map(str::to_string)
}

/// File-to-text extraction as configured in `[extract]`.
pub fn build_extractor(config: &Config) -> Extractor {
    Extractor::from_config(&config.extract)
}

/// Build the agent service stack and open a session on a fresh thread.
pub async fn open_session(config: &Config, cli: &Cli) -> anyhow::Result<AgentSession> {
    let env_assistant = std::env::var("PARLEY_ASSISTANT_ID").ok();
    let assistant_id = resolve_assistant_id(
        cli.assistant.as_deref(),
        env_assistant.as_deref(),
        config.agent.assistant_id.as_deref(),
    )
    .ok_or_else(|| {
        anyhow::anyhow!(
            "No assistant configured. Pass --assistant, set PARLEY_ASSISTANT_ID, or set agent.assistant_id in {}",
            paths::config_file_path().display()
        )
    })?;

    let api_key = credentials::resolve_api_key(&config.agent.api_key_env).await?;
    let http = OpenAIAssistants::with_base_url(
        api_key,
        config.agent.base_url.clone(),
        Duration::from_secs(config.agent.request_timeout_seconds),
    )?;
    let service: Arc<dyn AgentService> = Arc::new(RetryService::with_config(
        Arc::new(http),
        RetryConfig::from(&config.retry),
    ));

    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.polling.timeout());

    let session =
        AgentSession::open(service, &assistant_id, config.polling.interval(), timeout).await?;
    Ok(if cli.quiet {
        session
    } else {
        session.with_progress(progress::terminal_progress())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_id_precedence() {
        assert_eq!(
            resolve_assistant_id(Some("asst_flag"), Some("asst_env"), Some("asst_cfg")),
            Some("asst_flag".into())
        );
        assert_eq!(
            resolve_assistant_id(None, Some("asst_env"), Some("asst_cfg")),
            Some("asst_env".into())
        );
        assert_eq!(
            resolve_assistant_id(None, Some("  "), Some("asst_cfg")),
            Some("asst_cfg".into())
        );
        assert_eq!(resolve_assistant_id(None, None, None), None);
    }

    #[tokio::test]
    async fn test_build_extractor_applies_upload_limit() {
        let mut config = Config::default();
        config.extract.max_upload_mb = 0;
        let extractor = build_extractor(&config);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "hi").unwrap();
        let err = extractor.extract_file(&path).await.unwrap_err();
        assert!(matches!(
            err,
            crate::infra::errors::ParleyError::FileTooLarge { limit: 0, .. }
        ));
    }

    #[test]
    fn test_parse_ask_with_file() {
        let cli = Cli::parse_from(["parley", "ask", "--file", "menu.pdf", "what", "is", "this?"]);
        match cli.command {
            Some(Commands::Ask { file, message }) => {
                assert_eq!(file, Some(PathBuf::from("menu.pdf")));
                assert_eq!(message, vec!["what", "is", "this?"]);
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["parley", "chat", "--newest-first", "--timeout", "30"]);
        assert!(cli.newest_first);
        assert_eq!(cli.timeout, Some(30));
        assert_eq!(cli.render_order(&Config::default()), RenderOrder::NewestFirst);
    }

    #[test]
    fn test_no_subcommand_defaults_to_none() {
        let cli = Cli::parse_from(["parley"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.render_order(&Config::default()), RenderOrder::OldestFirst);
    }
}
