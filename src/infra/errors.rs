// src/infra/errors.rs — Error types for parley

use thiserror::Error;

use crate::agent::RunStatus;
use crate::core::Turn;

#[derive(Error, Debug)]
pub enum ParleyError {
    // Transport errors (retriable when flagged)
    #[error("Agent request '{operation}' failed: {message}")]
    Submission {
        operation: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by agent service, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    // Job outcomes (not retried)
    #[error("Agent run {run_id} ended as {status}: {reason}")]
    JobFailed {
        run_id: String,
        status: RunStatus,
        reason: String,
        last_reply: Option<String>,
        /// Thread history fetched after the failure, oldest first. Empty when
        /// it could not be fetched.
        history: Vec<Turn>,
    },

    #[error("Agent run {run_id} still pending after {waited_ms}ms, abandoned")]
    Timeout { run_id: String, waited_ms: u64 },

    #[error("Stopped waiting for agent run {run_id}")]
    Cancelled { run_id: String },

    #[error("Earlier agent run {run_id} did not finish in time and was given up; your message was not sent")]
    PreviousRunPending { run_id: String },

    // User errors
    #[error("Message is empty")]
    EmptyTurn,

    #[error("No text could be extracted from {file}")]
    ExtractionEmpty { file: String },

    #[error("Unsupported file type for {file}: {media_type} (expected txt, pdf, png, jpg, jpeg)")]
    UnsupportedFileType { file: String, media_type: String },

    #[error("File {file} is {size} bytes, limit is {limit}")]
    FileTooLarge { file: String, size: u64, limit: u64 },

    #[error("Could not extract text from {file}: {message}")]
    Extraction { file: String, message: String },

    #[error("No API key found. Set ${env_var} or run `parley login`.")]
    NoCredentials { env_var: String },

    // Infra
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParleyError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ParleyError::Submission {
                retriable: true,
                ..
            } | ParleyError::RateLimited { .. }
        )
    }

    /// Errors shown to the user as a warning; the chat carries on.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            ParleyError::ExtractionEmpty { .. }
                | ParleyError::UnsupportedFileType { .. }
                | ParleyError::FileTooLarge { .. }
                | ParleyError::EmptyTurn
        )
    }
}
