// src/core/mod.rs — Conversation model

pub mod transcript;
pub mod types;

pub use transcript::{RenderOrder, Transcript};
pub use types::{Role, Turn};
