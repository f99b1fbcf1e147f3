//! Text-completion oracle used for ranking candidates and rewriting criteria

use crate::error::AppResult;

pub mod openai;

pub use openai::OpenAiOracle;

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Best-effort free-text generation.
///
/// Responses carry no structural guarantee; callers parse and validate.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> AppResult<String>;
}
