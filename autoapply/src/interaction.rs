//! The human channel.
//!
//! Mid-flow questions (work authorization, salary, captcha text, OTP
//! codes, password-reset links) are routed through this trait back to the
//! same chat that started the run. The Telegram dispatcher in the bot
//! crate implements it; tests use canned fakes.

use async_trait::async_trait;

use crate::error::InteractionError;

/// Structured reply to a free-text question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeTextReply {
    /// Stable question identifier.
    pub question_id: String,
    /// The user's reply, trimmed.
    pub text: String,
}

/// Structured reply to a choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceReply {
    /// Stable question identifier.
    pub question_id: String,
    /// Selected option literals, in option order.
    pub selected: Vec<String>,
}

/// High-level user interaction abstraction (e.g. a Telegram chat).
///
/// Every method suspends the caller until the transport has delivered
/// (and, for questions, until the human has answered).
#[async_trait]
pub trait UserInteraction: Send + Sync {
    /// One-way informational message. No reply expected.
    async fn send_info(&self, message: &str) -> Result<(), InteractionError>;

    /// Ask a free-text question and block until the next reply arrives.
    async fn ask_free_text(
        &self,
        question_id: &str,
        prompt: &str,
    ) -> Result<FreeTextReply, InteractionError>;

    /// Ask a choice question.
    ///
    /// Resolution contract: a reply equal to an option literal picks it;
    /// with `allow_multiple`, the reply is comma-split and intersected
    /// with the option set; anything else defaults to option 0.
    async fn ask_choice(
        &self,
        question_id: &str,
        prompt: &str,
        options: &[String],
        allow_multiple: bool,
    ) -> Result<ChoiceReply, InteractionError>;

    /// Send an image with a caption and block for a text reply.
    async fn send_image_and_ask_text(
        &self,
        question_id: &str,
        image: &[u8],
        prompt: &str,
    ) -> Result<FreeTextReply, InteractionError>;
}
