use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transcript::DialogTranscript;

/// Lowest rating accepted by the backend.
pub const MIN_RATING: u8 = 1;
/// Highest rating accepted by the backend.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Error)]
/// Enumerates failures surfaced by the chat transport.
pub enum ChatTransportError {
    #[error("invalid chat client config: {0}")]
    InvalidConfig(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("chat backend returned non-success status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("rating {0} is outside the 1..=5 scale")]
    InvalidRating(u8),
}

/// One user utterance sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub user_id: String,
    pub payload: String,
}

/// Bot reply returned for a [`ChatRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub dialog_id: String,
    pub utt_id: String,
    pub user_id: String,
    pub response: String,
    #[serde(default)]
    pub active_skill: String,
}

/// Whole-dialog rating on the backend's 1..=5 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogRating {
    pub user_id: String,
    pub dialog_id: String,
    pub rating: u8,
}

impl DialogRating {
    pub fn new(
        user_id: impl Into<String>,
        dialog_id: impl Into<String>,
        rating: u8,
    ) -> Result<Self, ChatTransportError> {
        Ok(Self {
            user_id: user_id.into(),
            dialog_id: dialog_id.into(),
            rating: ensure_rating(rating)?,
        })
    }

    /// Converts a zero-based star index from the rating widget.
    pub fn from_star_index(
        user_id: impl Into<String>,
        dialog_id: impl Into<String>,
        star_index: u8,
    ) -> Result<Self, ChatTransportError> {
        let rating = star_index
            .checked_add(1)
            .ok_or(ChatTransportError::InvalidRating(star_index))?;
        Self::new(user_id, dialog_id, rating)
    }
}

/// Rating of a single bot utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceRating {
    pub user_id: String,
    pub dialog_id: String,
    pub utt_id: String,
    pub rating: u8,
}

impl UtteranceRating {
    pub fn new(
        user_id: impl Into<String>,
        dialog_id: impl Into<String>,
        utt_id: impl Into<String>,
        rating: u8,
    ) -> Result<Self, ChatTransportError> {
        Ok(Self {
            user_id: user_id.into(),
            dialog_id: dialog_id.into(),
            utt_id: utt_id.into(),
            rating: ensure_rating(rating)?,
        })
    }
}

fn ensure_rating(rating: u8) -> Result<u8, ChatTransportError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(ChatTransportError::InvalidRating(rating))
    }
}

#[async_trait]
/// Trait contract for the conversational backend.
pub trait ChatBackend: Send + Sync {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, ChatTransportError>;

    async fn rate_dialog(&self, rating: &DialogRating) -> Result<(), ChatTransportError>;

    async fn rate_utterance(&self, rating: &UtteranceRating) -> Result<(), ChatTransportError>;

    async fn fetch_dialog(&self, dialog_id: &str) -> Result<DialogTranscript, ChatTransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_dialog_rating_shifts_star_index_to_backend_scale() {
        let rating = DialogRating::from_star_index("user", "dialog", 0).expect("rating");
        assert_eq!(rating.rating, 1);
        let rating = DialogRating::from_star_index("user", "dialog", 4).expect("rating");
        assert_eq!(rating.rating, 5);
    }

    #[test]
    fn regression_ratings_reject_out_of_scale_values() {
        assert!(matches!(
            DialogRating::from_star_index("user", "dialog", 5),
            Err(ChatTransportError::InvalidRating(6))
        ));
        assert!(matches!(
            DialogRating::from_star_index("user", "dialog", u8::MAX),
            Err(ChatTransportError::InvalidRating(u8::MAX))
        ));
        assert!(matches!(
            UtteranceRating::new("user", "dialog", "utt", 0),
            Err(ChatTransportError::InvalidRating(0))
        ));
    }

    #[test]
    fn unit_chat_reply_tolerates_missing_active_skill() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"dialog_id":"d1","utt_id":"u1","user_id":"user","response":"hi"}"#,
        )
        .expect("decode reply");
        assert_eq!(reply.response, "hi");
        assert!(reply.active_skill.is_empty());
    }
}
