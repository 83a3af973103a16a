//! Transport client for the Dream conversational backend.
//!
//! The widget posts `{user_id, payload}` to the backend root and receives the
//! bot reply together with the dialog and utterance ids it was recorded under.
//! Ratings are submitted out of band, keyed by those ids. Stored dialogs can be
//! fetched back by id to render shared transcripts.

mod client;
mod transcript;
mod types;

pub use client::{ChatClientConfig, DreamChatClient, DEFAULT_CHAT_API_BASE};
pub use transcript::{
    select_shared_messages, DialogTranscript, DialogUtterance, MessageSender, SharedMessage,
    SharedMessageError, UtteranceAuthor,
};
pub use types::{
    ChatBackend, ChatReply, ChatRequest, ChatTransportError, DialogRating, UtteranceRating,
    MAX_RATING, MIN_RATING,
};
