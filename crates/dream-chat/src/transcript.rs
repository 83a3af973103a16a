use serde::{Deserialize, Serialize};
use thiserror::Error;

const HUMAN_USER_TYPE: &str = "human";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharedMessageError {
    #[error("shared message index {idx} is outside the dialog ({len} utterances)")]
    IndexOutOfRange { idx: u32, len: usize },
}

/// Who wrote a message, as rendered by the widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceAuthor {
    pub user_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogUtterance {
    pub utt_id: String,
    pub text: String,
    pub user: UtteranceAuthor,
}

impl DialogUtterance {
    pub fn sender(&self) -> MessageSender {
        if self.user.user_type == HUMAN_USER_TYPE {
            MessageSender::User
        } else {
            MessageSender::Bot
        }
    }
}

/// Stored dialog as returned by `GET api/dialogs/<id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogTranscript {
    #[serde(default)]
    pub utterances: Vec<DialogUtterance>,
}

/// One utterance of a shared dialog, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMessage {
    pub utt_id: String,
    pub sender: MessageSender,
    pub content: String,
}

impl From<&DialogUtterance> for SharedMessage {
    fn from(utterance: &DialogUtterance) -> Self {
        Self {
            utt_id: utterance.utt_id.clone(),
            sender: utterance.sender(),
            content: utterance.text.clone(),
        }
    }
}

/// Picks the shared utterances out of a transcript.
///
/// `None` entries are gap markers from a decoded share token and stay `None`.
/// An index past the end of the transcript fails the whole selection.
pub fn select_shared_messages(
    transcript: &DialogTranscript,
    message_idxs: &[Option<u32>],
) -> Result<Vec<Option<SharedMessage>>, SharedMessageError> {
    message_idxs
        .iter()
        .map(|slot| {
            slot.map(|idx| {
                usize::try_from(idx)
                    .ok()
                    .and_then(|position| transcript.utterances.get(position))
                    .map(SharedMessage::from)
                    .ok_or(SharedMessageError::IndexOutOfRange {
                        idx,
                        len: transcript.utterances.len(),
                    })
            })
            .transpose()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(utt_id: &str, text: &str, user_type: &str) -> DialogUtterance {
        DialogUtterance {
            utt_id: utt_id.to_string(),
            text: text.to_string(),
            user: UtteranceAuthor {
                user_type: user_type.to_string(),
            },
        }
    }

    fn transcript() -> DialogTranscript {
        DialogTranscript {
            utterances: vec![
                utterance("1", "Hello there!", "human"),
                utterance("2", "Hey!", "bot"),
                utterance("3", "How are you?", "human"),
            ],
        }
    }

    #[test]
    fn unit_select_shared_messages_keeps_gap_markers() {
        let selected =
            select_shared_messages(&transcript(), &[Some(0), None, Some(2)]).expect("select");
        assert_eq!(selected.len(), 3);
        let first = selected[0].as_ref().expect("first message");
        assert_eq!(first.sender, MessageSender::User);
        assert_eq!(first.content, "Hello there!");
        assert!(selected[1].is_none());
        assert_eq!(selected[2].as_ref().map(|m| m.utt_id.as_str()), Some("3"));
    }

    #[test]
    fn unit_dialog_utterance_maps_non_human_authors_to_bot() {
        assert_eq!(utterance("2", "Hey!", "bot").sender(), MessageSender::Bot);
        assert_eq!(utterance("9", "x", "system").sender(), MessageSender::Bot);
    }

    #[test]
    fn regression_select_shared_messages_rejects_index_past_transcript_end() {
        let error =
            select_shared_messages(&transcript(), &[Some(1), None, Some(3)]).expect_err("range");
        assert_eq!(error, SharedMessageError::IndexOutOfRange { idx: 3, len: 3 });
    }

    #[test]
    fn unit_shared_message_serializes_lowercase_sender() {
        let encoded =
            serde_json::to_value(SharedMessage::from(&utterance("2", "Hey!", "bot"))).expect("json");
        assert_eq!(
            encoded,
            serde_json::json!({"utt_id": "2", "sender": "bot", "content": "Hey!"})
        );
    }
}
