use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::Serialize;

use crate::transcript::DialogTranscript;
use crate::types::{
    ChatBackend, ChatReply, ChatRequest, ChatTransportError, DialogRating, UtteranceRating,
};

/// Backend used by the hosted widget.
pub const DEFAULT_CHAT_API_BASE: &str = "https://7019.lnsigo.mipt.ru/";

const DIALOG_RATING_ENDPOINT: &str = "rating/dialog";
const UTTERANCE_RATING_ENDPOINT: &str = "rating/utterance";
const DIALOGS_ENDPOINT: &str = "api/dialogs";

#[derive(Debug, Clone)]
/// Connection settings for [`DreamChatClient`].
pub struct ChatClientConfig {
    pub api_base: String,
    pub request_timeout_ms: u64,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_CHAT_API_BASE.to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone)]
/// HTTP client for the conversational backend. Requests are never retried.
pub struct DreamChatClient {
    client: reqwest::Client,
    api_base: String,
}

impl DreamChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, ChatTransportError> {
        let api_base = config.api_base.trim().trim_end_matches('/').to_string();
        if api_base.is_empty() {
            return Err(ChatTransportError::InvalidConfig(
                "api base url cannot be empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self { client, api_base })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.is_empty() {
            format!("{}/", self.api_base)
        } else {
            format!("{}/{endpoint}", self.api_base)
        }
    }

    /// `api/dialogs/<dialog_id>`, with the id escaped as a single path segment.
    fn dialog_url(&self, dialog_id: &str) -> Result<reqwest::Url, ChatTransportError> {
        let mut url = reqwest::Url::parse(&self.endpoint_url(DIALOGS_ENDPOINT)).map_err(|error| {
            ChatTransportError::InvalidConfig(format!("invalid api base url: {error}"))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                ChatTransportError::InvalidConfig("api base url cannot carry a path".to_string())
            })?
            .push(dialog_id);
        Ok(url)
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<String, ChatTransportError> {
        let url = self.endpoint_url(endpoint);
        let response = self
            .client
            .post(&url)
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;
        read_success_body(&url, response).await
    }
}

async fn read_success_body(
    url: &str,
    response: reqwest::Response,
) -> Result<String, ChatTransportError> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        tracing::warn!(%url, status = status.as_u16(), "chat backend request failed");
        return Err(ChatTransportError::HttpStatus {
            status: status.as_u16(),
            body: text,
        });
    }
    Ok(text)
}

#[async_trait]
impl ChatBackend for DreamChatClient {
    async fn send_message(&self, request: &ChatRequest) -> Result<ChatReply, ChatTransportError> {
        let body = self.post_json("", request).await?;
        let reply: ChatReply = serde_json::from_str(&body)?;
        tracing::debug!(
            dialog_id = %reply.dialog_id,
            utt_id = %reply.utt_id,
            active_skill = %reply.active_skill,
            "chat reply received"
        );
        Ok(reply)
    }

    async fn rate_dialog(&self, rating: &DialogRating) -> Result<(), ChatTransportError> {
        self.post_json(DIALOG_RATING_ENDPOINT, rating).await?;
        Ok(())
    }

    async fn rate_utterance(&self, rating: &UtteranceRating) -> Result<(), ChatTransportError> {
        self.post_json(UTTERANCE_RATING_ENDPOINT, rating).await?;
        Ok(())
    }

    async fn fetch_dialog(&self, dialog_id: &str) -> Result<DialogTranscript, ChatTransportError> {
        let url = self.dialog_url(dialog_id)?;
        let response = self.client.get(url.clone()).send().await?;
        let body = read_success_body(url.as_str(), response).await?;
        let transcript: DialogTranscript = serde_json::from_str(&body)?;
        tracing::debug!(
            dialog_id,
            utterances = transcript.utterances.len(),
            "dialog transcript fetched"
        );
        Ok(transcript)
    }
}
