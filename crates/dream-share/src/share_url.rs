use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::range_codec::{decode_share_token, encode_share_token, ShareTokenError};

/// Path segment of the public shared-dialog page.
pub const SHARE_PATH: &str = "shared";
/// Query parameter carrying the opaque dialog identifier.
pub const SHARE_DIALOG_PARAM: &str = "d";
/// Query parameter carrying the message range token.
pub const SHARE_MESSAGES_PARAM: &str = "m";
/// Host used by the hosted widget.
pub const DEFAULT_SHARE_HOST: &str = "dream.deeppavlov.ai";

/// Errors raised while building or parsing share links.
#[derive(Debug, Error)]
pub enum ShareUrlError {
    #[error("invalid share host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },
    #[error("share link is missing the '{0}' query parameter")]
    MissingParameter(&'static str),
    #[error("invalid share url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Token(#[from] ShareTokenError),
}

/// Position of one message in a dialog transcript selected for sharing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMessageRef {
    pub idx: u32,
    /// Character ranges to blur; reserved, not encoded into links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<Vec<[usize; 2]>>,
}

impl SharedMessageRef {
    pub fn new(idx: u32) -> Self {
        Self { idx, blur: None }
    }
}

/// Dialog reference recovered from a share link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedDialog {
    pub dialog_id: String,
    /// Shared message indices in ascending order; `None` marks omitted messages.
    pub message_idxs: Vec<Option<u32>>,
}

impl SharedDialog {
    /// Iterates over the shared indices, skipping gap markers.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.message_idxs.iter().flatten().copied()
    }
}

/// Builds share links against a fixed base url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinkBuilder {
    base_url: Url,
}

impl ShareLinkBuilder {
    /// Accepts a bare host (`dream.deeppavlov.ai`, https implied) or a full origin.
    pub fn new(host: &str) -> Result<Self, ShareUrlError> {
        Ok(Self {
            base_url: share_base_url(host)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/shared?d=<dialog_id>&m=<token>`.
    pub fn build(
        &self,
        dialog_id: &str,
        messages: &[SharedMessageRef],
    ) -> Result<String, ShareUrlError> {
        let token = encode_share_token(messages.iter().map(|message| message.idx))?;
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(SHARE_DIALOG_PARAM, dialog_id)
            .append_pair(SHARE_MESSAGES_PARAM, &token);
        Ok(url.into())
    }
}

/// Resolves the shared-dialog page url for `host`.
pub fn share_base_url(host: &str) -> Result<Url, ShareUrlError> {
    let trimmed = host.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ShareUrlError::InvalidHost {
            host: host.to_string(),
            reason: "host cannot be empty".to_string(),
        });
    }
    let raw = if trimmed.contains("://") {
        format!("{trimmed}/{SHARE_PATH}")
    } else {
        format!("https://{trimmed}/{SHARE_PATH}")
    };
    let url = Url::parse(&raw).map_err(|error| ShareUrlError::InvalidHost {
        host: host.to_string(),
        reason: error.to_string(),
    })?;
    if url.host_str().is_none() || url.query().is_some() || url.fragment().is_some() {
        return Err(ShareUrlError::InvalidHost {
            host: host.to_string(),
            reason: "expected a host or origin without query or fragment".to_string(),
        });
    }
    Ok(url)
}

/// Builds a shareable link for the selected messages of a dialog.
pub fn build_share_url(
    dialog_id: &str,
    messages: &[SharedMessageRef],
    host: &str,
) -> Result<String, ShareUrlError> {
    ShareLinkBuilder::new(host)?.build(dialog_id, messages)
}

/// Reads `d` and `m` out of decoded query pairs. The first occurrence of each key wins.
pub fn parse_share_params<I, K, V>(pairs: I) -> Result<SharedDialog, ShareUrlError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut dialog_id: Option<String> = None;
    let mut token: Option<String> = None;
    for (key, value) in pairs {
        match key.as_ref() {
            SHARE_DIALOG_PARAM if dialog_id.is_none() => {
                dialog_id = Some(value.as_ref().to_string());
            }
            SHARE_MESSAGES_PARAM if token.is_none() => {
                token = Some(value.as_ref().to_string());
            }
            _ => {}
        }
    }

    let dialog_id = dialog_id.ok_or(ShareUrlError::MissingParameter(SHARE_DIALOG_PARAM))?;
    let token = token.ok_or(ShareUrlError::MissingParameter(SHARE_MESSAGES_PARAM))?;
    Ok(SharedDialog {
        dialog_id,
        message_idxs: decode_share_token(&token)?,
    })
}

/// Parses a full share link.
pub fn parse_share_url(raw_url: &str) -> Result<SharedDialog, ShareUrlError> {
    let url = Url::parse(raw_url.trim()).map_err(|source| ShareUrlError::InvalidUrl {
        url: raw_url.to_string(),
        source,
    })?;
    parse_share_params(url.query_pairs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msgs(start: u32, length: u32) -> Vec<SharedMessageRef> {
        (start..start + length).map(SharedMessageRef::new).collect()
    }

    #[test]
    fn unit_build_share_url_prepends_share_page() {
        let url = build_share_url("dialogId", &msgs(0, 1), DEFAULT_SHARE_HOST).expect("url");
        assert!(url.starts_with("https://dream.deeppavlov.ai/shared?"));
    }

    #[test]
    fn unit_build_share_url_includes_dialog_id() {
        let url = build_share_url("dialogId", &msgs(0, 1), DEFAULT_SHARE_HOST).expect("url");
        assert!(url.contains("d=dialogId"));
    }

    #[test]
    fn unit_build_share_url_shortens_consecutive_ranges() {
        let url = build_share_url("dialogId", &msgs(0, 3), DEFAULT_SHARE_HOST).expect("url");
        assert!(url.contains("m=0-2"));
    }

    #[test]
    fn unit_build_share_url_handles_multiple_ranges() {
        let mut messages = msgs(0, 3);
        messages.push(SharedMessageRef::new(5));
        messages.extend(msgs(7, 3));
        let url = build_share_url("dialogId", &messages, DEFAULT_SHARE_HOST).expect("url");
        assert_eq!(
            url,
            "https://dream.deeppavlov.ai/shared?d=dialogId&m=0-2.5.7-9"
        );
    }

    #[test]
    fn unit_build_share_url_query_encodes_dialog_id() {
        let url = build_share_url("a b&c", &msgs(0, 1), DEFAULT_SHARE_HOST).expect("url");
        assert!(url.contains("d=a+b%26c"));
        let parsed = parse_share_url(&url).expect("parse");
        assert_eq!(parsed.dialog_id, "a b&c");
    }

    #[test]
    fn unit_share_base_url_honors_explicit_origin() {
        let url = share_base_url("http://localhost:3000/").expect("base");
        assert_eq!(url.as_str(), "http://localhost:3000/shared");
    }

    #[test]
    fn regression_share_base_url_rejects_blank_host() {
        let error = share_base_url("  ").expect_err("blank host");
        assert!(matches!(error, ShareUrlError::InvalidHost { .. }));
    }

    #[test]
    fn regression_build_share_url_rejects_empty_selection() {
        let error = build_share_url("dialogId", &[], DEFAULT_SHARE_HOST).expect_err("empty");
        assert!(matches!(
            error,
            ShareUrlError::Token(ShareTokenError::EmptySelection)
        ));
    }

    #[test]
    fn unit_parse_share_url_recovers_dialog_and_gaps() {
        let parsed =
            parse_share_url("https://dream.deeppavlov.ai/shared?d=dialogId&m=0-2.5").expect("parse");
        assert_eq!(parsed.dialog_id, "dialogId");
        assert_eq!(
            parsed.message_idxs,
            vec![Some(0), Some(1), Some(2), None, Some(5)]
        );
        assert_eq!(parsed.indices().collect::<Vec<_>>(), vec![0, 1, 2, 5]);
    }

    #[test]
    fn regression_parse_share_params_reports_missing_parameters() {
        let error = parse_share_params([("m", "0-2")]).expect_err("missing d");
        assert!(matches!(error, ShareUrlError::MissingParameter("d")));
        let error = parse_share_params([("d", "dialogId")]).expect_err("missing m");
        assert!(matches!(error, ShareUrlError::MissingParameter("m")));
    }

    #[test]
    fn regression_parse_share_params_rejects_malformed_token() {
        let error = parse_share_params([("d", "dialogId"), ("m", "2-x")]).expect_err("bad token");
        assert!(matches!(
            error,
            ShareUrlError::Token(ShareTokenError::MalformedComponent { .. })
        ));
    }

    #[test]
    fn unit_shared_message_ref_omits_absent_blur() {
        let encoded = serde_json::to_string(&SharedMessageRef::new(3)).expect("encode");
        assert_eq!(encoded, r#"{"idx":3}"#);
        let decoded: SharedMessageRef =
            serde_json::from_str(r#"{"idx":4,"blur":[[0,5]]}"#).expect("decode");
        assert_eq!(decoded.blur, Some(vec![[0, 5]]));
    }
}
