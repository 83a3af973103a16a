use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between range components in a share token.
pub const SHARE_TOKEN_COMPONENT_SEPARATOR: char = '.';
/// Separator between the bounds of a single range component.
pub const SHARE_TOKEN_RANGE_SEPARATOR: char = '-';
/// Upper bound on message indices produced by a single decode.
pub const MAX_DECODED_INDICES: u64 = 10_000;

/// Errors raised while encoding or decoding share tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareTokenError {
    #[error("share selection cannot be empty")]
    EmptySelection,
    #[error("invalid share range: start {start} is greater than end {end}")]
    InvalidRange { start: u32, end: u32 },
    #[error("share token component at position {position} is empty")]
    EmptyComponent { position: usize },
    #[error("share token component '{component}' must be 'N' or 'N-M'")]
    MalformedComponent { component: String },
    #[error("share token component '{component}' does not follow the previous range")]
    DescendingComponent { component: String },
    #[error("share token component '{component}' exceeds the maximum message index")]
    IndexOverflow { component: String },
    #[error("share token expands to more than {limit} message indices")]
    TooManyIndices { limit: u64 },
}

/// Closed interval of message indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: u32,
    pub end: u32,
}

impl IndexRange {
    /// Builds a range, rejecting `start > end`.
    pub fn new(start: u32, end: u32) -> Result<Self, ShareTokenError> {
        if start > end {
            return Err(ShareTokenError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(idx: u32) -> Self {
        Self {
            start: idx,
            end: idx,
        }
    }

    /// Number of indices covered by the range.
    pub fn index_count(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }
}

impl fmt::Display for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(
                f,
                "{}{}{}",
                self.start, SHARE_TOKEN_RANGE_SEPARATOR, self.end
            )
        }
    }
}

/// One element of an encoder input: a single message index or an explicit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareSelection {
    Index(u32),
    Range(u32, u32),
}

impl ShareSelection {
    fn to_range(self) -> Result<IndexRange, ShareTokenError> {
        match self {
            Self::Index(idx) => Ok(IndexRange::single(idx)),
            Self::Range(start, end) => IndexRange::new(start, end),
        }
    }
}

impl From<u32> for ShareSelection {
    fn from(idx: u32) -> Self {
        Self::Index(idx)
    }
}

impl From<(u32, u32)> for ShareSelection {
    fn from((start, end): (u32, u32)) -> Self {
        Self::Range(start, end)
    }
}

impl From<IndexRange> for ShareSelection {
    fn from(range: IndexRange) -> Self {
        Self::Range(range.start, range.end)
    }
}

/// Sorts the selection and merges adjacent or overlapping runs into minimal ranges.
pub fn compress_ranges<I, S>(selections: I) -> Result<Vec<IndexRange>, ShareTokenError>
where
    I: IntoIterator<Item = S>,
    S: Into<ShareSelection>,
{
    let mut ranges = selections
        .into_iter()
        .map(|selection| selection.into().to_range())
        .collect::<Result<Vec<_>, _>>()?;
    if ranges.is_empty() {
        return Err(ShareTokenError::EmptySelection);
    }
    ranges.sort_unstable();

    let mut compressed: Vec<IndexRange> = Vec::with_capacity(ranges.len());
    for next in ranges {
        match compressed.last_mut() {
            Some(current) if next.start <= current.end.saturating_add(1) => {
                current.end = current.end.max(next.end);
            }
            _ => compressed.push(next),
        }
    }
    Ok(compressed)
}

/// Encodes a selection of message indices into a dot-joined share token.
pub fn encode_share_token<I, S>(selections: I) -> Result<String, ShareTokenError>
where
    I: IntoIterator<Item = S>,
    S: Into<ShareSelection>,
{
    let ranges = compress_ranges(selections)?;
    Ok(ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&SHARE_TOKEN_COMPONENT_SEPARATOR.to_string()))
}

/// Parses a share token into its ranges without expanding them.
///
/// Components must already be in ascending order; they are never re-sorted.
pub fn parse_share_token(token: &str) -> Result<Vec<IndexRange>, ShareTokenError> {
    let mut ranges: Vec<IndexRange> = Vec::new();
    for (position, component) in token.split(SHARE_TOKEN_COMPONENT_SEPARATOR).enumerate() {
        let range = parse_component(component, position)?;
        if let Some(previous) = ranges.last() {
            if range.start <= previous.end {
                return Err(ShareTokenError::DescendingComponent {
                    component: component.to_string(),
                });
            }
        }
        ranges.push(range);
    }
    Ok(ranges)
}

/// Expands a share token into message indices, with `None` marking each skipped gap.
pub fn decode_share_token(token: &str) -> Result<Vec<Option<u32>>, ShareTokenError> {
    let ranges = parse_share_token(token)?;
    let total: u64 = ranges.iter().map(IndexRange::index_count).sum();
    if total > MAX_DECODED_INDICES {
        return Err(ShareTokenError::TooManyIndices {
            limit: MAX_DECODED_INDICES,
        });
    }

    let mut decoded = Vec::with_capacity(total as usize + ranges.len());
    let mut previous_end: Option<u32> = None;
    for range in ranges {
        // start > previous end is guaranteed by parse_share_token
        if matches!(previous_end, Some(end) if range.start > end + 1) {
            decoded.push(None);
        }
        decoded.extend((range.start..=range.end).map(Some));
        previous_end = Some(range.end);
    }
    Ok(decoded)
}

fn parse_component(component: &str, position: usize) -> Result<IndexRange, ShareTokenError> {
    if component.is_empty() {
        return Err(ShareTokenError::EmptyComponent { position });
    }
    let (start_raw, end_raw) = match component.split_once(SHARE_TOKEN_RANGE_SEPARATOR) {
        Some((start, end)) => (start, Some(end)),
        None => (component, None),
    };
    let start = parse_index(start_raw, component)?;
    let end = match end_raw {
        Some(raw) => parse_index(raw, component)?,
        None => start,
    };
    IndexRange::new(start, end)
}

fn parse_index(raw: &str, component: &str) -> Result<u32, ShareTokenError> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ShareTokenError::MalformedComponent {
            component: component.to_string(),
        });
    }
    raw.parse::<u32>()
        .map_err(|_| ShareTokenError::IndexOverflow {
            component: component.to_string(),
        })
}
