//! Compact share-link encoding for Dream dialog transcripts.
//!
//! Shared message positions are compressed into a dot-joined range token
//! (`0-2.5.7-9`) and carried in the `m` query parameter of a share link next
//! to the opaque dialog id in `d`.

pub mod range_codec;
pub mod share_url;

pub use range_codec::{
    compress_ranges, decode_share_token, encode_share_token, parse_share_token, IndexRange,
    ShareSelection, ShareTokenError, MAX_DECODED_INDICES,
};
pub use share_url::{
    build_share_url, parse_share_params, parse_share_url, share_base_url, ShareLinkBuilder,
    ShareUrlError, SharedDialog, SharedMessageRef, DEFAULT_SHARE_HOST,
};
