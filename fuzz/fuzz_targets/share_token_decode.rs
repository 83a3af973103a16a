#![no_main]

use dream_share::{decode_share_token, encode_share_token, MAX_DECODED_INDICES};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(slots) = decode_share_token(&raw) else {
        return;
    };
    let indices: Vec<u32> = slots.iter().flatten().copied().collect();
    assert!(!indices.is_empty());
    assert!(indices.len() as u64 <= MAX_DECODED_INDICES);
    assert!(indices.windows(2).all(|pair| pair[0] < pair[1]));
    assert!(slots.first().is_some_and(Option::is_some));
    assert!(slots.last().is_some_and(Option::is_some));
    assert!(slots.windows(2).all(|pair| pair[0].is_some() || pair[1].is_some()));

    let reencoded = encode_share_token(indices.iter().copied()).expect("decoded indices re-encode");
    assert_eq!(decode_share_token(&reencoded).expect("canonical token decodes"), slots);
});
