#![no_main]

use dream_share::parse_share_params;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let pairs = raw.split('&').map(|pair| match pair.split_once('=') {
        Some((key, value)) => (key.to_string(), value.to_string()),
        None => (pair.to_string(), String::new()),
    });
    if let Ok(dialog) = parse_share_params(pairs) {
        assert!(dialog.message_idxs.iter().any(Option::is_some));
    }
});
