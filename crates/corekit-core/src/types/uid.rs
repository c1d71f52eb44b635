//! Short unique identifiers for events and commands.

use chrono::Utc;
use uuid::Uuid;

/// Length produced by [`get_uid`] callers that have no preference.
pub const DEFAULT_UID_LEN: usize = 20;

const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates an identifier of the form `"jce1t9gu-sg69zzohk7"`.
///
/// The part before the dash is the current time in milliseconds, base 36.
/// The rest is random base 36 filling the identifier up to `len`
/// characters, with at least one random character.
pub fn get_uid(len: usize) -> String {
    let timestamp = to_base36(Utc::now().timestamp_millis().max(0) as u64);
    let random_len = len.saturating_sub(timestamp.len() + 1).max(1);

    let mut uid = String::with_capacity(timestamp.len() + 1 + random_len);
    uid.push_str(&timestamp);
    uid.push('-');
    while uid.len() < timestamp.len() + 1 + random_len {
        let remaining = timestamp.len() + 1 + random_len - uid.len();
        uid.extend(
            Uuid::new_v4()
                .as_bytes()
                .iter()
                .take(remaining)
                .map(|byte| ALPHABET[(*byte as usize) % ALPHABET.len()] as char),
        );
    }
    uid
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(ALPHABET[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}
