//! Deduplication fingerprints
//!
//! `fp_<n>` where `n` is the absolute value of a 32-bit rolling hash over
//! `source|error_name|normalized_message`. Normalization lower-cases,
//! collapses whitespace and folds every digit run into `#`, so messages that
//! only differ in ports, durations or counts group into one incident.
//! Collisions are accepted.

use super::types::EventSource;

pub const FINGERPRINT_PREFIX: &str = "fp_";

/// Lower-case, collapse whitespace, fold digit runs, trim
pub fn normalize_message(message: &str) -> String {
    let mut normalized = String::with_capacity(message.len());
    let mut in_digits = false;
    let mut pending_space = false;

    for ch in message.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            pending_space = true;
            in_digits = false;
            continue;
        }
        if pending_space {
            normalized.push(' ');
            pending_space = false;
        }
        if ch.is_ascii_digit() {
            if !in_digits {
                normalized.push('#');
                in_digits = true;
            }
            continue;
        }
        in_digits = false;
        normalized.push(ch);
    }

    normalized
}

fn rolling_hash(input: &str) -> i32 {
    input
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Stable deduplication key for an event
pub fn fingerprint(source: EventSource, error_name: &str, message: &str) -> String {
    let key = format!("{}|{}|{}", source, error_name, normalize_message(message));
    let hash = rolling_hash(&key);
    format!("{}{}", FINGERPRINT_PREFIX, hash.unsigned_abs())
}
