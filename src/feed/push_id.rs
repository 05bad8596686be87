use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ordered alphabet; lexical order of ids follows mint order
const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIMESTAMP_LEN: usize = 8;
const RANDOM_LEN: usize = 12;

/// Globally unique, order-preserving key minted for every appended post
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PushId(String);

impl PushId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PushId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_ms: i64,
    last_random: [u8; RANDOM_LEN],
}

/// Mints [`PushId`]s: 8 chars of millisecond timestamp followed by 12 random chars.
///
/// Ids minted within the same millisecond (or after the clock stepped back)
/// reuse the previous timestamp and increment the random suffix, so a single
/// generator never produces an id that sorts before one it already produced.
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    state: Mutex<GeneratorState>,
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> PushId {
        self.next_at(Utc::now().timestamp_millis())
    }

    pub(crate) fn next_at(&self, now_ms: i64) -> PushId {
        let mut state = self.state.lock();

        if now_ms <= state.last_ms {
            increment(&mut state.last_random);
        } else {
            state.last_ms = now_ms;
            state.last_random = random_suffix();
        }

        let mut id = String::with_capacity(TIMESTAMP_LEN + RANDOM_LEN);
        let mut stamp = [0u8; TIMESTAMP_LEN];
        let mut remaining = state.last_ms.max(0) as u64;
        for slot in stamp.iter_mut().rev() {
            *slot = PUSH_CHARS[(remaining % 64) as usize];
            remaining /= 64;
        }
        id.extend(stamp.iter().map(|&b| b as char));
        id.extend(state.last_random.iter().map(|&i| PUSH_CHARS[i as usize] as char));

        PushId(id)
    }
}

fn increment(digits: &mut [u8; RANDOM_LEN]) {
    for digit in digits.iter_mut().rev() {
        if *digit == 63 {
            *digit = 0;
        } else {
            *digit += 1;
            return;
        }
    }
}

fn random_suffix() -> [u8; RANDOM_LEN] {
    // Bytes 6 and 8 of a v4 UUID carry the version and variant bits
    let bytes = *Uuid::new_v4().as_bytes();
    let mut suffix = [0u8; RANDOM_LEN];
    let random = bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 6 && *i != 8)
        .map(|(_, b)| b % 64);
    for (slot, value) in suffix.iter_mut().zip(random) {
        *slot = value;
    }
    suffix
}
