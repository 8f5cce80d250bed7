#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use danci_drill::types::WordRecord;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 10, 0, 0).unwrap()
}

pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// `count` words at `level`, ids `L{level}-{i:03}`, alternating noun/verb.
pub fn level_words(level: u8, count: usize) -> Vec<WordRecord> {
    (0..count)
        .map(|i| {
            let pos = if i % 2 == 0 { "noun" } else { "verb" };
            WordRecord::new(format!("L{level}-{i:03}"), format!("term{level}x{i}"), level)
                .with_part_of_speech(pos)
                .with_definition(format!("meaning {i} at level {level}"))
        })
        .collect()
}
