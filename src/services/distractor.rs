use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::WordRecord;

pub const DISTRACTOR_COUNT: usize = 3;

/// Ranking tier of a candidate relative to the target: lower sorts first.
/// Same part of speech beats different; within that, level at or above the
/// target's beats lower.
pub fn candidate_tier(target: &WordRecord, candidate: &WordRecord) -> u8 {
    let same_pos = candidate.pos_key() == target.pos_key();
    let level_ok = candidate.level >= target.level;
    match (same_pos, level_ok) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    }
}

/// Every candidate other than the target, best first. Ties within a tier are
/// broken by a random key drawn from `rng`.
pub fn rank_distractor_candidates<'a, R: Rng + ?Sized>(
    target: &WordRecord,
    candidates: &'a [WordRecord],
    rng: &mut R,
) -> Vec<&'a WordRecord> {
    let mut keyed: Vec<(u8, u64, &WordRecord)> = candidates
        .iter()
        .filter(|c| c.id != target.id)
        .map(|c| (candidate_tier(target, c), rng.random::<u64>(), c))
        .collect();
    keyed.sort_by_key(|(tier, tie, _)| (*tier, *tie));
    keyed.into_iter().map(|(_, _, c)| c).collect()
}

pub fn select_distractors<R: Rng + ?Sized>(
    target: &WordRecord,
    candidates: &[WordRecord],
    rng: &mut R,
) -> Vec<WordRecord> {
    rank_distractor_candidates(target, candidates, rng)
        .into_iter()
        .take(DISTRACTOR_COUNT)
        .cloned()
        .collect()
}

/// The target plus its distractors in a uniformly shuffled display order.
pub fn build_options<R: Rng + ?Sized>(
    target: &WordRecord,
    candidates: &[WordRecord],
    rng: &mut R,
) -> Vec<WordRecord> {
    let mut options = Vec::with_capacity(DISTRACTOR_COUNT + 1);
    options.push(target.clone());
    options.extend(select_distractors(target, candidates, rng));
    options.shuffle(rng);
    options
}
