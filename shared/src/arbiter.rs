use std::cmp::Ordering;

use crate::protocol::PlayerProgress;

/// Accuracy a run must hold for its finish to count.
pub const ACCURACY_FLOOR: u8 = 70;

/// Completion of the full passage with accuracy at or above the floor.
/// Mashing random input to the end of the text does not qualify.
pub fn is_legitimate_finish(p: &PlayerProgress) -> bool {
    p.finished && p.accuracy >= ACCURACY_FLOOR
}

/// Ranks `ours` against `theirs`: `Greater` means our side wins.
///
/// The final verdict is only taken once both sides report `finished`, but
/// the not-finished branches rank live snapshots for mid-race display.
/// A legitimate finisher always outranks an illegitimate one, and two
/// illegitimate finishers are still ordered (by accuracy) so a double-spam
/// race resolves deterministically instead of draw-by-omission.
pub fn compare(ours: &PlayerProgress, theirs: &PlayerProgress) -> Ordering {
    match (is_legitimate_finish(ours), is_legitimate_finish(theirs)) {
        (true, true) => compare_legitimate(ours, theirs),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => match (ours.finished, theirs.finished) {
            (true, true) => ours.accuracy.cmp(&theirs.accuracy),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare_live(ours, theirs),
        },
    }
}

fn compare_legitimate(ours: &PlayerProgress, theirs: &PlayerProgress) -> Ordering {
    let our_time = ours.finish_time.unwrap_or(u64::MAX);
    let their_time = theirs.finish_time.unwrap_or(u64::MAX);
    // earlier finish ranks higher, so the comparison is reversed
    their_time
        .cmp(&our_time)
        .then_with(|| ours.wpm.cmp(&theirs.wpm))
        .then_with(|| ours.accuracy.cmp(&theirs.accuracy))
}

fn compare_live(ours: &PlayerProgress, theirs: &PlayerProgress) -> Ordering {
    ours.wpm
        .cmp(&theirs.wpm)
        .then_with(|| ours.accuracy.cmp(&theirs.accuracy))
        .then_with(|| ours.correct_chars.cmp(&theirs.correct_chars))
}

/// Local reading of a completed race.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Win,
    Draw,
    Loss,
}

impl Verdict {
    pub fn for_pair(ours: &PlayerProgress, theirs: &PlayerProgress) -> Self {
        match compare(ours, theirs) {
            Ordering::Greater => Verdict::Win,
            Ordering::Equal => Verdict::Draw,
            Ordering::Less => Verdict::Loss,
        }
    }
}
