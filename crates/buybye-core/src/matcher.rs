//! The `when` phase: natural join of a rule's patterns over the log.

use crate::frame::{Frame, Frames};
use crate::log::Occurrence;
use crate::sync::When;

/// Join `patterns` left to right against `occurrences`.
///
/// Starts from one empty frame. Each pattern extends every frame with every
/// occurrence it unifies with, so several matches fan out into independent
/// frames. A pattern with no match empties the set.
pub fn match_when(patterns: &[When], occurrences: &[Occurrence]) -> Frames {
    let mut frames = Frames::single(Frame::new());
    for pattern in patterns {
        let mut next = Frames::new();
        for frame in &frames {
            next.extend(
                occurrences
                    .iter()
                    .filter_map(|occ| pattern.match_occurrence(occ, frame)),
            );
        }
        if next.is_empty() {
            return next;
        }
        frames = next;
    }
    frames
}
