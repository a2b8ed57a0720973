//! Static lookup data for tune derivation.

use crate::hardware::Note;

/// Palette indexed by model-name characters (C4 … C5).
pub(crate) const MODEL_PALETTE: [Note; 8] = [
    Note::C4,
    Note::D4,
    Note::E4,
    Note::F4,
    Note::G4,
    Note::A4,
    Note::B4,
    Note::C5,
];

/// Palette indexed by voice-name characters (C5 … C6).
pub(crate) const VOICE_PALETTE: [Note; 8] = [
    Note::C5,
    Note::D5,
    Note::E5,
    Note::F5,
    Note::G5,
    Note::A5,
    Note::B5,
    Note::C6,
];

/// Pool the clear-history tune draws from.
pub(crate) const CLEAR_PALETTE: [Note; 12] = [
    Note::C4,
    Note::D4,
    Note::E4,
    Note::F4,
    Note::G4,
    Note::A4,
    Note::B4,
    Note::C5,
    Note::D5,
    Note::E5,
    Note::F5,
    Note::G5,
];

/// Character → interval offset for model-seeded tunes.
pub(crate) static MODEL_INTERVALS: [(char, usize); 36] = [
    ('a', 0), ('b', 1), ('c', 2), ('d', 3), ('e', 4), ('f', 5), ('g', 6), ('h', 7),
    ('i', 1), ('j', 2), ('k', 3), ('l', 4), ('m', 5), ('n', 6), ('o', 7), ('p', 0),
    ('q', 1), ('r', 2), ('s', 3), ('t', 4), ('u', 5), ('v', 6), ('w', 7), ('x', 0),
    ('y', 1), ('z', 2), ('0', 0), ('1', 1), ('2', 2), ('3', 3), ('4', 4), ('5', 5),
    ('6', 6), ('7', 7), ('8', 0), ('9', 1),
];

/// Character → four palette indices for voice-seeded tunes.
pub(crate) static VOICE_PATTERNS: [(char, [usize; 4]); 27] = [
    ('a', [5, 3, 5, 7]), ('b', [0, 2, 4, 6]), ('c', [1, 3, 5, 7]),
    ('d', [2, 4, 6, 0]), ('e', [3, 5, 7, 1]), ('f', [4, 6, 0, 2]),
    ('g', [5, 7, 1, 3]), ('h', [6, 0, 2, 4]), ('i', [7, 1, 3, 5]),
    ('j', [0, 3, 6, 1]), ('k', [1, 4, 7, 2]), ('l', [2, 5, 0, 3]),
    ('m', [3, 6, 1, 4]), ('n', [4, 7, 2, 5]), ('o', [5, 0, 3, 6]),
    ('p', [6, 1, 4, 7]), ('q', [7, 2, 5, 0]), ('r', [0, 4, 1, 5]),
    ('s', [1, 5, 2, 6]), ('t', [2, 6, 3, 7]), ('u', [3, 7, 4, 0]),
    ('v', [4, 0, 5, 1]), ('w', [5, 1, 6, 2]), ('x', [6, 2, 7, 3]),
    ('y', [7, 3, 0, 4]), ('z', [0, 5, 2, 7]), ('_', [0, 2, 4, 6]),
];

pub(crate) fn model_interval(c: char) -> Option<usize> {
    MODEL_INTERVALS
        .iter()
        .find(|(k, _)| *k == c)
        .map(|(_, v)| *v)
}

pub(crate) fn voice_pattern(c: char) -> Option<[usize; 4]> {
    VOICE_PATTERNS
        .iter()
        .find(|(k, _)| *k == c)
        .map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_interval_indexes_the_palette() {
        assert!(MODEL_INTERVALS.iter().all(|(_, v)| *v < MODEL_PALETTE.len()));
    }

    #[test]
    fn every_pattern_indexes_the_palette() {
        assert!(VOICE_PATTERNS
            .iter()
            .all(|(_, p)| p.iter().all(|i| *i < VOICE_PALETTE.len())));
    }

    #[test]
    fn lookups_skip_unknown_characters() {
        assert_eq!(model_interval('h'), Some(7));
        assert_eq!(model_interval('-'), None);
        assert_eq!(voice_pattern('_'), Some([0, 2, 4, 6]));
        assert_eq!(voice_pattern('7'), None);
    }
}
