//! Fuzzy matching of medication names against recognized text

use similar::TextDiff;

use super::TextFragment;

/// Similarity of two strings on a 0-100 scale
///
/// `2 * matched / total` over characters, as computed by a character diff.
#[must_use]
pub fn ratio(a: &str, b: &str) -> u8 {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    to_score(TextDiff::from_chars(a, b).ratio())
}

/// Best similarity of the shorter string against any equally long window
/// of the longer one, on a 0-100 scale
///
/// Both inputs are lowercased. Callers pass `(expected, observed)`; the
/// argument order is kept when the two strings have the same length.
#[must_use]
pub fn partial_ratio(expected: &str, observed: &str) -> u8 {
    let expected = expected.trim().to_lowercase();
    let observed = observed.trim().to_lowercase();
    if expected.is_empty() || observed.is_empty() {
        return 0;
    }

    let expected_chars: Vec<char> = expected.chars().collect();
    let observed_chars: Vec<char> = observed.chars().collect();
    if expected_chars.len() == observed_chars.len() {
        return ratio(&expected, &observed);
    }

    let (short, long, short_is_expected) = if expected_chars.len() < observed_chars.len() {
        (&expected, &observed_chars, true)
    } else {
        (&observed, &expected_chars, false)
    };
    let width = short.chars().count();

    let mut best = 0;
    for window in long.windows(width) {
        let window: String = window.iter().collect();
        let score = if short_is_expected {
            ratio(short, &window)
        } else {
            ratio(&window, short)
        };
        best = best.max(score);
        if best == 100 {
            break;
        }
    }
    best
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_score(ratio: f32) -> u8 {
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Decides whether a box shows the expected medication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxMatcher {
    threshold: u8,
}

impl Default for BoxMatcher {
    fn default() -> Self {
        Self::new(super::DEFAULT_THRESHOLD)
    }
}

impl BoxMatcher {
    /// `threshold` is clamped to 0-100
    #[must_use]
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold: threshold.min(100),
        }
    }

    #[must_use]
    pub const fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Highest score of `medication` against any fragment, `None` if there are none
    #[must_use]
    pub fn best_score(&self, medication: &str, fragments: &[TextFragment]) -> Option<u8> {
        fragments
            .iter()
            .map(|f| partial_ratio(medication, &f.text))
            .max()
    }

    /// Whether some fragment scores at least the threshold
    #[must_use]
    pub fn matches(&self, medication: &str, fragments: &[TextFragment]) -> bool {
        self.best_score(medication, fragments)
            .is_some_and(|score| score >= self.threshold)
    }
}
