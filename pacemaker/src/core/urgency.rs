//! Keyword/length heuristic for how urgent the latest user message is.

use std::sync::LazyLock;

use regex::Regex;

const BASELINE: f64 = 0.3;
const URGENT_WEIGHT: f64 = 0.15;
const DETAIL_WEIGHT: f64 = 0.1;
const LENGTH_WEIGHT: f64 = 0.2;
const LENGTH_CAP: f64 = 500.0;

static URGENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(urgent|urgently|asap|immediately|critical|emergency|hurry|deadline|quickly|right now|blocker)\b",
    )
    .unwrap()
});

static DETAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(detailed|in detail|thorough|thoroughly|carefully|comprehensive|step by step|in depth|exhaustive)\b",
    )
    .unwrap()
});

/// Score the latest user message in `[0, 1]`.
pub fn estimate_urgency(message: &str) -> f64 {
    let urgent_hits = URGENT_RE.find_iter(message).count() as f64;
    let detail_hits = DETAIL_RE.find_iter(message).count() as f64;
    let length = (message.chars().count() as f64 / LENGTH_CAP).min(1.0);

    let score = BASELINE
        + URGENT_WEIGHT * urgent_hits
        + DETAIL_WEIGHT * detail_hits
        + LENGTH_WEIGHT * length;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_scores_baseline() {
        assert!((estimate_urgency("") - BASELINE).abs() < 1e-9);
    }

    #[test]
    fn urgent_keywords_raise_score() {
        let calm = estimate_urgency("please look at the parser");
        let urgent = estimate_urgency("URGENT: please look at the parser asap");
        assert!(urgent > calm);
    }

    #[test]
    fn keywords_match_on_word_boundaries_only() {
        let score = estimate_urgency("nonurgent");
        assert!((score - estimate_urgency("abcdefghi")).abs() < 1e-9);
    }

    #[test]
    fn score_is_capped_at_one() {
        let message = "urgent asap immediately critical emergency ".repeat(20);
        assert_eq!(estimate_urgency(&message), 1.0);
    }
}
