//! Deterministic comment-quality rubric.
//!
//! A comment earns a word score (distinct non-trivial words × the class word
//! value) and an element score (formatting constructs × their configured value
//! × the class formatting multiplier). Nothing here calls out of process.

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{ContributionError, Result};
use crate::policy::RubricMultipliers;
use crate::types::{Comment, Participant};

/// Generic and structural tokens that never count as words.
const STOPLIST: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "could", "did", "do",
    "does", "for", "from", "had", "has", "have", "he", "her", "his", "i", "if", "in", "is", "it",
    "its", "just", "me", "my", "no", "not", "of", "on", "or", "our", "she", "so", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "to", "too", "us", "was", "we",
    "were", "what", "when", "which", "who", "will", "with", "would", "you", "your", "http",
    "https", "www", "com", "html", "png", "jpg", "gif", "br", "nbsp", "td", "tr", "li", "ul",
    "ol", "img", "src", "href",
];

/// Formatting constructs rewarded by the rubric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    CodeBlock,
    InlineCode,
    Link,
    Image,
    ListItem,
    Heading,
    Blockquote,
    TableRow,
    Emphasis,
}

/// Rubric result for a single comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricScore {
    /// Comment the score belongs to
    pub comment_id: u64,
    /// Distinct non-trivial words
    pub distinct_words: usize,
    /// Element occurrences by kind
    pub elements: BTreeMap<ElementKind, usize>,
    /// Word-based score
    pub word_score: Decimal,
    /// Structural-element score
    pub element_score: Decimal,
}

impl RubricScore {
    pub fn total(&self) -> Decimal {
        self.word_score + self.element_score
    }
}

/// Accumulated rubric result for one participant within one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricTotal {
    /// Who the comments belong to
    pub user: Participant,
    /// Per-comment scores in input order
    pub comments: Vec<RubricScore>,
    /// Sum of word scores
    pub word_score: Decimal,
    /// Sum of element scores
    pub element_score: Decimal,
}

impl RubricTotal {
    pub fn total(&self) -> Decimal {
        self.word_score + self.element_score
    }
}

/// Compiled rubric patterns plus element values.
pub struct RubricEngine {
    element_values: BTreeMap<ElementKind, Decimal>,
    stoplist: HashSet<&'static str>,
    code_block: Regex,
    inline_code: Regex,
    image: Regex,
    link: Regex,
    bare_url: Regex,
    line_elements: Vec<(ElementKind, Regex)>,
    word: Regex,
}

impl RubricEngine {
    /// Compile the rubric with the given element values.
    pub fn new(element_values: BTreeMap<ElementKind, Decimal>) -> Result<Self> {
        if let Some((kind, _)) = element_values.iter().find(|(_, v)| v.is_sign_negative() && !v.is_zero()) {
            return Err(ContributionError::InvalidPolicy(format!(
                "element value for {kind:?} is negative"
            )));
        }

        Ok(Self {
            element_values,
            stoplist: STOPLIST.iter().copied().collect(),
            code_block: Regex::new(r"(?s)```.*?```")?,
            inline_code: Regex::new(r"`[^`\n]+`")?,
            image: Regex::new(r"!\[[^\]]*\]\([^)\s]+[^)]*\)")?,
            link: Regex::new(r"\[[^\]]+\]\([^)\s]+[^)]*\)")?,
            bare_url: Regex::new(r"https?://[^\s<>)]+")?,
            line_elements: vec![
                (ElementKind::ListItem, Regex::new(r"(?m)^[ \t]*(?:[-*+]|\d+[.)])[ \t]+\S")?),
                (ElementKind::Heading, Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+\S")?),
                (ElementKind::Blockquote, Regex::new(r"(?m)^[ \t]{0,3}>[ \t]?\S")?),
                (
                    ElementKind::TableRow,
                    Regex::new(r"(?m)^[ \t]*\|.*[\p{L}\p{N}].*\|[ \t]*$")?,
                ),
                (ElementKind::Emphasis, Regex::new(r"\*\*[^*\n]+\*\*|__[^_\n]+__")?),
            ],
            word: Regex::new(r"[\p{L}][\p{L}\p{N}'_-]*")?,
        })
    }

    /// Score one comment.
    pub fn score_comment(&self, comment: &Comment, multipliers: &RubricMultipliers) -> RubricScore {
        let mut elements: BTreeMap<ElementKind, usize> = BTreeMap::new();
        let mut text = comment.body.clone();

        // Strip constructs in order so nested markup is counted once.
        let strip_steps = [
            (ElementKind::CodeBlock, &self.code_block),
            (ElementKind::InlineCode, &self.inline_code),
            (ElementKind::Image, &self.image),
            (ElementKind::Link, &self.link),
            (ElementKind::Link, &self.bare_url),
        ];
        for (kind, pattern) in strip_steps {
            let count = pattern.find_iter(&text).count();
            if count > 0 {
                *elements.entry(kind).or_default() += count;
                text = pattern.replace_all(&text, " ").into_owned();
            }
        }

        for (kind, pattern) in &self.line_elements {
            let count = pattern.find_iter(&text).count();
            if count > 0 {
                *elements.entry(*kind).or_default() += count;
            }
        }

        let distinct_words = self.distinct_words(&text).len();

        let element_sum: Decimal = elements
            .iter()
            .map(|(kind, count)| {
                let value = self.element_values.get(kind).copied().unwrap_or_default();
                value * Decimal::from(*count)
            })
            .sum();

        RubricScore {
            comment_id: comment.id,
            distinct_words,
            elements,
            word_score: multipliers.word_value * Decimal::from(distinct_words),
            element_score: element_sum * multipliers.formatting,
        }
    }

    /// Score every comment of one participant within a class.
    ///
    /// Comments are scored independently and summed; there is no
    /// normalization by comment count.
    pub fn score_participant(
        &self,
        user: &Participant,
        comments: &[Comment],
        multipliers: &RubricMultipliers,
    ) -> RubricTotal {
        let scores: Vec<RubricScore> = comments
            .iter()
            .filter(|comment| comment.user.id == user.id)
            .map(|comment| self.score_comment(comment, multipliers))
            .collect();

        RubricTotal {
            user: user.clone(),
            word_score: scores.iter().map(|s| s.word_score).sum(),
            element_score: scores.iter().map(|s| s.element_score).sum(),
            comments: scores,
        }
    }

    fn distinct_words(&self, text: &str) -> BTreeSet<String> {
        self.word
            .find_iter(text)
            .map(|m| {
                m.as_str()
                    .trim_end_matches(['\'', '-', '_'])
                    .to_lowercase()
            })
            .filter(|word| word.chars().count() > 1 && !self.stoplist.contains(word.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ScoringPolicy;
    use rust_decimal_macros::dec;

    fn engine() -> RubricEngine {
        RubricEngine::new(ScoringPolicy::default().element_values).unwrap()
    }

    fn unit() -> RubricMultipliers {
        RubricMultipliers::new(dec!(1), dec!(1))
    }

    fn comment(id: u64, body: &str) -> Comment {
        Comment::new(id, body, Participant::human(1, "alice"))
    }

    #[test]
    fn test_distinct_words_skip_stoplist_and_repeats() {
        let score = engine().score_comment(&comment(1, "The parser parser breaks on the input"), &unit());
        // parser, breaks, input
        assert_eq!(score.distinct_words, 3);
        assert_eq!(score.word_score, dec!(3));
        assert_eq!(score.element_score, dec!(0));
    }

    #[test]
    fn test_elements_are_counted() {
        let body = "## Repro\n\n- step one\n- step two\n\n```rust\nfn main() {}\n```\n\nSee [docs](https://example.org/docs) and `cargo test`.";
        let score = engine().score_comment(&comment(1, body), &unit());

        assert_eq!(score.elements.get(&ElementKind::Heading), Some(&1));
        assert_eq!(score.elements.get(&ElementKind::ListItem), Some(&2));
        assert_eq!(score.elements.get(&ElementKind::CodeBlock), Some(&1));
        assert_eq!(score.elements.get(&ElementKind::Link), Some(&1));
        assert_eq!(score.elements.get(&ElementKind::InlineCode), Some(&1));
        // 0.5 + 2 × 0.25 + 1 + 0.5 + 0.5
        assert_eq!(score.element_score, dec!(3.0));
    }

    #[test]
    fn test_code_is_not_counted_as_words() {
        let score = engine().score_comment(&comment(1, "```\nlet alpha = beta;\n```"), &unit());
        assert_eq!(score.distinct_words, 0);
    }

    #[test]
    fn test_multipliers_scale_scores() {
        let body = "Refactor **carefully** please";
        let plain = engine().score_comment(&comment(1, body), &unit());
        let scaled = engine().score_comment(
            &comment(1, body),
            &RubricMultipliers::new(dec!(0.1), dec!(2)),
        );

        assert_eq!(scaled.word_score, plain.word_score * dec!(0.1));
        assert_eq!(scaled.element_score, plain.element_score * dec!(2));
    }

    #[test]
    fn test_adding_comments_never_lowers_total() {
        let engine = engine();
        let alice = Participant::human(1, "alice");
        let bodies = ["Initial report", "/cmd", "", "More context with a [link](https://x.io)", "ok"];

        let mut comments = Vec::new();
        let mut previous = Decimal::ZERO;
        for (i, body) in bodies.iter().enumerate() {
            comments.push(Comment::new(i as u64, *body, alice.clone()));
            let total = engine.score_participant(&alice, &comments, &unit()).total();
            assert!(total >= previous);
            previous = total;
        }
    }

    #[test]
    fn test_other_authors_are_ignored() {
        let engine = engine();
        let alice = Participant::human(1, "alice");
        let comments = vec![
            Comment::new(1, "alpha beta", alice.clone()),
            Comment::new(2, "gamma delta", Participant::human(2, "bob")),
        ];

        let total = engine.score_participant(&alice, &comments, &unit());
        assert_eq!(total.comments.len(), 1);
        assert_eq!(total.word_score, dec!(2));
    }

    #[test]
    fn test_negative_element_values_rejected() {
        let values = BTreeMap::from([(ElementKind::Link, dec!(-0.5))]);
        assert!(RubricEngine::new(values).is_err());
    }
}
