//! Scoring policy: rubric multipliers, element values and score combination.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::class::ContributionClass;
use crate::error::{ContributionError, Result};
use crate::rubric::ElementKind;

/// How a comment's rubric score and relevance score are combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreCombination {
    /// `rubric × relevance`
    Product,
    /// `rubric × rubric_weight + relevance × relevance_weight`
    WeightedSum {
        rubric_weight: Decimal,
        relevance_weight: Decimal,
    },
}

impl Default for ScoreCombination {
    fn default() -> Self {
        ScoreCombination::Product
    }
}

impl ScoreCombination {
    /// Combine a rubric total with a relevance estimate.
    pub fn combine(&self, rubric: Decimal, relevance: Decimal) -> Decimal {
        match self {
            ScoreCombination::Product => rubric * relevance,
            ScoreCombination::WeightedSum {
                rubric_weight,
                relevance_weight,
            } => rubric * rubric_weight + relevance * relevance_weight,
        }
    }
}

/// Per-class rubric multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RubricMultipliers {
    /// Value of each distinct non-trivial word
    pub word_value: Decimal,
    /// Multiplier applied to the summed element values
    pub formatting: Decimal,
}

impl RubricMultipliers {
    pub fn new(word_value: Decimal, formatting: Decimal) -> Self {
        Self {
            word_value,
            formatting,
        }
    }
}

/// Complete scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Rubric/relevance combination rule
    pub combination: ScoreCombination,
    /// Relevance used when sampling produced no estimate for a comment
    pub relevance_fallback: Decimal,
    /// Value of each formatting element
    pub element_values: BTreeMap<ElementKind, Decimal>,
    /// Multipliers for classes that have no explicit entry
    pub default_multipliers: RubricMultipliers,
    /// Per-class multiplier overrides
    pub classes: BTreeMap<ContributionClass, RubricMultipliers>,
    /// Per-assignee multiplier applied to task rewards
    pub assignee_multiplier: Decimal,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        let element_values = BTreeMap::from([
            (ElementKind::CodeBlock, Decimal::ONE),
            (ElementKind::InlineCode, Decimal::new(5, 1)),
            (ElementKind::Link, Decimal::new(5, 1)),
            (ElementKind::Image, Decimal::ONE),
            (ElementKind::ListItem, Decimal::new(25, 2)),
            (ElementKind::Heading, Decimal::new(5, 1)),
            (ElementKind::Blockquote, Decimal::new(25, 2)),
            (ElementKind::TableRow, Decimal::new(25, 2)),
            (ElementKind::Emphasis, Decimal::new(1, 1)),
        ]);

        let classes = BTreeMap::from([(
            ContributionClass::IssueIssuerSpecification,
            RubricMultipliers::new(Decimal::new(2, 1), Decimal::ONE),
        )]);

        Self {
            combination: ScoreCombination::Product,
            relevance_fallback: Decimal::ZERO,
            element_values,
            default_multipliers: RubricMultipliers::new(Decimal::new(1, 1), Decimal::ONE),
            classes,
            assignee_multiplier: Decimal::ONE,
        }
    }
}

impl ScoringPolicy {
    /// Multipliers for a class.
    pub fn multipliers(&self, class: ContributionClass) -> RubricMultipliers {
        self.classes
            .get(&class)
            .copied()
            .unwrap_or(self.default_multipliers)
    }

    /// Reject values that would let a score decrease or go negative.
    pub fn validate(&self) -> Result<()> {
        let negative = |value: &Decimal| value.is_sign_negative() && !value.is_zero();

        for (kind, value) in &self.element_values {
            if negative(value) {
                return Err(ContributionError::InvalidPolicy(format!(
                    "element value for {kind:?} is negative"
                )));
            }
        }

        let all_multipliers = std::iter::once((None, &self.default_multipliers))
            .chain(self.classes.iter().map(|(class, m)| (Some(*class), m)));
        for (class, multipliers) in all_multipliers {
            if negative(&multipliers.word_value) || negative(&multipliers.formatting) {
                let name = class.map(|c| c.name()).unwrap_or_else(|| "default".into());
                return Err(ContributionError::InvalidPolicy(format!(
                    "multipliers for {name} are negative"
                )));
            }
        }

        if negative(&self.relevance_fallback) || self.relevance_fallback > Decimal::ONE {
            return Err(ContributionError::InvalidPolicy(
                "relevance_fallback must be within [0, 1]".into(),
            ));
        }

        if negative(&self.assignee_multiplier) {
            return Err(ContributionError::InvalidPolicy(
                "assignee_multiplier is negative".into(),
            ));
        }

        if let ScoreCombination::WeightedSum {
            rubric_weight,
            relevance_weight,
        } = &self.combination
        {
            if negative(rubric_weight) || negative(relevance_weight) {
                return Err(ContributionError::InvalidPolicy(
                    "combination weights are negative".into(),
                ));
            }
        }

        Ok(())
    }
}
