//! Review gate.
//!
//! Splits detected changes into those applied automatically and those held
//! until a reviewer decides.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detector::DetectedChange;
use crate::types::{ChangeType, ReviewAction};

/// Risk policy mapping change types to review actions.
///
/// Types missing from `rules` fall back to the built-in default: additions and
/// metadata updates auto-apply, removals require review. Reassignments use the
/// `reassignment` action regardless of change type when it is stricter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPolicy {
    #[serde(default)]
    pub rules: BTreeMap<ChangeType, ReviewAction>,
    #[serde(default = "default_reassignment")]
    pub reassignment: ReviewAction,
}

fn default_reassignment() -> ReviewAction {
    ReviewAction::RequiresReview
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            rules: BTreeMap::new(),
            reassignment: default_reassignment(),
        }
    }
}

impl ReviewPolicy {
    /// Every change requires review.
    #[must_use]
    pub fn review_everything() -> Self {
        Self {
            rules: ChangeType::ALL
                .into_iter()
                .map(|t| (t, ReviewAction::RequiresReview))
                .collect(),
            reassignment: ReviewAction::RequiresReview,
        }
    }

    /// Every change auto-applies.
    #[must_use]
    pub fn trust_everything() -> Self {
        Self {
            rules: ChangeType::ALL
                .into_iter()
                .map(|t| (t, ReviewAction::AutoApply))
                .collect(),
            reassignment: ReviewAction::AutoApply,
        }
    }

    /// Override the action for one change type.
    #[must_use]
    pub fn with_rule(mut self, change_type: ChangeType, action: ReviewAction) -> Self {
        self.rules.insert(change_type, action);
        self
    }

    /// Action for a change type, ignoring reassignment.
    #[must_use]
    pub fn action_for(&self, change_type: ChangeType) -> ReviewAction {
        self.rules
            .get(&change_type)
            .copied()
            .unwrap_or_else(|| default_action(change_type))
    }

    /// Action for a detected change.
    #[must_use]
    pub fn classify(&self, change: &DetectedChange) -> ReviewAction {
        let by_type = self.action_for(change.change_type);
        if change.reassignment && self.reassignment == ReviewAction::RequiresReview {
            return ReviewAction::RequiresReview;
        }
        by_type
    }
}

fn default_action(change_type: ChangeType) -> ReviewAction {
    if change_type.is_removal() {
        ReviewAction::RequiresReview
    } else {
        ReviewAction::AutoApply
    }
}

/// A detected change with its gate decision.
#[derive(Debug, Clone, PartialEq)]
pub struct GatedChange {
    pub change: DetectedChange,
    pub action: ReviewAction,
}

impl GatedChange {
    /// Check if a reviewer must decide.
    #[must_use]
    pub fn requires_review(&self) -> bool {
        self.action == ReviewAction::RequiresReview
    }
}

/// Classify every change, keeping detection order.
#[must_use]
pub fn partition(policy: &ReviewPolicy, changes: Vec<DetectedChange>) -> Vec<GatedChange> {
    changes
        .into_iter()
        .map(|change| GatedChange {
            action: policy.classify(&change),
            change,
        })
        .collect()
}
