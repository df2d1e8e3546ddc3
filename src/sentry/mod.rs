//! Frame analysis collaborator
//!
//! A [`FrameClassifier`] turns one image into a set of labels. [`ThreatLabels`]
//! maps those labels to the human-readable reason sent in dashboard alerts.

mod vision;

pub use vision::{parse_labels, VisionClassifier};

use std::collections::HashSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Image classifier used by `POST /analyze-frame`
///
/// Implementations wrap an external vision service; the relay only consumes
/// the returned labels.
#[async_trait::async_trait]
pub trait FrameClassifier: Send + Sync {
    /// Classifier name for logging and service info
    fn name(&self) -> &str;

    /// Labels detected in `image` (e.g. `{"GUN"}`), empty if nothing matched
    async fn classify(&self, image: &[u8], mime_type: &str) -> Result<HashSet<String>>;
}

/// One alert-raising label and the reason reported for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    pub label: String,
    pub reason: String,
}

impl LabelRule {
    pub fn new(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reason: reason.into(),
        }
    }
}

/// What a classification amounts to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detection {
    /// Matched labels, lowercased, in rule order
    pub detection_types: Vec<String>,
    /// Matched reasons joined with `" + "`; `None` when nothing matched
    pub reason: Option<String>,
}

impl Detection {
    pub fn is_threat(&self) -> bool {
        self.reason.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ThreatLabels {
    rules: Vec<LabelRule>,
}

impl ThreatLabels {
    pub fn new(rules: Vec<LabelRule>) -> Self {
        Self { rules }
    }

    /// Match classifier labels against the rules, case-insensitively
    pub fn evaluate(&self, labels: &HashSet<String>) -> Detection {
        let matched: Vec<&LabelRule> = self
            .rules
            .iter()
            .filter(|rule| labels.iter().any(|l| l.eq_ignore_ascii_case(&rule.label)))
            .collect();

        if matched.is_empty() {
            return Detection::default();
        }

        Detection {
            detection_types: matched.iter().map(|r| r.label.to_lowercase()).collect(),
            reason: Some(
                matched
                    .iter()
                    .map(|r| r.reason.as_str())
                    .collect::<Vec<_>>()
                    .join(" + "),
            ),
        }
    }
}
