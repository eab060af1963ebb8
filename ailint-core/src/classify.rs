//! Contract for the external finding classifier
//!
//! Classification itself lives outside this crate: a classifier is a pure
//! function over findings, no I/O and no shared state. The persistence
//! layer only consumes its output, and even then only the error/warning
//! tallies stored on a record. The types here pin the shape of that
//! collaboration.

use serde::{Deserialize, Serialize};

use crate::types::{Finding, Severity};

/// Category a classifier assigns to a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Syntax,
    Logic,
    Style,
    Performance,
    Security,
    Imports,
    Naming,
    Complexity,
}

/// Priority rank a classifier assigns to a finding. Lower ranks sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingPriority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl FindingPriority {
    /// Numeric rank, ascending with decreasing urgency.
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

/// A finding enriched with classification output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFinding {
    pub finding: Finding,
    pub category: FindingCategory,
    pub priority: FindingPriority,
    pub fix_suggestion: String,
    pub explanation: String,
    pub documentation_link: Option<String>,
}

/// A pure classifier over findings.
///
/// Implementations must return their output sorted by ascending
/// [`FindingPriority`] rank.
pub trait FindingClassifier {
    fn classify(&self, findings: &[Finding]) -> Vec<ClassifiedFinding>;
}

/// Error and warning counts derived from classified findings, as stored on
/// an analysis record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindingTally {
    pub errors: u32,
    pub warnings: u32,
}

/// Count errors and warnings the way the storage layer records them:
/// critical and error severities tally as errors, warnings as warnings,
/// info findings are not counted.
pub fn tally(classified: &[ClassifiedFinding]) -> FindingTally {
    let mut counts = FindingTally::default();
    for item in classified {
        match item.finding.severity {
            Severity::Critical | Severity::Error => counts.errors += 1,
            Severity::Warning => counts.warnings += 1,
            Severity::Info => {}
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(severity: Severity, priority: FindingPriority) -> ClassifiedFinding {
        ClassifiedFinding {
            finding: Finding {
                line_number: 1,
                column: 1,
                error_type: "test".to_string(),
                severity,
                message: "test".to_string(),
                suggestion: None,
                code_snippet: None,
            },
            category: FindingCategory::Logic,
            priority,
            fix_suggestion: String::new(),
            explanation: String::new(),
            documentation_link: None,
        }
    }

    #[test]
    fn test_priority_ranks_ascend() {
        assert_eq!(FindingPriority::Critical.rank(), 1);
        assert_eq!(FindingPriority::Low.rank(), 4);
        assert!(FindingPriority::Critical < FindingPriority::High);
    }

    #[test]
    fn test_tally_counts_by_severity() {
        let items = vec![
            classified(Severity::Critical, FindingPriority::Critical),
            classified(Severity::Error, FindingPriority::High),
            classified(Severity::Warning, FindingPriority::Medium),
            classified(Severity::Info, FindingPriority::Low),
        ];
        let counts = tally(&items);
        assert_eq!(counts.errors, 2);
        assert_eq!(counts.warnings, 1);
    }

    #[test]
    fn test_tally_empty() {
        assert_eq!(tally(&[]), FindingTally::default());
    }
}
