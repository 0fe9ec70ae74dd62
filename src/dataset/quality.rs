use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dataset::schema::{Sheet, Stage};

/// Row-level data problems. None of these abort a computation; the affected
/// row is left out of the metric that tripped over it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    MissingCandidateId {
        sheet: Sheet,
        line: u64,
    },
    UnknownStage {
        sheet: Sheet,
        line: u64,
        value: String,
    },
    UnparsedDate {
        line: u64,
        value: String,
    },
    DuplicateCandidate {
        candidate_id: String,
    },
    DuplicateEvent {
        candidate_id: String,
        stage: Stage,
        kept: NaiveDate,
        dropped: NaiveDate,
        conflicting: bool,
    },
    OrphanEvent {
        candidate_id: String,
        stage: Stage,
    },
    NegativeDuration {
        candidate_id: String,
        from: Stage,
        to: Stage,
        days: i64,
    },
    StageOrderViolation {
        stage: Stage,
        count: usize,
        previous: Stage,
        previous_count: usize,
    },
}

impl DataQualityWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCandidateId { .. } => "missing_candidate_id",
            Self::UnknownStage { .. } => "unknown_stage",
            Self::UnparsedDate { .. } => "unparsed_date",
            Self::DuplicateCandidate { .. } => "duplicate_candidate",
            Self::DuplicateEvent { .. } => "duplicate_event",
            Self::OrphanEvent { .. } => "orphan_event",
            Self::NegativeDuration { .. } => "negative_duration",
            Self::StageOrderViolation { .. } => "stage_order_violation",
        }
    }
}

impl Display for DataQualityWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCandidateId { sheet, line } => {
                write!(f, "{sheet} line {line}: empty candidate id, row skipped")
            }
            Self::UnknownStage { sheet, line, value } => {
                write!(f, "{sheet} line {line}: unknown stage `{value}`, row skipped")
            }
            Self::UnparsedDate { line, value } => {
                write!(f, "activity line {line}: unparseable date `{value}`, row skipped")
            }
            Self::DuplicateCandidate { candidate_id } => {
                write!(f, "candidate {candidate_id} listed more than once, first row kept")
            }
            Self::DuplicateEvent {
                candidate_id,
                stage,
                kept,
                dropped,
                conflicting,
            } => {
                if *conflicting {
                    write!(
                        f,
                        "candidate {candidate_id} has conflicting {stage} dates, kept {kept} over {dropped}"
                    )
                } else {
                    write!(f, "candidate {candidate_id} has a repeated {stage} event on {kept}")
                }
            }
            Self::OrphanEvent {
                candidate_id,
                stage,
            } => write!(
                f,
                "{stage} event for unknown candidate {candidate_id}, excluded"
            ),
            Self::NegativeDuration {
                candidate_id,
                from,
                to,
                days,
            } => write!(
                f,
                "candidate {candidate_id} reached {to} {} days before {from}, excluded from durations",
                days.abs()
            ),
            Self::StageOrderViolation {
                stage,
                count,
                previous,
                previous_count,
            } => write!(
                f,
                "{stage} count {count} exceeds {previous} count {previous_count}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityLog {
    pub warnings: Vec<DataQualityWarning>,
}

impl QualityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, warning: DataQualityWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Stores a warning that has already been logged elsewhere.
    pub fn push(&mut self, warning: DataQualityWarning) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: QualityLog) {
        self.warnings.extend(other.warnings);
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.warnings.iter().filter(|w| w.kind() == kind).count()
    }

    pub fn counts_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for warning in &self.warnings {
            *counts.entry(warning.kind()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::{DataQualityWarning, QualityLog};
    use crate::dataset::schema::{Sheet, Stage};

    #[test]
    fn counts_group_by_kind() {
        let mut log = QualityLog::new();
        log.record(DataQualityWarning::DuplicateCandidate {
            candidate_id: "7".to_string(),
        });
        log.record(DataQualityWarning::OrphanEvent {
            candidate_id: "9".to_string(),
            stage: Stage::PhoneScreen,
        });
        log.record(DataQualityWarning::MissingCandidateId {
            sheet: Sheet::Activity,
            line: 4,
        });
        log.record(DataQualityWarning::OrphanEvent {
            candidate_id: "10".to_string(),
            stage: Stage::NewApplication,
        });

        let counts = log.counts_by_kind();
        assert_eq!(counts.get("orphan_event"), Some(&2));
        assert_eq!(counts.get("duplicate_candidate"), Some(&1));
        assert_eq!(log.count("negative_duration"), 0);
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn negative_duration_message_uses_absolute_days() {
        let warning = DataQualityWarning::NegativeDuration {
            candidate_id: "C-1".to_string(),
            from: Stage::NewApplication,
            to: Stage::OfferSent,
            days: -5,
        };
        assert!(warning.to_string().contains("5 days before"));
    }
}
