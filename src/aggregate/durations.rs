use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::aggregate::roles::RoleTypeTable;
use crate::aggregate::timeline::CandidateTimeline;
use crate::aggregate::GroupKey;
use crate::dataset::quality::{DataQualityWarning, QualityLog};
use crate::dataset::schema::{MissingDataError, Stage};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    ApplicationToPhoneScreen,
    PhoneScreenToInterview,
    InterviewToOffer,
    ApplicationToOffer,
}

impl Transition {
    pub const ALL: [Transition; 4] = [
        Transition::ApplicationToPhoneScreen,
        Transition::PhoneScreenToInterview,
        Transition::InterviewToOffer,
        Transition::ApplicationToOffer,
    ];

    pub fn stages(&self) -> (Stage, Stage) {
        match self {
            Self::ApplicationToPhoneScreen => (Stage::NewApplication, Stage::PhoneScreen),
            Self::PhoneScreenToInterview => (Stage::PhoneScreen, Stage::InHouseInterview),
            Self::InterviewToOffer => (Stage::InHouseInterview, Stage::OfferSent),
            Self::ApplicationToOffer => (Stage::NewApplication, Stage::OfferSent),
        }
    }

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::ApplicationToPhoneScreen => "application_to_phone_screen",
            Self::PhoneScreenToInterview => "phone_screen_to_interview",
            Self::InterviewToOffer => "interview_to_offer",
            Self::ApplicationToOffer => "time_to_offer",
        }
    }
}

impl Display for Transition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::ApplicationToPhoneScreen => "Application to Phone Screen",
            Self::PhoneScreenToInterview => "Phone Screen to Interview",
            Self::InterviewToOffer => "Interview to Offer",
            Self::ApplicationToOffer => "Time to Offer",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationCell {
    pub transition: Transition,
    pub samples: usize,
    pub excluded_negative: usize,
    pub mean_days: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupDurations {
    pub group: String,
    pub cells: Vec<DurationCell>,
}

impl GroupDurations {
    pub fn cell(&self, transition: Transition) -> Option<&DurationCell> {
        self.cells.iter().find(|c| c.transition == transition)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DurationMetrics {
    pub key: GroupKey,
    pub groups: Vec<GroupDurations>,
    pub quality: QualityLog,
}

impl DurationMetrics {
    pub fn group(&self, name: &str) -> Option<&GroupDurations> {
        self.groups.iter().find(|g| g.group == name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    total_days: i64,
    samples: usize,
    excluded_negative: usize,
}

/// Mean days spent between stages per group. Missing and negative deltas are
/// left out of the mean; negative ones are counted and logged.
pub fn stage_duration_metrics(
    timeline: &CandidateTimeline,
    key: GroupKey,
    roles: &RoleTypeTable,
) -> Result<DurationMetrics, MissingDataError> {
    duration_metrics(timeline, key, roles, true)
}

/// Negative deltas do not depend on the grouping, so callers computing
/// several keys over one timeline log them for one key only.
pub(crate) fn duration_metrics(
    timeline: &CandidateTimeline,
    key: GroupKey,
    roles: &RoleTypeTable,
    log_warnings: bool,
) -> Result<DurationMetrics, MissingDataError> {
    for stage in Stage::EVENT_STAGES {
        timeline.require_stage(stage)?;
    }

    let mut quality = QualityLog::new();
    let mut groups: BTreeMap<String, [Accumulator; 4]> = BTreeMap::new();
    for row in timeline.iter() {
        let cells = groups
            .entry(key.value_of(&row.candidate, roles))
            .or_default();
        for (idx, transition) in Transition::ALL.iter().enumerate() {
            let (from, to) = transition.stages();
            let Some(days) = row.days_between(from, to) else {
                continue;
            };
            if days < 0 {
                cells[idx].excluded_negative += 1;
                let warning = DataQualityWarning::NegativeDuration {
                    candidate_id: row.candidate.candidate_id.clone(),
                    from,
                    to,
                    days,
                };
                if log_warnings {
                    quality.record(warning);
                } else {
                    quality.push(warning);
                }
                continue;
            }
            cells[idx].total_days += days;
            cells[idx].samples += 1;
        }
    }

    let groups = groups
        .into_iter()
        .map(|(group, accumulators)| GroupDurations {
            group,
            cells: Transition::ALL
                .iter()
                .zip(accumulators)
                .map(|(transition, acc)| DurationCell {
                    transition: *transition,
                    samples: acc.samples,
                    excluded_negative: acc.excluded_negative,
                    mean_days: (acc.samples > 0)
                        .then(|| acc.total_days as f64 / acc.samples as f64),
                })
                .collect(),
        })
        .collect();

    Ok(DurationMetrics {
        key,
        groups,
        quality,
    })
}
