pub mod durations;
pub mod funnel;
pub mod rates;
pub mod report;
pub mod roles;
pub mod seasonality;
pub mod timeline;

#[cfg(test)]
pub(crate) mod fixtures;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::roles::RoleTypeTable;
use crate::dataset::Candidate;

pub use durations::{
    stage_duration_metrics, DurationCell, DurationMetrics, GroupDurations, Transition,
};
pub use funnel::{
    compare_cohort_years, cohort_year_breakdown, funnel_counts, year_over_year, CohortRow,
    CohortTable, FunnelReport, FunnelStage, TrendBand, YearComparison,
};
pub use rates::{
    group_rate_averages, grouped_rate_metrics, key_metrics, GroupRateMetrics, KeyMetrics,
    RateAverages,
};
pub use report::{
    build_report, build_report_from_timeline, GroupSection, RecruitmentReport, ReportOptions,
    UnavailableSection,
};
pub use seasonality::{
    available_years, month_name, monthly_seasonality, MonthBucket, Seasonality, SourceSeasonality,
};
pub use timeline::{build_timeline, CandidateTimeline, TimelineRow};

/// Candidate attribute used to bucket grouped metrics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    ApplicationSource,
    PositionTitle,
    RoleType,
    CandidateType,
}

impl GroupKey {
    pub const ALL: [GroupKey; 4] = [
        GroupKey::ApplicationSource,
        GroupKey::PositionTitle,
        GroupKey::RoleType,
        GroupKey::CandidateType,
    ];

    pub fn value_of(&self, candidate: &Candidate, roles: &RoleTypeTable) -> String {
        match self {
            Self::ApplicationSource => candidate.application_source.clone(),
            Self::PositionTitle => candidate.position_title.clone(),
            Self::RoleType => roles.role_type(&candidate.position_title).to_string(),
            Self::CandidateType => candidate.candidate_type.clone(),
        }
    }

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::ApplicationSource => "application_source",
            Self::PositionTitle => "position_title",
            Self::RoleType => "role_type",
            Self::CandidateType => "candidate_type",
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::ApplicationSource => "Application Source",
            Self::PositionTitle => "Position Title",
            Self::RoleType => "Role Type",
            Self::CandidateType => "Candidate Type",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Error)]
#[error("unknown group key: {0}")]
pub struct GroupKeyParseError(pub String);

impl FromStr for GroupKey {
    type Err = GroupKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "application_source" | "source" => Ok(Self::ApplicationSource),
            "position_title" | "position" | "title" => Ok(Self::PositionTitle),
            "role_type" | "role" => Ok(Self::RoleType),
            "candidate_type" | "type" => Ok(Self::CandidateType),
            _ => Err(GroupKeyParseError(s.to_string())),
        }
    }
}

/// `numerator / denominator`, undefined for an empty denominator.
pub fn fraction(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        return None;
    }
    Some(numerator as f64 / denominator as f64)
}

pub fn percent(numerator: usize, denominator: usize) -> Option<f64> {
    fraction(numerator, denominator).map(|f| f * 100.0)
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut total = 0.0;
    let mut count = 0usize;
    for value in values {
        total += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(total / count as f64)
    }
}
