use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::aggregate::timeline::CandidateTimeline;
use crate::aggregate::{percent, round1};
use crate::dataset::quality::{DataQualityWarning, QualityLog};
use crate::dataset::schema::{MissingDataError, Stage};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunnelStage {
    pub stage: Stage,
    pub count: usize,
    pub percent_of_previous: Option<f64>,
    pub percent_of_applications: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunnelReport {
    pub stages: Vec<FunnelStage>,
    pub quality: QualityLog,
}

impl FunnelReport {
    pub fn count(&self, stage: Stage) -> Option<usize> {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.count)
    }
}

/// Distinct candidates per funnel stage in canonical process order.
pub fn funnel_counts(timeline: &CandidateTimeline) -> FunnelReport {
    let mut quality = QualityLog::new();
    let mut stages: Vec<FunnelStage> = Vec::with_capacity(Stage::FUNNEL.len());
    let mut applications = 0usize;

    for stage in Stage::FUNNEL {
        let count = timeline.iter().filter(|row| row.reached(stage)).count();
        if stage == Stage::NewApplication {
            applications = count;
        }
        let percent_of_previous = match stages.last() {
            Some(previous) => {
                if count > previous.count {
                    quality.record(DataQualityWarning::StageOrderViolation {
                        stage,
                        count,
                        previous: previous.stage,
                        previous_count: previous.count,
                    });
                }
                percent(count, previous.count)
            }
            None => Some(100.0),
        };
        stages.push(FunnelStage {
            stage,
            count,
            percent_of_previous,
            percent_of_applications: percent(count, applications),
        });
    }

    FunnelReport { stages, quality }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CohortRow {
    pub stage: Stage,
    pub by_year: BTreeMap<i32, usize>,
    pub total: usize,
    /// Candidates who reached the stage but have no application date.
    pub unattributed: usize,
    pub conversion_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CohortTable {
    pub years: Vec<i32>,
    pub rows: Vec<CohortRow>,
}

impl CohortTable {
    pub fn row(&self, stage: Stage) -> Option<&CohortRow> {
        self.rows.iter().find(|r| r.stage == stage)
    }

    pub fn count(&self, stage: Stage, year: i32) -> Option<usize> {
        self.row(stage)
            .map(|r| r.by_year.get(&year).copied().unwrap_or(0))
    }
}

/// Stage counts broken down by application (cohort) year. A candidate is
/// attributed to the year they applied, whatever year they reached the stage.
pub fn cohort_year_breakdown(
    timeline: &CandidateTimeline,
    stages: &[Stage],
) -> Result<CohortTable, MissingDataError> {
    timeline.require_stage(Stage::NewApplication)?;
    let years: Vec<i32> = timeline
        .iter()
        .filter_map(|row| row.cohort_year())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut rows = Vec::with_capacity(stages.len());
    for stage in stages {
        let mut by_year: BTreeMap<i32, usize> = years.iter().map(|y| (*y, 0)).collect();
        let mut unattributed = 0usize;
        for row in timeline.iter().filter(|row| row.reached(*stage)) {
            match row.cohort_year() {
                Some(year) => *by_year.entry(year).or_insert(0) += 1,
                None => unattributed += 1,
            }
        }
        let total = by_year.values().sum();
        rows.push(CohortRow {
            stage: *stage,
            by_year,
            total,
            unattributed,
            conversion_pct: None,
        });
    }

    let applications = rows
        .iter()
        .find(|r| r.stage == Stage::NewApplication)
        .map(|r| r.total);
    if let Some(applications) = applications {
        for row in &mut rows {
            row.conversion_pct = percent(row.total, applications).map(round1);
        }
    }

    Ok(CohortTable { years, rows })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendBand {
    ExceptionalGrowth,
    StrongGrowth,
    ModerateGrowth,
    NoChange,
    ModerateDecline,
    SignificantDecline,
    CriticalDecline,
}

impl TrendBand {
    pub fn classify(change_pct: f64) -> Self {
        if change_pct > 20.0 {
            Self::ExceptionalGrowth
        } else if change_pct > 10.0 {
            Self::StrongGrowth
        } else if change_pct > 0.0 {
            Self::ModerateGrowth
        } else if change_pct == 0.0 {
            Self::NoChange
        } else if change_pct > -10.0 {
            Self::ModerateDecline
        } else if change_pct > -20.0 {
            Self::SignificantDecline
        } else {
            Self::CriticalDecline
        }
    }
}

impl Display for TrendBand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let display = match self {
            Self::ExceptionalGrowth => "exceptional growth",
            Self::StrongGrowth => "strong growth",
            Self::ModerateGrowth => "moderate growth",
            Self::NoChange => "no change",
            Self::ModerateDecline => "moderate decline",
            Self::SignificantDecline => "significant decline",
            Self::CriticalDecline => "critical decline",
        };
        write!(f, "{display}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YearComparison {
    pub year: i32,
    pub previous_year: i32,
    pub conversion_pct: Option<f64>,
    pub previous_conversion_pct: Option<f64>,
    /// Relative change of the conversion rate, not a percentage-point delta.
    pub change_pct: Option<f64>,
    pub trend: Option<TrendBand>,
}

/// Hire conversion (accepted / applications) of one cohort against another.
pub fn compare_cohort_years(table: &CohortTable, year: i32, previous_year: i32) -> YearComparison {
    let conversion = |y: i32| {
        let applications = table.count(Stage::NewApplication, y)?;
        let accepted = table.count(Stage::OfferAccepted, y)?;
        percent(accepted, applications)
    };
    let conversion_pct = conversion(year);
    let previous_conversion_pct = conversion(previous_year);
    let change_pct = match (conversion_pct, previous_conversion_pct) {
        (Some(current), Some(previous)) if previous > 0.0 => {
            Some((current - previous) / previous * 100.0)
        }
        _ => None,
    };
    YearComparison {
        year,
        previous_year,
        conversion_pct,
        previous_conversion_pct,
        change_pct,
        trend: change_pct.map(TrendBand::classify),
    }
}

pub fn year_over_year(table: &CohortTable) -> Vec<YearComparison> {
    table
        .years
        .windows(2)
        .map(|pair| compare_cohort_years(table, pair[1], pair[0]))
        .collect()
}
