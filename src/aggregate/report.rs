use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::durations::{duration_metrics, DurationMetrics};
use crate::aggregate::funnel::{
    cohort_year_breakdown, funnel_counts, year_over_year, CohortTable, FunnelReport,
    YearComparison,
};
use crate::aggregate::rates::{
    group_rate_averages, grouped_rate_metrics, key_metrics, GroupRateMetrics, KeyMetrics,
    RateAverages,
};
use crate::aggregate::roles::RoleTypeTable;
use crate::aggregate::seasonality::{available_years, monthly_seasonality, Seasonality};
use crate::aggregate::timeline::{build_timeline, CandidateTimeline};
use crate::aggregate::GroupKey;
use crate::dataset::quality::QualityLog;
use crate::dataset::schema::{MissingDataError, Sheet, Stage};
use crate::dataset::Dataset;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportOptions {
    /// Defaults to the latest cohort year present in the data.
    pub seasonality_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupSection {
    pub key: GroupKey,
    pub rates: Vec<GroupRateMetrics>,
    pub averages: RateAverages,
    pub durations: Option<DurationMetrics>,
}

/// A view that could not be computed from the loaded sheets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnavailableSection {
    pub section: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecruitmentReport {
    pub fingerprint: String,
    pub key_metrics: KeyMetrics,
    pub funnel: FunnelReport,
    pub cohorts: Option<CohortTable>,
    pub year_over_year: Vec<YearComparison>,
    pub groups: Vec<GroupSection>,
    pub available_years: Vec<i32>,
    pub seasonality: Option<Seasonality>,
    pub unavailable: Vec<UnavailableSection>,
    pub quality: QualityLog,
}

impl RecruitmentReport {
    pub fn group(&self, key: GroupKey) -> Option<&GroupSection> {
        self.groups.iter().find(|g| g.key == key)
    }
}

fn unavailable(section: impl Into<String>, err: &MissingDataError) -> UnavailableSection {
    let section = section.into();
    debug!(%section, %err, "section unavailable");
    UnavailableSection {
        section,
        reason: err.to_string(),
    }
}

/// Runs every view over a single timeline built from `dataset`.
pub fn build_report(
    dataset: &Dataset,
    options: &ReportOptions,
    roles: &RoleTypeTable,
) -> Result<RecruitmentReport, MissingDataError> {
    let timeline = build_timeline(&dataset.candidates, &dataset.events);
    build_report_from_timeline(dataset, &timeline, options, roles)
}

/// Same as [`build_report`] for a caller that keeps the timeline around.
/// `timeline` must have been built from `dataset`.
pub fn build_report_from_timeline(
    dataset: &Dataset,
    timeline: &CandidateTimeline,
    options: &ReportOptions,
    roles: &RoleTypeTable,
) -> Result<RecruitmentReport, MissingDataError> {
    if dataset.candidates.is_empty() {
        return Err(MissingDataError::EmptySheet(Sheet::Candidates));
    }

    let mut quality = dataset.quality.clone();
    quality.extend(timeline.quality.clone());
    let mut missing = Vec::new();

    let funnel = funnel_counts(timeline);
    quality.extend(funnel.quality.clone());

    let (cohorts, year_over_year) = match cohort_year_breakdown(timeline, &Stage::FUNNEL) {
        Ok(table) => {
            let comparisons = year_over_year(&table);
            (Some(table), comparisons)
        }
        Err(err) => {
            missing.push(unavailable("cohorts", &err));
            (None, Vec::new())
        }
    };

    let mut groups = Vec::with_capacity(GroupKey::ALL.len());
    for key in GroupKey::ALL {
        let rates = grouped_rate_metrics(timeline, key, roles);
        let averages = group_rate_averages(&rates);
        // Every key sees the same negative deltas; log and keep one copy.
        let primary = key == GroupKey::ApplicationSource;
        let durations = match duration_metrics(timeline, key, roles, primary) {
            Ok(durations) => {
                if primary {
                    quality.extend(durations.quality.clone());
                }
                Some(durations)
            }
            Err(err) => {
                missing.push(unavailable(format!("durations by {}", key.as_slug()), &err));
                None
            }
        };
        groups.push(GroupSection {
            key,
            rates,
            averages,
            durations,
        });
    }

    let years = available_years(timeline);
    let seasonality = match options.seasonality_year.or_else(|| years.last().copied()) {
        Some(year) => match monthly_seasonality(timeline, year) {
            Ok(seasonality) => Some(seasonality),
            Err(err) => {
                missing.push(unavailable("seasonality", &err));
                None
            }
        },
        None => {
            missing.push(unavailable(
                "seasonality",
                &MissingDataError::Stage(Stage::NewApplication),
            ));
            None
        }
    };

    info!(
        candidates = timeline.len(),
        warnings = quality.len(),
        unavailable = missing.len(),
        "report built"
    );

    Ok(RecruitmentReport {
        fingerprint: dataset.fingerprint.clone(),
        key_metrics: key_metrics(timeline),
        funnel,
        cohorts,
        year_over_year,
        groups,
        available_years: years,
        seasonality,
        unavailable: missing,
        quality,
    })
}
