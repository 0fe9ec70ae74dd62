use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::aggregate::percent;
use crate::aggregate::timeline::CandidateTimeline;
use crate::dataset::schema::{MissingDataError, Stage};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const PEAK_MONTHS: usize = 3;
const TOP_SOURCES: usize = 5;

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
        .unwrap_or("?")
}

/// Applications submitted in one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonthBucket {
    pub month: u32,
    pub month_name: String,
    pub applications: usize,
    pub accepted: usize,
    pub acceptance_rate: Option<f64>,
    pub candidate_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSeasonality {
    pub source: String,
    pub applications: usize,
    pub offer_acceptance_rate: Option<f64>,
    pub offer_sent_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seasonality {
    pub year: i32,
    /// Calendar order; months without applications are absent.
    pub months: Vec<MonthBucket>,
    pub peak_months: Vec<u32>,
    pub best_acceptance_months: Vec<u32>,
    pub top_sources: Vec<SourceSeasonality>,
}

impl Seasonality {
    pub fn volume_by_month(&self) -> Vec<(u32, usize)> {
        self.months.iter().map(|m| (m.month, m.applications)).collect()
    }

    pub fn acceptance_rate_by_month(&self) -> Vec<(u32, Option<f64>)> {
        self.months.iter().map(|m| (m.month, m.acceptance_rate)).collect()
    }

    pub fn candidate_type_by_month(&self) -> Vec<(u32, &str, usize)> {
        self.months
            .iter()
            .flat_map(|m| {
                m.candidate_types
                    .iter()
                    .map(move |(kind, count)| (m.month, kind.as_str(), *count))
            })
            .collect()
    }
}

pub fn available_years(timeline: &CandidateTimeline) -> Vec<i32> {
    timeline
        .iter()
        .filter_map(|row| row.cohort_year())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Default)]
struct SourceTally {
    applications: usize,
    accepted: usize,
    offered: usize,
}

/// Buckets `year`'s applications by application month. A year with no
/// applications yields empty buckets rather than an error.
pub fn monthly_seasonality(
    timeline: &CandidateTimeline,
    year: i32,
) -> Result<Seasonality, MissingDataError> {
    timeline.require_stage(Stage::NewApplication)?;

    let mut months: BTreeMap<u32, MonthBucket> = BTreeMap::new();
    let mut sources: BTreeMap<&str, SourceTally> = BTreeMap::new();
    for row in timeline.iter() {
        let Some(applied) = row.application_date() else {
            continue;
        };
        if applied.year() != year {
            continue;
        }
        let accepted = row.candidate.hired();

        let bucket = months.entry(applied.month()).or_insert_with(|| MonthBucket {
            month: applied.month(),
            month_name: month_name(applied.month()).to_string(),
            applications: 0,
            accepted: 0,
            acceptance_rate: None,
            candidate_types: BTreeMap::new(),
        });
        bucket.applications += 1;
        if accepted {
            bucket.accepted += 1;
        }
        *bucket
            .candidate_types
            .entry(row.candidate.candidate_type.clone())
            .or_insert(0) += 1;

        let source = sources
            .entry(row.candidate.application_source.as_str())
            .or_default();
        source.applications += 1;
        if accepted {
            source.accepted += 1;
        }
        if row.candidate.received_offer() {
            source.offered += 1;
        }
    }

    let mut months: Vec<MonthBucket> = months.into_values().collect();
    for bucket in &mut months {
        bucket.acceptance_rate = percent(bucket.accepted, bucket.applications);
    }

    let mut by_volume: Vec<&MonthBucket> = months.iter().collect();
    by_volume.sort_by(|a, b| b.applications.cmp(&a.applications));
    let peak_months = by_volume.iter().take(PEAK_MONTHS).map(|m| m.month).collect();

    let mut by_acceptance: Vec<(u32, f64)> = months
        .iter()
        .filter_map(|m| m.acceptance_rate.map(|rate| (m.month, rate)))
        .collect();
    by_acceptance.sort_by(|a, b| b.1.total_cmp(&a.1));
    let best_acceptance_months = by_acceptance
        .into_iter()
        .take(PEAK_MONTHS)
        .map(|(month, _)| month)
        .collect();

    let mut top_sources: Vec<SourceSeasonality> = sources
        .into_iter()
        .map(|(source, tally)| SourceSeasonality {
            source: source.to_string(),
            applications: tally.applications,
            offer_acceptance_rate: percent(tally.accepted, tally.applications),
            offer_sent_rate: percent(tally.offered, tally.applications),
        })
        .collect();
    top_sources.sort_by(|a, b| b.applications.cmp(&a.applications));
    top_sources.truncate(TOP_SOURCES);

    Ok(Seasonality {
        year,
        months,
        peak_months,
        best_acceptance_months,
        top_sources,
    })
}

#[cfg(test)]
mod tests {
    use super::{available_years, month_name, monthly_seasonality};
    use crate::aggregate::fixtures::{candidate, date, event, synthetic_cohort, three_candidates};
    use crate::aggregate::timeline::build_timeline;
    use crate::dataset::schema::{MissingDataError, Stage};

    #[test]
    fn buckets_applications_by_month_in_calendar_order() {
        let (candidates, events) = three_candidates();
        let timeline = build_timeline(&candidates, &events);
        let seasonality = monthly_seasonality(&timeline, 2021).expect("seasonality");

        assert_eq!(seasonality.volume_by_month(), vec![(1, 2)]);
        assert_eq!(seasonality.acceptance_rate_by_month(), vec![(1, Some(50.0))]);
        assert_eq!(
            seasonality.candidate_type_by_month(),
            vec![(1, "Campus", 1), (1, "Experienced", 1)]
        );
        assert_eq!(seasonality.peak_months, vec![1]);

        let agency = &seasonality.top_sources[0];
        assert_eq!(agency.source, "Agency");
        assert_eq!(agency.offer_acceptance_rate, Some(50.0));
        assert_eq!(agency.offer_sent_rate, Some(100.0));
    }

    #[test]
    fn empty_months_are_omitted_and_order_is_calendar() {
        for seed in 0..5 {
            let (candidates, events) = synthetic_cohort(seed, 200);
            let timeline = build_timeline(&candidates, &events);
            for year in available_years(&timeline) {
                let seasonality = monthly_seasonality(&timeline, year).expect("seasonality");
                let months: Vec<u32> = seasonality.months.iter().map(|m| m.month).collect();
                assert!(months.windows(2).all(|w| w[0] < w[1]));
                assert!(seasonality.months.iter().all(|m| m.applications > 0));
                assert!(seasonality.peak_months.len() <= 3);
                assert!(seasonality.top_sources.len() <= 5);
            }
        }
    }

    #[test]
    fn peak_ties_keep_calendar_order() {
        let candidates = vec![
            candidate("A", "Agency", "UX Designer", "Campus", Stage::NewApplication),
            candidate("B", "Agency", "UX Designer", "Campus", Stage::NewApplication),
            candidate("C", "Agency", "UX Designer", "Campus", Stage::OfferAccepted),
            candidate("D", "Agency", "UX Designer", "Campus", Stage::NewApplication),
            candidate("E", "Agency", "UX Designer", "Campus", Stage::NewApplication),
        ];
        let events = vec![
            event("A", Stage::NewApplication, date(2023, 9, 1)),
            event("B", Stage::NewApplication, date(2023, 3, 1)),
            event("C", Stage::NewApplication, date(2023, 11, 1)),
            event("D", Stage::NewApplication, date(2023, 6, 1)),
            event("E", Stage::NewApplication, date(2023, 9, 2)),
        ];
        let timeline = build_timeline(&candidates, &events);
        let seasonality = monthly_seasonality(&timeline, 2023).expect("seasonality");
        assert_eq!(seasonality.peak_months, vec![9, 3, 6]);
        assert_eq!(seasonality.best_acceptance_months, vec![11, 3, 6]);
        assert_eq!(month_name(seasonality.peak_months[0]), "September");
    }

    #[test]
    fn year_without_applications_is_empty() {
        let (candidates, events) = three_candidates();
        let timeline = build_timeline(&candidates, &events);
        let seasonality = monthly_seasonality(&timeline, 1999).expect("seasonality");
        assert!(seasonality.months.is_empty());
        assert!(seasonality.top_sources.is_empty());
        assert_eq!(available_years(&timeline), vec![2021, 2022]);
    }

    #[test]
    fn requires_application_dates() {
        let candidates = vec![candidate("A", "Agency", "UX Designer", "Campus", Stage::NewApplication)];
        let timeline = build_timeline(&candidates, &[]);
        assert_eq!(
            monthly_seasonality(&timeline, 2021),
            Err(MissingDataError::Stage(Stage::NewApplication))
        );
    }
}
