use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::dataset::quality::{DataQualityWarning, QualityLog};
use crate::dataset::schema::{ActivityEvent, Candidate, MissingDataError, Stage};

/// One candidate with the date each stage was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineRow {
    pub candidate: Candidate,
    pub dates: BTreeMap<Stage, NaiveDate>,
}

impl TimelineRow {
    pub fn date(&self, stage: Stage) -> Option<NaiveDate> {
        self.dates.get(&stage).copied()
    }

    pub fn application_date(&self) -> Option<NaiveDate> {
        self.date(Stage::NewApplication)
    }

    pub fn cohort_year(&self) -> Option<i32> {
        self.application_date().map(|d| d.year())
    }

    /// Outcome stages come from the furthest-stage field, the rest from
    /// activity dates.
    pub fn reached(&self, stage: Stage) -> bool {
        if stage.is_outcome() {
            self.candidate.furthest_stage == Some(stage)
        } else {
            self.dates.contains_key(&stage)
        }
    }

    pub fn days_between(&self, from: Stage, to: Stage) -> Option<i64> {
        let start = self.date(from)?;
        let end = self.date(to)?;
        Some((end - start).num_days())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateTimeline {
    pub rows: BTreeMap<String, TimelineRow>,
    pub quality: QualityLog,
}

impl CandidateTimeline {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, candidate_id: &str) -> Option<&TimelineRow> {
        self.rows.get(candidate_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimelineRow> {
        self.rows.values()
    }

    pub fn stage_present(&self, stage: Stage) -> bool {
        self.iter().any(|row| row.dates.contains_key(&stage))
    }

    pub fn require_stage(&self, stage: Stage) -> Result<(), MissingDataError> {
        if self.stage_present(stage) {
            Ok(())
        } else {
            Err(MissingDataError::Stage(stage))
        }
    }
}

/// Pivots activity events into one row per candidate. Every candidate gets a
/// row even without events. Repeated (candidate, stage) events keep the
/// earliest date; events for unknown candidates are dropped. Both cases are
/// logged on the timeline.
pub fn build_timeline(candidates: &[Candidate], events: &[ActivityEvent]) -> CandidateTimeline {
    let mut quality = QualityLog::new();
    let mut rows = BTreeMap::new();
    for candidate in candidates {
        if let Entry::Vacant(slot) = rows.entry(candidate.candidate_id.clone()) {
            slot.insert(TimelineRow {
                candidate: candidate.clone(),
                dates: BTreeMap::new(),
            });
        } else {
            quality.record(DataQualityWarning::DuplicateCandidate {
                candidate_id: candidate.candidate_id.clone(),
            });
        }
    }

    for event in events {
        let Some(row) = rows.get_mut(&event.candidate_id) else {
            quality.record(DataQualityWarning::OrphanEvent {
                candidate_id: event.candidate_id.clone(),
                stage: event.stage,
            });
            continue;
        };
        match row.dates.entry(event.stage) {
            Entry::Vacant(slot) => {
                slot.insert(event.date_reached);
            }
            Entry::Occupied(mut slot) => {
                let existing = *slot.get();
                let kept = existing.min(event.date_reached);
                let dropped = existing.max(event.date_reached);
                slot.insert(kept);
                quality.record(DataQualityWarning::DuplicateEvent {
                    candidate_id: event.candidate_id.clone(),
                    stage: event.stage,
                    kept,
                    dropped,
                    conflicting: kept != dropped,
                });
            }
        }
    }

    CandidateTimeline { rows, quality }
}

#[cfg(test)]
mod tests {
    use super::build_timeline;
    use crate::aggregate::fixtures::{candidate, date, event};
    use crate::dataset::schema::{MissingDataError, Stage};

    #[test]
    fn one_row_per_candidate_including_those_without_events() {
        let candidates = vec![
            candidate("A", "Agency", "UX Designer", "Campus", Stage::OfferAccepted),
            candidate("B", "Referral", "IT Analyst", "Experienced", Stage::NewApplication),
        ];
        let events = vec![
            event("A", Stage::NewApplication, date(2021, 1, 5)),
            event("A", Stage::OfferSent, date(2021, 3, 1)),
        ];
        let timeline = build_timeline(&candidates, &events);
        assert_eq!(timeline.len(), 2);
        assert!(timeline.get("B").expect("row B").dates.is_empty());
        assert_eq!(
            timeline.get("A").and_then(|r| r.date(Stage::OfferSent)),
            Some(date(2021, 3, 1))
        );
        assert!(timeline.quality.is_empty());
    }

    #[test]
    fn duplicate_events_keep_earliest_date() {
        let candidates = vec![candidate("A", "Agency", "UX Designer", "Campus", Stage::OfferSent)];
        let events = vec![
            event("A", Stage::OfferSent, date(2021, 4, 10)),
            event("A", Stage::OfferSent, date(2021, 4, 2)),
            event("A", Stage::OfferSent, date(2021, 4, 2)),
        ];
        let timeline = build_timeline(&candidates, &events);
        let row = timeline.get("A").expect("row");
        assert_eq!(row.date(Stage::OfferSent), Some(date(2021, 4, 2)));
        assert_eq!(timeline.quality.count("duplicate_event"), 2);
    }

    #[test]
    fn orphan_events_are_excluded_and_logged() {
        let candidates = vec![candidate("A", "Agency", "UX Designer", "Campus", Stage::PhoneScreen)];
        let events = vec![
            event("A", Stage::NewApplication, date(2022, 2, 1)),
            event("Z", Stage::NewApplication, date(2022, 2, 1)),
        ];
        let timeline = build_timeline(&candidates, &events);
        assert_eq!(timeline.len(), 1);
        assert!(timeline.get("Z").is_none());
        assert_eq!(timeline.quality.count("orphan_event"), 1);
    }

    #[test]
    fn outcome_stages_read_from_furthest_stage() {
        let candidates = vec![candidate("A", "Agency", "UX Designer", "Campus", Stage::OfferDeclined)];
        let timeline = build_timeline(&candidates, &[]);
        let row = timeline.get("A").expect("row");
        assert!(row.reached(Stage::OfferDeclined));
        assert!(!row.reached(Stage::OfferAccepted));
        assert!(!row.reached(Stage::OfferSent));
    }

    #[test]
    fn require_stage_reports_missing_stage() {
        let candidates = vec![candidate("A", "Agency", "UX Designer", "Campus", Stage::NewApplication)];
        let timeline = build_timeline(&candidates, &[]);
        assert_eq!(
            timeline.require_stage(Stage::NewApplication),
            Err(MissingDataError::Stage(Stage::NewApplication))
        );
    }

    #[test]
    fn days_between_may_be_negative() {
        let candidates = vec![candidate("A", "Agency", "UX Designer", "Campus", Stage::OfferSent)];
        let events = vec![
            event("A", Stage::NewApplication, date(2021, 5, 10)),
            event("A", Stage::OfferSent, date(2021, 5, 1)),
        ];
        let timeline = build_timeline(&candidates, &events);
        let row = timeline.get("A").expect("row");
        assert_eq!(row.days_between(Stage::NewApplication, Stage::OfferSent), Some(-9));
        assert_eq!(row.cohort_year(), Some(2021));
    }
}
