use chrono::{Duration, NaiveDate};

use crate::dataset::schema::{ActivityEvent, Candidate, Stage};

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
}

pub fn candidate(
    id: &str,
    source: &str,
    position: &str,
    candidate_type: &str,
    furthest_stage: Stage,
) -> Candidate {
    Candidate {
        candidate_id: id.to_string(),
        application_source: source.to_string(),
        position_title: position.to_string(),
        candidate_type: candidate_type.to_string(),
        furthest_stage: Some(furthest_stage),
    }
}

pub fn event(id: &str, stage: Stage, date_reached: NaiveDate) -> ActivityEvent {
    ActivityEvent {
        candidate_id: id.to_string(),
        stage,
        date_reached,
    }
}

/// A applied Jan 2021 and accepted, B applied Jan 2021 and declined, C
/// applied Feb 2022 and went no further.
pub fn three_candidates() -> (Vec<Candidate>, Vec<ActivityEvent>) {
    let candidates = vec![
        candidate("A", "Agency", "UX Designer", "Campus", Stage::OfferAccepted),
        candidate("B", "Agency", "IT Analyst", "Experienced", Stage::OfferDeclined),
        candidate("C", "Referral", "Account Executive", "Experienced", Stage::NewApplication),
    ];
    let events = vec![
        event("A", Stage::NewApplication, date(2021, 1, 4)),
        event("A", Stage::PhoneScreen, date(2021, 1, 20)),
        event("A", Stage::InHouseInterview, date(2021, 2, 10)),
        event("A", Stage::OfferSent, date(2021, 3, 1)),
        event("B", Stage::NewApplication, date(2021, 1, 18)),
        event("B", Stage::PhoneScreen, date(2021, 2, 1)),
        event("B", Stage::InHouseInterview, date(2021, 3, 15)),
        event("B", Stage::OfferSent, date(2021, 5, 3)),
        event("C", Stage::NewApplication, date(2022, 2, 7)),
    ];
    (candidates, events)
}

/// Deterministic synthetic cohort: every candidate walks the stages in
/// order and stops at a pseudo-random point.
pub fn synthetic_cohort(seed: u64, size: usize) -> (Vec<Candidate>, Vec<ActivityEvent>) {
    const SOURCES: [&str; 4] = ["Agency", "Campus Events", "Referral", "Job Board"];
    const POSITIONS: [&str; 4] = [
        "UX Designer",
        "Financial Analyst",
        "Sr. Business Analyst",
        "Data Wrangler",
    ];
    const TYPES: [&str; 2] = ["Campus", "Experienced"];

    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move |bound: u64| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };

    let mut candidates = Vec::with_capacity(size);
    let mut events = Vec::new();
    for idx in 0..size {
        let id = format!("S{seed}-{idx:04}");
        let depth = next(4) as usize;
        let furthest = if depth == 3 {
            match next(3) {
                0 => Stage::OfferAccepted,
                1 => Stage::OfferDeclined,
                _ => Stage::OfferSent,
            }
        } else {
            Stage::EVENT_STAGES[depth]
        };
        candidates.push(candidate(
            &id,
            SOURCES[next(SOURCES.len() as u64) as usize],
            POSITIONS[next(POSITIONS.len() as u64) as usize],
            TYPES[next(TYPES.len() as u64) as usize],
            furthest,
        ));

        let mut day = date(2020 + next(4) as i32, 1, 1) + Duration::days(next(365) as i64);
        for stage in Stage::EVENT_STAGES.iter().take(depth + 1) {
            events.push(event(&id, *stage, day));
            day += Duration::days(1 + next(30) as i64);
        }
    }
    (candidates, events)
}
