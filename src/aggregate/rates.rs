use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::roles::RoleTypeTable;
use crate::aggregate::timeline::{CandidateTimeline, TimelineRow};
use crate::aggregate::{fraction, mean, percent, GroupKey};
use crate::dataset::schema::Stage;

/// Conversion metrics for one group value. Offer rates are percentages over
/// candidates whose furthest stage is an offer stage; `hire_rate` is a
/// fraction over every candidate in the group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupRateMetrics {
    pub group: String,
    pub candidates: usize,
    pub hired: usize,
    pub offers: usize,
    pub accepted: usize,
    pub declined: usize,
    pub no_response: usize,
    pub hire_rate: Option<f64>,
    pub acceptance_rate: Option<f64>,
    pub decline_rate: Option<f64>,
    pub no_response_rate: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    candidates: usize,
    accepted: usize,
    declined: usize,
    no_response: usize,
}

impl Tally {
    fn add(&mut self, row: &TimelineRow) {
        self.candidates += 1;
        if row.candidate.hired() {
            self.accepted += 1;
            return;
        }
        match row.candidate.furthest_stage {
            Some(Stage::OfferDeclined) => self.declined += 1,
            Some(Stage::OfferSent) => self.no_response += 1,
            _ => {}
        }
    }

    fn offers(&self) -> usize {
        self.accepted + self.declined + self.no_response
    }

    fn into_metrics(self, group: String) -> GroupRateMetrics {
        let offers = self.offers();
        GroupRateMetrics {
            group,
            candidates: self.candidates,
            hired: self.accepted,
            offers,
            accepted: self.accepted,
            declined: self.declined,
            no_response: self.no_response,
            hire_rate: fraction(self.accepted, self.candidates),
            acceptance_rate: percent(self.accepted, offers),
            decline_rate: percent(self.declined, offers),
            no_response_rate: percent(self.no_response, offers),
        }
    }
}

pub fn grouped_rate_metrics(
    timeline: &CandidateTimeline,
    key: GroupKey,
    roles: &RoleTypeTable,
) -> Vec<GroupRateMetrics> {
    let mut groups: BTreeMap<String, Tally> = BTreeMap::new();
    for row in timeline.iter() {
        groups
            .entry(key.value_of(&row.candidate, roles))
            .or_default()
            .add(row);
    }
    groups
        .into_iter()
        .map(|(group, tally)| tally.into_metrics(group))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RateAverages {
    pub acceptance_rate: Option<f64>,
    pub decline_rate: Option<f64>,
    pub no_response_rate: Option<f64>,
}

/// Unweighted mean of each offer rate over the groups where it is defined.
pub fn group_rate_averages(rows: &[GroupRateMetrics]) -> RateAverages {
    RateAverages {
        acceptance_rate: mean(rows.iter().filter_map(|r| r.acceptance_rate)),
        decline_rate: mean(rows.iter().filter_map(|r| r.decline_rate)),
        no_response_rate: mean(rows.iter().filter_map(|r| r.no_response_rate)),
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct KeyMetrics {
    pub total_candidates: usize,
    pub offers_sent: usize,
    pub hired: usize,
    pub declined: usize,
    pub no_response: usize,
    pub offer_acceptance_pct: Option<f64>,
}

pub fn key_metrics(timeline: &CandidateTimeline) -> KeyMetrics {
    let mut tally = Tally::default();
    for row in timeline.iter() {
        tally.add(row);
    }
    let offers_sent = tally.offers();
    KeyMetrics {
        total_candidates: tally.candidates,
        offers_sent,
        hired: tally.accepted,
        declined: tally.declined,
        no_response: tally.no_response,
        offer_acceptance_pct: percent(tally.accepted, offers_sent),
    }
}

#[cfg(test)]
mod tests {
    use super::{group_rate_averages, grouped_rate_metrics, key_metrics};
    use crate::aggregate::fixtures::{candidate, synthetic_cohort, three_candidates};
    use crate::aggregate::roles::RoleTypeTable;
    use crate::aggregate::timeline::build_timeline;
    use crate::aggregate::GroupKey;
    use crate::dataset::schema::Stage;

    #[test]
    fn agency_splits_evenly_between_accept_and_decline() {
        let (candidates, events) = three_candidates();
        let timeline = build_timeline(&candidates, &events);
        let rows = grouped_rate_metrics(
            &timeline,
            GroupKey::ApplicationSource,
            RoleTypeTable::defaults(),
        );

        let groups: Vec<&str> = rows.iter().map(|r| r.group.as_str()).collect();
        assert_eq!(groups, vec!["Agency", "Referral"]);

        let agency = &rows[0];
        assert_eq!(agency.candidates, 2);
        assert_eq!(agency.acceptance_rate, Some(50.0));
        assert_eq!(agency.decline_rate, Some(50.0));
        assert_eq!(agency.no_response_rate, Some(0.0));
        assert_eq!(agency.hire_rate, Some(0.5));

        let referral = &rows[1];
        assert_eq!(referral.offers, 0);
        assert_eq!(referral.acceptance_rate, None);
        assert_eq!(referral.hire_rate, Some(0.0));
    }

    #[test]
    fn offer_rates_sum_to_one_hundred() {
        for seed in 0..10 {
            let (candidates, events) = synthetic_cohort(seed, 150);
            let timeline = build_timeline(&candidates, &events);
            for key in GroupKey::ALL {
                for row in grouped_rate_metrics(&timeline, key, RoleTypeTable::defaults()) {
                    let (Some(a), Some(d), Some(n)) =
                        (row.acceptance_rate, row.decline_rate, row.no_response_rate)
                    else {
                        assert_eq!(row.offers, 0);
                        continue;
                    };
                    assert!((a + d + n - 100.0).abs() < 1e-9, "{key} {}", row.group);
                    let hire_rate = row.hire_rate.expect("non-empty group");
                    assert!((0.0..=1.0).contains(&hire_rate));
                }
            }
        }
    }

    #[test]
    fn role_type_groups_use_lookup_table() {
        let (candidates, events) = three_candidates();
        let timeline = build_timeline(&candidates, &events);
        let rows = grouped_rate_metrics(&timeline, GroupKey::RoleType, RoleTypeTable::defaults());
        let groups: Vec<(&str, usize)> =
            rows.iter().map(|r| (r.group.as_str(), r.candidates)).collect();
        assert_eq!(groups, vec![("Non-Tech", 1), ("Tech", 2)]);
    }

    #[test]
    fn averages_skip_undefined_groups() {
        let (candidates, events) = three_candidates();
        let timeline = build_timeline(&candidates, &events);
        let rows = grouped_rate_metrics(
            &timeline,
            GroupKey::PositionTitle,
            RoleTypeTable::defaults(),
        );
        let averages = group_rate_averages(&rows);
        // UX Designer accepted, IT Analyst declined, Account Executive had no offer.
        assert_eq!(averages.acceptance_rate, Some(50.0));
        assert_eq!(averages.decline_rate, Some(50.0));
        assert_eq!(averages.no_response_rate, Some(0.0));
        assert_eq!(group_rate_averages(&[]).acceptance_rate, None);
    }

    #[test]
    fn key_metrics_count_offer_outcomes() {
        let (mut candidates, events) = three_candidates();
        candidates.push(candidate("D", "Job Board", "Finance Manager", "Experienced", Stage::OfferSent));
        let metrics = key_metrics(&build_timeline(&candidates, &events));
        assert_eq!(metrics.total_candidates, 4);
        assert_eq!(metrics.offers_sent, 3);
        assert_eq!(metrics.hired, 1);
        assert_eq!(metrics.declined, 1);
        assert_eq!(metrics.no_response, 1);
        let acceptance = metrics.offer_acceptance_pct.expect("offers exist");
        assert!((acceptance - 100.0 / 3.0).abs() < 1e-9);
    }
}
