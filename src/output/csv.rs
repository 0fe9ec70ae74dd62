use std::collections::BTreeSet;

use anyhow::Result;

use crate::aggregate::durations::{DurationMetrics, Transition};
use crate::aggregate::funnel::{CohortTable, FunnelReport};
use crate::aggregate::rates::{GroupRateMetrics, KeyMetrics};
use crate::aggregate::seasonality::Seasonality;
use crate::aggregate::GroupKey;
use crate::dataset::quality::QualityLog;

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).to_string())
}

pub fn summary_to_csv(metrics: &KeyMetrics) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["metric", "value"])?;
    let rows = [
        ("total_candidates", metrics.total_candidates.to_string()),
        ("offers_sent", metrics.offers_sent.to_string()),
        ("hired", metrics.hired.to_string()),
        ("declined", metrics.declined.to_string()),
        ("no_response", metrics.no_response.to_string()),
        ("offer_acceptance_pct", opt(metrics.offer_acceptance_pct)),
    ];
    for (metric, value) in rows {
        writer.write_record([metric, value.as_str()])?;
    }
    finish(writer)
}

pub fn funnel_to_csv(funnel: &FunnelReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        "stage",
        "count",
        "percent_of_previous",
        "percent_of_applications",
    ])?;
    for stage in &funnel.stages {
        writer.write_record([
            stage.stage.label().to_string(),
            stage.count.to_string(),
            opt(stage.percent_of_previous),
            opt(stage.percent_of_applications),
        ])?;
    }
    finish(writer)
}

/// One record per stage with a column per cohort year.
pub fn cohorts_to_csv(cohorts: &CohortTable) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    let mut header = vec!["stage".to_string()];
    header.extend(cohorts.years.iter().map(|y| y.to_string()));
    header.extend(["unattributed", "total", "conversion_pct"].map(String::from));
    writer.write_record(&header)?;
    for row in &cohorts.rows {
        let mut record = vec![row.stage.label().to_string()];
        record.extend(
            cohorts
                .years
                .iter()
                .map(|y| row.by_year.get(y).copied().unwrap_or(0).to_string()),
        );
        record.push(row.unattributed.to_string());
        record.push(row.total.to_string());
        record.push(opt(row.conversion_pct));
        writer.write_record(&record)?;
    }
    finish(writer)
}

pub fn rates_to_csv(key: GroupKey, rows: &[GroupRateMetrics]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        key.as_slug(),
        "candidates",
        "offers",
        "hire_rate",
        "acceptance_rate",
        "decline_rate",
        "no_response_rate",
    ])?;
    for row in rows {
        writer.write_record([
            row.group.clone(),
            row.candidates.to_string(),
            row.offers.to_string(),
            opt(row.hire_rate),
            opt(row.acceptance_rate),
            opt(row.decline_rate),
            opt(row.no_response_rate),
        ])?;
    }
    finish(writer)
}

pub fn durations_to_csv(metrics: &DurationMetrics) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record([
        metrics.key.as_slug(),
        "transition",
        "samples",
        "excluded_negative",
        "mean_days",
    ])?;
    for group in &metrics.groups {
        for transition in Transition::ALL {
            let Some(cell) = group.cell(transition) else {
                continue;
            };
            writer.write_record([
                group.group.clone(),
                transition.as_slug().to_string(),
                cell.samples.to_string(),
                cell.excluded_negative.to_string(),
                opt(cell.mean_days),
            ])?;
        }
    }
    finish(writer)
}

/// Candidate types seen in any month become trailing count columns.
pub fn seasonality_to_csv(seasonality: &Seasonality) -> Result<String> {
    let kinds: BTreeSet<&str> = seasonality
        .candidate_type_by_month()
        .into_iter()
        .map(|(_, kind, _)| kind)
        .collect();
    let mut writer = csv::Writer::from_writer(vec![]);
    let mut header: Vec<&str> = vec![
        "year",
        "month",
        "applications",
        "accepted",
        "acceptance_rate",
    ];
    header.extend(kinds.iter().copied());
    writer.write_record(&header)?;
    for month in &seasonality.months {
        let mut record = vec![
            seasonality.year.to_string(),
            month.month.to_string(),
            month.applications.to_string(),
            month.accepted.to_string(),
            opt(month.acceptance_rate),
        ];
        record.extend(
            kinds
                .iter()
                .map(|kind| month.candidate_types.get(*kind).copied().unwrap_or(0).to_string()),
        );
        writer.write_record(&record)?;
    }
    finish(writer)
}

pub fn quality_to_csv(quality: &QualityLog) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(["kind", "detail"])?;
    for warning in &quality.warnings {
        writer.write_record([warning.kind().to_string(), warning.to_string()])?;
    }
    finish(writer)
}
