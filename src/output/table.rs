use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::aggregate::durations::{DurationMetrics, Transition};
use crate::aggregate::funnel::{CohortTable, FunnelReport, TrendBand, YearComparison};
use crate::aggregate::rates::{GroupRateMetrics, KeyMetrics, RateAverages};
use crate::aggregate::report::RecruitmentReport;
use crate::aggregate::seasonality::{month_name, Seasonality};
use crate::aggregate::GroupKey;
use crate::dataset::quality::QualityLog;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}%"))
        .unwrap_or_else(|| "-".to_string())
}

fn days(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_summary_table(metrics: &KeyMetrics) -> String {
    let mut table = new_table();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![
        "Total Candidates".to_string(),
        metrics.total_candidates.to_string(),
    ]);
    table.add_row(vec!["Offers Sent".to_string(), metrics.offers_sent.to_string()]);
    table.add_row(vec!["Hired".to_string(), metrics.hired.to_string()]);
    table.add_row(vec!["Declined".to_string(), metrics.declined.to_string()]);
    table.add_row(vec!["No Response".to_string(), metrics.no_response.to_string()]);
    table.add_row(vec![
        "Offer Acceptance".to_string(),
        pct(metrics.offer_acceptance_pct),
    ]);
    table.to_string()
}

pub fn render_funnel_table(funnel: &FunnelReport) -> String {
    let mut table = new_table();
    table.set_header(vec!["Stage", "Candidates", "% of Previous", "% of Applications"]);
    for stage in &funnel.stages {
        table.add_row(vec![
            stage.stage.to_string(),
            stage.count.to_string(),
            pct(stage.percent_of_previous),
            pct(stage.percent_of_applications),
        ]);
    }
    table.to_string()
}

fn trend_cell(trend: Option<TrendBand>) -> Cell {
    match trend {
        Some(
            band @ (TrendBand::ExceptionalGrowth
            | TrendBand::StrongGrowth
            | TrendBand::ModerateGrowth),
        ) => Cell::new(band.to_string()).fg(Color::Green),
        Some(band @ TrendBand::NoChange) => Cell::new(band.to_string()),
        Some(band) => Cell::new(band.to_string()).fg(Color::Red),
        None => Cell::new("-"),
    }
}

pub fn render_cohort_table(cohorts: &CohortTable, comparisons: &[YearComparison]) -> String {
    let mut table = new_table();
    let mut header = vec!["Stage".to_string()];
    header.extend(cohorts.years.iter().map(|y| y.to_string()));
    header.extend(["Unattributed", "Total", "Conversion"].map(String::from));
    table.set_header(header);
    for row in &cohorts.rows {
        let mut cells = vec![row.stage.to_string()];
        cells.extend(
            cohorts
                .years
                .iter()
                .map(|y| row.by_year.get(y).copied().unwrap_or(0).to_string()),
        );
        cells.push(row.unattributed.to_string());
        cells.push(row.total.to_string());
        cells.push(pct(row.conversion_pct));
        table.add_row(cells);
    }

    let mut out = table.to_string();
    if comparisons.is_empty() {
        return out;
    }
    let mut yoy = new_table();
    yoy.set_header(vec!["Year", "Conversion", "Previous", "Change", "Trend"]);
    for cmp in comparisons {
        yoy.add_row(Row::from(vec![
            Cell::new(format!("{} vs {}", cmp.year, cmp.previous_year)),
            Cell::new(pct(cmp.conversion_pct)),
            Cell::new(pct(cmp.previous_conversion_pct)),
            Cell::new(
                cmp.change_pct
                    .map(|c| format!("{c:+.1}%"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            trend_cell(cmp.trend),
        ]));
    }
    out.push('\n');
    out.push_str(&yoy.to_string());
    out
}

pub fn render_rates_table(
    key: GroupKey,
    rows: &[GroupRateMetrics],
    averages: &RateAverages,
) -> String {
    let mut table = new_table();
    table.set_header(vec![
        key.to_string().as_str(),
        "Candidates",
        "Offers",
        "Hire Rate",
        "Accepted",
        "Declined",
        "No Response",
    ]);
    for row in rows {
        table.add_row(vec![
            row.group.clone(),
            row.candidates.to_string(),
            row.offers.to_string(),
            pct(row.hire_rate.map(|r| r * 100.0)),
            pct(row.acceptance_rate),
            pct(row.decline_rate),
            pct(row.no_response_rate),
        ]);
    }
    table.add_row(Row::from(vec![
        Cell::new("Average").fg(Color::Cyan),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(pct(averages.acceptance_rate)),
        Cell::new(pct(averages.decline_rate)),
        Cell::new(pct(averages.no_response_rate)),
    ]));
    table.to_string()
}

pub fn render_durations_table(metrics: &DurationMetrics) -> String {
    let mut table = new_table();
    let mut header = vec![metrics.key.to_string()];
    header.extend(Transition::ALL.iter().map(|t| format!("{t} (days)")));
    table.set_header(header);
    for group in &metrics.groups {
        let mut cells = vec![group.group.clone()];
        for transition in Transition::ALL {
            let cell = group.cell(transition);
            let label = match cell {
                Some(c) if c.excluded_negative > 0 => {
                    format!("{} ({} excl.)", days(c.mean_days), c.excluded_negative)
                }
                Some(c) => days(c.mean_days),
                None => "-".to_string(),
            };
            cells.push(label);
        }
        table.add_row(cells);
    }
    table.to_string()
}

pub fn render_seasonality_table(seasonality: &Seasonality) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Month",
        "Applications",
        "Acceptance",
        "Candidate Types",
    ]);
    for month in &seasonality.months {
        let types = month
            .candidate_types
            .iter()
            .map(|(kind, count)| format!("{kind}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            month.month_name.clone(),
            month.applications.to_string(),
            pct(month.acceptance_rate),
            types,
        ]);
    }

    let names = |months: &[u32]| {
        months
            .iter()
            .map(|m| month_name(*m))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut out = format!("Seasonality {}\n{table}", seasonality.year);
    out.push_str(&format!(
        "\nPeak months: {}\nBest acceptance months: {}",
        names(&seasonality.peak_months),
        names(&seasonality.best_acceptance_months)
    ));

    if !seasonality.top_sources.is_empty() {
        let mut sources = new_table();
        sources.set_header(vec!["Source", "Applications", "Offer Acceptance", "Offer Sent"]);
        for source in &seasonality.top_sources {
            sources.add_row(vec![
                source.source.clone(),
                source.applications.to_string(),
                pct(source.offer_acceptance_rate),
                pct(source.offer_sent_rate),
            ]);
        }
        out.push('\n');
        out.push_str(&sources.to_string());
    }
    out
}

pub fn render_quality_table(quality: &QualityLog) -> String {
    if quality.is_empty() {
        return "No data-quality warnings.".to_string();
    }
    let mut table = new_table();
    table.set_header(vec!["Kind", "Count"]);
    for (kind, count) in quality.counts_by_kind() {
        table.add_row(vec![kind.to_string(), count.to_string()]);
    }
    let mut details = new_table();
    details.set_header(vec!["Kind", "Detail"]);
    for warning in &quality.warnings {
        details.add_row(vec![warning.kind().to_string(), warning.to_string()]);
    }
    format!("{table}\n{details}")
}

pub fn render_report(report: &RecruitmentReport) -> String {
    let mut sections = vec![
        format!("Key metrics\n{}", render_summary_table(&report.key_metrics)),
        format!("Funnel\n{}", render_funnel_table(&report.funnel)),
    ];
    if let Some(cohorts) = &report.cohorts {
        sections.push(format!(
            "Cohorts\n{}",
            render_cohort_table(cohorts, &report.year_over_year)
        ));
    }
    for group in &report.groups {
        sections.push(format!(
            "Rates by {}\n{}",
            group.key,
            render_rates_table(group.key, &group.rates, &group.averages)
        ));
        if let Some(durations) = &group.durations {
            sections.push(format!(
                "Durations by {}\n{}",
                group.key,
                render_durations_table(durations)
            ));
        }
    }
    if let Some(seasonality) = &report.seasonality {
        sections.push(render_seasonality_table(seasonality));
    }
    for missing in &report.unavailable {
        sections.push(format!("{} unavailable: {}", missing.section, missing.reason));
    }
    sections.push(format!("Data quality: {} warning(s)", report.quality.len()));
    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::{render_funnel_table, render_quality_table, render_rates_table, render_report};
    use crate::aggregate::fixtures::three_candidates;
    use crate::aggregate::report::{build_report, ReportOptions};
    use crate::aggregate::roles::RoleTypeTable;
    use crate::aggregate::GroupKey;
    use crate::dataset::quality::QualityLog;
    use crate::dataset::Dataset;

    fn report() -> crate::aggregate::report::RecruitmentReport {
        let (candidates, events) = three_candidates();
        build_report(
            &Dataset::from_tables(candidates, events),
            &ReportOptions::default(),
            RoleTypeTable::defaults(),
        )
        .expect("report")
    }

    #[test]
    fn funnel_table_lists_stages() {
        let rendered = render_funnel_table(&report().funnel);
        assert!(rendered.contains("New Application"));
        assert!(rendered.contains("Offer Accepted"));
        assert!(rendered.contains("50.0%"));
    }

    #[test]
    fn undefined_rates_render_as_dash() {
        let report = report();
        let sources = report.group(GroupKey::ApplicationSource).expect("sources");
        let rendered = render_rates_table(GroupKey::ApplicationSource, &sources.rates, &sources.averages);
        assert!(rendered.contains("Referral"));
        assert!(rendered.contains(" - "));
        assert!(rendered.contains("Application Source"));
    }

    #[test]
    fn full_report_has_every_section() {
        let rendered = render_report(&report());
        for heading in ["Key metrics", "Funnel", "Cohorts", "Rates by Role Type", "Seasonality 2022"] {
            assert!(rendered.contains(heading), "missing {heading}");
        }
    }

    #[test]
    fn empty_quality_log_renders_message() {
        assert_eq!(render_quality_table(&QualityLog::new()), "No data-quality warnings.");
    }
}
