use std::collections::HashSet;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};

use crate::dataset::fetcher::RawSheets;
use crate::dataset::quality::{DataQualityWarning, QualityLog};
use crate::dataset::schema::{ActivityEvent, Candidate, MissingDataError, Sheet, Stage};
use crate::dataset::Dataset;

const CANDIDATE_ID: &[&str] = &["Candidate ID Number", "Candidate ID", "candidate_id"];
const APPLICATION_SOURCE: &[&str] = &["Application Source", "Source", "application_source"];
const POSITION_TITLE: &[&str] = &["Position Title", "Position", "position_title"];
const CANDIDATE_TYPE: &[&str] = &["Candidate Type", "candidate_type"];
const FURTHEST_STAGE: &[&str] = &[
    "Furthest Recruiting Stage Reached",
    "Furthest Stage Reached",
    "furthest_stage_reached",
];
const STAGE_NAME: &[&str] = &["Stage Name", "Stage", "stage_name"];
const DATE_REACHED: &[&str] = &[
    "Date When Reached the Stage",
    "Date Reached",
    "date_reached",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

pub fn load_dataset(raw: &RawSheets) -> Result<Dataset> {
    let mut quality = QualityLog::new();
    let candidates = parse_candidates(&raw.candidates_csv, &mut quality)?;
    let events = parse_activity(&raw.activity_csv, &mut quality)?;
    Ok(Dataset {
        fingerprint: raw.fingerprint(),
        candidates,
        events,
        quality,
    })
}

pub fn parse_candidates(text: &str, quality: &mut QualityLog) -> Result<Vec<Candidate>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .context("failed reading candidates header row")?
        .clone();
    let id_col = require_column(&headers, Sheet::Candidates, CANDIDATE_ID)?;
    let source_col = require_column(&headers, Sheet::Candidates, APPLICATION_SOURCE)?;
    let position_col = require_column(&headers, Sheet::Candidates, POSITION_TITLE)?;
    let type_col = require_column(&headers, Sheet::Candidates, CANDIDATE_TYPE)?;
    let stage_col = require_column(&headers, Sheet::Candidates, FURTHEST_STAGE)?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut rows = 0usize;
    for record in reader.records() {
        let record = record.context("malformed row in candidates sheet")?;
        rows += 1;
        let line = line_of(&record);
        let candidate_id = normalize_id(field(&record, id_col));
        if candidate_id.is_empty() {
            quality.record(DataQualityWarning::MissingCandidateId {
                sheet: Sheet::Candidates,
                line,
            });
            continue;
        }
        if !seen.insert(candidate_id.clone()) {
            quality.record(DataQualityWarning::DuplicateCandidate { candidate_id });
            continue;
        }
        let raw_stage = field(&record, stage_col);
        let furthest_stage = Stage::from_str(raw_stage).ok();
        if furthest_stage.is_none() {
            quality.record(DataQualityWarning::UnknownStage {
                sheet: Sheet::Candidates,
                line,
                value: raw_stage.to_string(),
            });
        }
        out.push(Candidate {
            candidate_id,
            application_source: field(&record, source_col).to_string(),
            position_title: field(&record, position_col).to_string(),
            candidate_type: field(&record, type_col).to_string(),
            furthest_stage,
        });
    }
    if rows == 0 {
        return Err(MissingDataError::EmptySheet(Sheet::Candidates).into());
    }
    Ok(out)
}

pub fn parse_activity(text: &str, quality: &mut QualityLog) -> Result<Vec<ActivityEvent>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .context("failed reading activity header row")?
        .clone();
    let id_col = require_column(&headers, Sheet::Activity, CANDIDATE_ID)?;
    let stage_col = require_column(&headers, Sheet::Activity, STAGE_NAME)?;
    let date_col = require_column(&headers, Sheet::Activity, DATE_REACHED)?;

    let mut out = Vec::new();
    let mut rows = 0usize;
    for record in reader.records() {
        let record = record.context("malformed row in activity sheet")?;
        rows += 1;
        let line = line_of(&record);
        let candidate_id = normalize_id(field(&record, id_col));
        if candidate_id.is_empty() {
            quality.record(DataQualityWarning::MissingCandidateId {
                sheet: Sheet::Activity,
                line,
            });
            continue;
        }
        let raw_stage = field(&record, stage_col);
        let Ok(stage) = Stage::from_str(raw_stage) else {
            quality.record(DataQualityWarning::UnknownStage {
                sheet: Sheet::Activity,
                line,
                value: raw_stage.to_string(),
            });
            continue;
        };
        let raw_date = field(&record, date_col);
        let Some(date_reached) = parse_date(raw_date) else {
            quality.record(DataQualityWarning::UnparsedDate {
                line,
                value: raw_date.to_string(),
            });
            continue;
        };
        out.push(ActivityEvent {
            candidate_id,
            stage,
            date_reached,
        });
    }
    if rows == 0 {
        return Err(MissingDataError::EmptySheet(Sheet::Activity).into());
    }
    Ok(out)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    None
}

fn require_column(
    headers: &StringRecord,
    sheet: Sheet,
    aliases: &[&'static str],
) -> std::result::Result<usize, MissingDataError> {
    for alias in aliases {
        if let Some(idx) = headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim().eq_ignore_ascii_case(alias))
        {
            return Ok(idx);
        }
    }
    Err(MissingDataError::Column {
        sheet,
        column: aliases[0],
    })
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("").trim()
}

/// Spreadsheet exports often turn integer ids into `123.0`.
fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0") {
        Some(stripped) if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) => {
            stripped.to_string()
        }
        _ => trimmed.to_string(),
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}
