use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recruiting stages in canonical process order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NewApplication,
    PhoneScreen,
    InHouseInterview,
    OfferSent,
    OfferAccepted,
    OfferDeclined,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::NewApplication,
        Stage::PhoneScreen,
        Stage::InHouseInterview,
        Stage::OfferSent,
        Stage::OfferAccepted,
        Stage::OfferDeclined,
    ];

    /// Stages recorded as dated activity events.
    pub const EVENT_STAGES: [Stage; 4] = [
        Stage::NewApplication,
        Stage::PhoneScreen,
        Stage::InHouseInterview,
        Stage::OfferSent,
    ];

    /// Funnel order, ending in the synthetic acceptance stage.
    pub const FUNNEL: [Stage; 5] = [
        Stage::NewApplication,
        Stage::PhoneScreen,
        Stage::InHouseInterview,
        Stage::OfferSent,
        Stage::OfferAccepted,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::NewApplication => "New Application",
            Self::PhoneScreen => "Phone Screen",
            Self::InHouseInterview => "In-House Interview",
            Self::OfferSent => "Offer Sent",
            Self::OfferAccepted => "Offer Accepted",
            Self::OfferDeclined => "Offer Declined",
        }
    }

    /// Terminal outcomes live on the candidate row, not in the activity sheet.
    pub fn is_outcome(&self) -> bool {
        matches!(self, Self::OfferAccepted | Self::OfferDeclined)
    }

    /// Furthest stages that mean an offer went out.
    pub fn is_offer(&self) -> bool {
        matches!(
            self,
            Self::OfferSent | Self::OfferAccepted | Self::OfferDeclined
        )
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown recruiting stage: {0}")]
pub struct StageParseError(pub String);

impl FromStr for Stage {
    type Err = StageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let base = lowered.strip_suffix(" date").unwrap_or(&lowered).trim();
        let normalized = base.replace(['-', '_'], " ");
        match normalized.as_str() {
            "new application" | "application" | "applied" => Ok(Self::NewApplication),
            "phone screen" => Ok(Self::PhoneScreen),
            "in house interview" | "interview" => Ok(Self::InHouseInterview),
            "offer sent" | "offer" => Ok(Self::OfferSent),
            "offer accepted" | "hired" => Ok(Self::OfferAccepted),
            "offer declined" | "declined" => Ok(Self::OfferDeclined),
            _ => Err(StageParseError(trimmed.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sheet {
    Candidates,
    Activity,
}

impl Display for Sheet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidates => write!(f, "candidates"),
            Self::Activity => write!(f, "activity"),
        }
    }
}

/// Structural problems that abort an aggregation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MissingDataError {
    #[error("{sheet} sheet is missing required column `{column}`")]
    Column { sheet: Sheet, column: &'static str },
    #[error("{0} sheet has no data rows")]
    EmptySheet(Sheet),
    #[error("no candidate has a `{0}` date")]
    Stage(Stage),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub candidate_id: String,
    pub application_source: String,
    pub position_title: String,
    pub candidate_type: String,
    /// `None` when the sheet's value was blank or unrecognised.
    pub furthest_stage: Option<Stage>,
}

impl Candidate {
    pub fn hired(&self) -> bool {
        self.furthest_stage == Some(Stage::OfferAccepted)
    }

    pub fn received_offer(&self) -> bool {
        self.furthest_stage.is_some_and(|stage| stage.is_offer())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub candidate_id: String,
    pub stage: Stage,
    pub date_reached: NaiveDate,
}
