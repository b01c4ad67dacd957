//! Request and response shapes exchanged with the patient-management REST API.
//!
//! These are plain value records. Server-generated timestamps are kept as the
//! strings the backend emits; only the date of birth is parsed, because forms
//! and validation reason about it as a calendar date.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

/// Fallback message shown when an error response carries no usable detail.
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again.";

time::serde::format_description!(pub iso_date, Date, "[year]-[month]-[day]");

/// Returned when a wire enum cannot be parsed from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} `{}`", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    Active,
    Inactive,
    Critical,
}

impl PatientStatus {
    pub const ALL: [Self; 3] = [Self::Active, Self::Inactive, Self::Critical];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("patient status", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub const ALL: [Self; 8] = [
        Self::APositive,
        Self::ANegative,
        Self::BPositive,
        Self::BNegative,
        Self::AbPositive,
        Self::AbNegative,
        Self::OPositive,
        Self::ONegative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|blood_type| blood_type.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("blood type", s))
    }
}

/// Columns the list endpoint accepts in `sort_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    LastName,
    DateOfBirth,
    Status,
    LastVisitDate,
}

impl SortColumn {
    pub const ALL: [Self; 4] = [
        Self::LastName,
        Self::DateOfBirth,
        Self::Status,
        Self::LastVisitDate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastName => "last_name",
            Self::DateOfBirth => "date_of_birth",
            Self::Status => "status",
            Self::LastVisitDate => "last_visit_date",
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("sort column", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(ParseEnumError::new("sort order", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "iso_date")]
    pub date_of_birth: Date,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub blood_type: Option<BloodType>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    pub status: PatientStatus,
    pub last_visit_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One page of the patient list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientPage {
    pub items: Vec<Patient>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Body for patient create and update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientPayload {
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "iso_date")]
    pub date_of_birth: Date,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub blood_type: Option<BloodType>,
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
    pub status: PatientStatus,
    pub last_visit_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub content: String,
    pub timestamp: String,
    pub created_at: String,
}

/// Body for note create requests; `timestamp` is RFC 3339.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    Llm,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub summary: String,
    pub mode: SummaryMode,
}

/// Error body returned by the backend: `{"detail": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub detail: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Items(Vec<ValidationItem>),
    Other(serde_json::Value),
}

/// One entry of a request validation failure. `loc` segments may be strings
/// or list indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationItem {
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,
    pub msg: String,
}

impl ValidationItem {
    /// Renders `"<last loc segment>: <msg>"`.
    ///
    /// An empty field name or a zero index counts as no location and yields
    /// just the message.
    pub fn render(&self) -> String {
        match self.loc.last() {
            Some(serde_json::Value::String(field)) if !field.is_empty() => {
                format!("{field}: {}", self.msg)
            }
            Some(serde_json::Value::Number(index)) if index.as_u64() != Some(0) => {
                format!("{index}: {}", self.msg)
            }
            _ => self.msg.clone(),
        }
    }
}

impl ErrorEnvelope {
    /// Display message for this envelope.
    ///
    /// Validation items are joined with `"; "`; a plain string detail is used
    /// verbatim; anything else falls back to [`UNEXPECTED_ERROR_MESSAGE`].
    pub fn message(&self) -> String {
        match &self.detail {
            ErrorDetail::Message(message) => message.clone(),
            ErrorDetail::Items(items) if !items.is_empty() => items
                .iter()
                .map(ValidationItem::render)
                .collect::<Vec<_>>()
                .join("; "),
            ErrorDetail::Items(_) | ErrorDetail::Other(_) => UNEXPECTED_ERROR_MESSAGE.to_string(),
        }
    }

    /// Parses an error body, returning `None` when it is not an envelope.
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }
}
