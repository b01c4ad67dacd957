//! Patient and note form state: validation and conversion to wire payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use patientdesk_api_types::{BloodType, NotePayload, Patient, PatientPayload, PatientStatus};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_GENDER_CHARS: usize = 20;
pub const MAX_PHONE_CHARS: usize = 20;
pub const MAX_ADDRESS_CHARS: usize = 500;
pub const MAX_NOTE_CHARS: usize = 10_000;

static EMAIL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Per-field validation messages, keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(field, message)| (*field, message.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("invalid form: {0}")]
    Invalid(FieldErrors),
}

impl FormError {
    pub fn fields(&self) -> &FieldErrors {
        match self {
            Self::Invalid(errors) => errors,
        }
    }
}

/// Raw text state of the patient create/edit form.
///
/// Allergies and conditions are comma-separated text; JSON input may also
/// give them as string arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientForm {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(deserialize_with = "optional_text")]
    pub blood_type: String,
    #[serde(deserialize_with = "comma_list")]
    pub allergies: String,
    #[serde(deserialize_with = "comma_list")]
    pub conditions: String,
    pub status: String,
    #[serde(deserialize_with = "optional_text")]
    pub last_visit_date: String,
}

impl Default for PatientForm {
    fn default() -> Self {
        Self {
            first_name: String::new(),
            last_name: String::new(),
            date_of_birth: String::new(),
            gender: String::new(),
            email: String::new(),
            phone: String::new(),
            address: String::new(),
            blood_type: String::new(),
            allergies: String::new(),
            conditions: String::new(),
            status: PatientStatus::Active.as_str().to_string(),
            last_visit_date: String::new(),
        }
    }
}

impl PatientForm {
    /// Seed an edit form from a stored record.
    pub fn from_patient(patient: &Patient) -> Self {
        Self {
            first_name: patient.first_name.clone(),
            last_name: patient.last_name.clone(),
            date_of_birth: format_date(patient.date_of_birth),
            gender: patient.gender.clone(),
            email: patient.email.clone(),
            phone: patient.phone.clone(),
            address: patient.address.clone(),
            blood_type: patient
                .blood_type
                .map(|blood_type| blood_type.as_str().to_string())
                .unwrap_or_default(),
            allergies: patient.allergies.join(", "),
            conditions: patient.conditions.join(", "),
            status: patient.status.as_str().to_string(),
            last_visit_date: patient.last_visit_date.clone().unwrap_or_default(),
        }
    }

    /// Check every field; `today` bounds the date of birth.
    pub fn validate(&self, today: Date) -> Result<(), FormError> {
        let mut errors = FieldErrors::default();

        required_max(&mut errors, "first_name", "First name", &self.first_name, MAX_NAME_CHARS);
        required_max(&mut errors, "last_name", "Last name", &self.last_name, MAX_NAME_CHARS);
        required_max(&mut errors, "gender", "Gender", &self.gender, MAX_GENDER_CHARS);
        required_max(&mut errors, "phone", "Phone", &self.phone, MAX_PHONE_CHARS);
        required_max(&mut errors, "address", "Address", &self.address, MAX_ADDRESS_CHARS);

        match self.date_of_birth.trim() {
            "" => errors.insert("date_of_birth", "Date of birth is required"),
            raw => match parse_date(raw) {
                Some(date) if date < today => {}
                Some(_) => errors.insert("date_of_birth", "Date of birth must be in the past"),
                None => errors.insert("date_of_birth", "Date of birth must be YYYY-MM-DD"),
            },
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.insert("email", "Email is required");
        } else if !EMAIL.as_ref().is_some_and(|pattern| pattern.is_match(email)) {
            errors.insert("email", "Invalid email format");
        }

        let blood_type = self.blood_type.trim();
        if !blood_type.is_empty() && BloodType::from_str(blood_type).is_err() {
            errors.insert("blood_type", "Unknown blood type");
        }

        if PatientStatus::from_str(self.status.trim()).is_err() {
            errors.insert("status", "Status must be active, inactive or critical");
        }

        let last_visit = self.last_visit_date.trim();
        if !last_visit.is_empty()
            && parse_date(last_visit).is_none()
            && OffsetDateTime::parse(last_visit, &Rfc3339).is_err()
        {
            errors.insert("last_visit_date", "Last visit must be a date or RFC 3339 timestamp");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormError::Invalid(errors))
        }
    }

    /// Validate, then normalize into the request body.
    pub fn into_payload(self, today: Date) -> Result<PatientPayload, FormError> {
        self.validate(today)?;

        let mut errors = FieldErrors::default();
        let date_of_birth = parse_date(self.date_of_birth.trim());
        let status = PatientStatus::from_str(self.status.trim()).ok();
        let blood_type = match self.blood_type.trim() {
            "" => None,
            raw => BloodType::from_str(raw).ok(),
        };
        let (Some(date_of_birth), Some(status)) = (date_of_birth, status) else {
            errors.insert("date_of_birth", "Date of birth must be YYYY-MM-DD");
            return Err(FormError::Invalid(errors));
        };

        Ok(PatientPayload {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            date_of_birth,
            gender: self.gender.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            blood_type,
            allergies: split_list(&self.allergies),
            conditions: split_list(&self.conditions),
            status,
            last_visit_date: non_blank(&self.last_visit_date),
        })
    }
}

/// Raw state of the add-note form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteForm {
    pub content: String,
    /// RFC 3339, or `YYYY-MM-DDTHH:MM` read as UTC.
    pub timestamp: String,
}

impl NoteForm {
    pub fn new(content: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: timestamp.into(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        let mut errors = FieldErrors::default();
        let content = self.content.trim();
        if content.is_empty() {
            errors.insert("content", "Note content is required");
        } else if content.chars().count() > MAX_NOTE_CHARS {
            errors.insert("content", format!("Max {MAX_NOTE_CHARS} characters"));
        }
        if parse_timestamp(self.timestamp.trim()).is_none() {
            errors.insert("timestamp", "Please enter a valid date and time");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FormError::Invalid(errors))
        }
    }

    pub fn into_payload(self) -> Result<NotePayload, FormError> {
        self.validate()?;
        let timestamp = parse_timestamp(self.timestamp.trim())
            .and_then(|parsed| parsed.format(&Rfc3339).ok())
            .ok_or_else(|| {
                let mut errors = FieldErrors::default();
                errors.insert("timestamp", "Please enter a valid date and time");
                FormError::Invalid(errors)
            })?;
        Ok(NotePayload {
            content: self.content.trim().to_string(),
            timestamp,
        })
    }
}

/// Current UTC time in the naive form the note timestamp field uses.
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .unwrap_or_default()
}

fn required_max(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    value: &str,
    max: usize,
) {
    let value = value.trim();
    if value.is_empty() {
        errors.insert(field, format!("{label} is required"));
    } else if value.chars().count() > max {
        errors.insert(field, format!("Max {max} characters"));
    }
}

fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(parsed) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(parsed);
    }
    PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .or_else(|_| {
            PrimitiveDateTime::parse(
                raw,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
        })
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_blank(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn optional_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn comma_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListInput {
        Text(String),
        Items(Vec<String>),
    }

    Ok(match Option::<ListInput>::deserialize(deserializer)? {
        Some(ListInput::Text(text)) => text,
        Some(ListInput::Items(items)) => items.join(", "),
        None => String::new(),
    })
}
