//! Query key definitions.
//!
//! A `QueryKey` names one cacheable read: the resource plus its normalized
//! parameters. `KeyFilter` selects groups of keys for invalidation.

use std::collections::BTreeMap;
use std::fmt;

use uuid::Uuid;

const ID_PARAM: &str = "id";

/// Resource family a read belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    /// Paginated, filtered patient listings.
    PatientList,
    /// A single patient record.
    Patient,
    /// Clinical notes of one patient.
    Notes,
    /// Generated summary of one patient.
    Summary,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PatientList => "patients",
            Self::Patient => "patient",
            Self::Notes => "notes",
            Self::Summary => "summary",
        }
    }
}

/// Normalized parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

/// Canonical identifier of a cacheable read.
///
/// Absent and blank parameters are never stored, so `{search: ""}` and `{}`
/// produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    resource: Resource,
    params: BTreeMap<&'static str, ParamValue>,
}

impl QueryKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: BTreeMap::new(),
        }
    }

    pub fn patient(id: Uuid) -> Self {
        Self::new(Resource::Patient).with_id(id)
    }

    pub fn notes(patient_id: Uuid) -> Self {
        Self::new(Resource::Notes).with_id(patient_id)
    }

    pub fn summary(patient_id: Uuid) -> Self {
        Self::new(Resource::Summary).with_id(patient_id)
    }

    #[must_use]
    pub fn with_id(self, id: Uuid) -> Self {
        self.with_text(ID_PARAM, Some(id.to_string()))
    }

    #[must_use]
    pub fn with_text<S: AsRef<str>>(mut self, name: &'static str, value: Option<S>) -> Self {
        match value {
            Some(value) if !value.as_ref().trim().is_empty() => {
                self.params
                    .insert(name, ParamValue::Text(value.as_ref().to_string()));
            }
            _ => {
                self.params.remove(name);
            }
        }
        self
    }

    #[must_use]
    pub fn with_int(mut self, name: &'static str, value: Option<i64>) -> Self {
        match value {
            Some(value) => {
                self.params.insert(name, ParamValue::Int(value));
            }
            None => {
                self.params.remove(name);
            }
        }
        self
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Record id for single-record keys.
    pub fn record_id(&self) -> Option<Uuid> {
        match self.params.get(ID_PARAM) {
            Some(ParamValue::Text(raw)) => Uuid::parse_str(raw).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource.as_str())?;
        let mut separator = '?';
        for (name, value) in &self.params {
            write!(f, "{separator}{name}={value}")?;
            separator = '&';
        }
        Ok(())
    }
}

/// Selects the cache keys a write makes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    /// Every key of a resource family.
    Resource(Resource),
    /// Keys of a resource family bound to one record id.
    Record { resource: Resource, id: Uuid },
}

impl KeyFilter {
    pub fn record(resource: Resource, id: Uuid) -> Self {
        Self::Record { resource, id }
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Resource(resource) => key.resource == *resource,
            Self::Record { resource, id } => {
                key.resource == *resource && key.record_id() == Some(*id)
            }
        }
    }

    pub fn resource(&self) -> Resource {
        match self {
            Self::Resource(resource) | Self::Record { resource, .. } => *resource,
        }
    }
}

impl fmt::Display for KeyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(resource) => write!(f, "{}/*", resource.as_str()),
            Self::Record { resource, id } => write!(f, "{}/{id}", resource.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_parameters_are_omitted() {
        let with_blank = QueryKey::new(Resource::PatientList)
            .with_text("search", Some("   "))
            .with_text("status", None::<&str>)
            .with_int("limit", Some(20));
        let without = QueryKey::new(Resource::PatientList).with_int("limit", Some(20));

        assert_eq!(with_blank, without);
        assert!(with_blank.param("search").is_none());
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let a = QueryKey::new(Resource::PatientList)
            .with_text("search", Some("jane"))
            .with_int("limit", Some(10));
        let b = QueryKey::new(Resource::PatientList)
            .with_int("limit", Some(10))
            .with_text("search", Some("jane"));
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "patients?limit=10&search=jane");
    }

    #[test]
    fn record_filter_matches_only_that_record() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let filter = KeyFilter::record(Resource::Summary, id);

        assert!(filter.matches(&QueryKey::summary(id)));
        assert!(!filter.matches(&QueryKey::summary(other)));
        assert!(!filter.matches(&QueryKey::notes(id)));
    }

    #[test]
    fn resource_filter_matches_whole_family() {
        let filter = KeyFilter::Resource(Resource::PatientList);
        let page = QueryKey::new(Resource::PatientList).with_int("offset", Some(40));

        assert!(filter.matches(&page));
        assert!(!filter.matches(&QueryKey::patient(Uuid::nil())));
        assert_eq!(QueryKey::patient(Uuid::nil()).record_id(), Some(Uuid::nil()));
    }
}
