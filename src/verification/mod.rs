//! Document field verification.
//!
//! DESIGN
//! ======
//! Each document kind declares the fields a submitter must provide. A
//! field passes when its lowercased value occurs anywhere in the
//! lowercased text extracted from the uploaded file. For kinds with a
//! "suggested" field, a mismatch on that field triggers a close-match
//! lookup over the extracted words so reviewers can see what the document
//! actually says.
//!
//! This module is pure: no I/O, no clock. Extraction and persistence live
//! in `services`.

pub mod similarity;

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Placeholder emitted when no extracted word is close enough.
pub const NO_SUGGESTION: &str = "No suggestions available.";
pub const REQUIRED_FIELD_MESSAGE: &str = "This field is required.";
pub const BLANK_FIELD_MESSAGE: &str = "This field may not be blank.";

// =============================================================================
// DOCUMENT KIND
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Ssc,
    Cet,
    Domicile,
}

impl DocumentKind {
    pub const ALL: [Self; 3] = [Self::Ssc, Self::Cet, Self::Domicile];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ssc => "ssc",
            Self::Cet => "cet",
            Self::Domicile => "domicile",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
    }

    /// Human-readable document name stored on the record.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Ssc => "10th Marksheet",
            Self::Cet => "CET Marksheet",
            Self::Domicile => "Domicile Certificate",
        }
    }

    /// Fields checked against the document, in report order.
    #[must_use]
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Ssc => &["name", "roll_no", "result"],
            Self::Cet => &["name", "roll_no", "application_no", "category", "mothers_name"],
            Self::Domicile => &["name", "certificate_number", "state"],
        }
    }

    /// Field that gets a close-match suggestion when it does not match.
    #[must_use]
    pub fn suggested_field(self) -> Option<&'static str> {
        match self {
            Self::Ssc => Some("result"),
            Self::Cet => None,
            Self::Domicile => Some("certificate_number"),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SUBMITTED FIELDS
// =============================================================================

/// Validated field values for one document kind, in required-field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedFields {
    kind: DocumentKind,
    values: Vec<(&'static str, String)>,
}

impl SubmittedFields {
    #[must_use]
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(name, value)| (*name, value.as_str()))
    }

    /// Field map as JSON, for storage alongside the document record.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(name, value)| ((*name).to_owned(), serde_json::Value::String(value.clone())))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Per-field validation errors, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0.entry(field.to_owned()).or_default().push(message.to_owned());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", names.join(", "))
    }
}

/// Check that every required field of `kind` is present and non-blank.
/// Values are trimmed; unknown keys are ignored.
///
/// # Errors
///
/// Returns every absent field with a "required" message and every
/// whitespace-only field with a "blank" message.
pub fn validate_fields(kind: DocumentKind, raw: &BTreeMap<String, String>) -> Result<SubmittedFields, FieldErrors> {
    let mut errors = FieldErrors::default();
    let mut values = Vec::with_capacity(kind.required_fields().len());

    for &field in kind.required_fields() {
        match raw.get(field).map(|v| v.trim()) {
            Some("") => errors.add(field, BLANK_FIELD_MESSAGE),
            Some(value) => values.push((field, value.to_owned())),
            None => errors.add(field, REQUIRED_FIELD_MESSAGE),
        }
    }

    if errors.is_empty() { Ok(SubmittedFields { kind, values }) } else { Err(errors) }
}

// =============================================================================
// REPORT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCheck {
    Match,
    DoesNotMatch,
}

impl FieldCheck {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Match => "Match",
            Self::DoesNotMatch => "Does not match",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Match" => Some(Self::Match),
            "Does not match" => Some(Self::DoesNotMatch),
            _ => None,
        }
    }
}

/// Outcome of checking submitted fields against extracted text.
///
/// Serializes as a flat object: `<field>_check` for each field in order,
/// then `nearest_<field>` when a suggestion was computed.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub kind: DocumentKind,
    pub checks: Vec<(&'static str, FieldCheck)>,
    /// `(field, closest word)`; `None` word means nothing was close enough.
    pub suggestion: Option<(&'static str, Option<String>)>,
}

impl VerificationReport {
    /// True when every field matched.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.checks.iter().all(|(_, check)| *check == FieldCheck::Match)
    }

    #[must_use]
    pub fn check(&self, field: &str) -> Option<FieldCheck> {
        self.checks
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, check)| *check)
    }

    #[must_use]
    pub fn mismatched_fields(&self) -> Vec<&'static str> {
        self.checks
            .iter()
            .filter(|(_, check)| *check == FieldCheck::DoesNotMatch)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Storage form: checks as an array so field order survives JSONB.
    #[must_use]
    pub fn to_stored(&self) -> serde_json::Value {
        let checks: Vec<serde_json::Value> = self
            .checks
            .iter()
            .map(|(field, check)| serde_json::json!({ "field": field, "check": check.as_str() }))
            .collect();
        let suggestion = self
            .suggestion
            .as_ref()
            .map(|(field, word)| serde_json::json!({ "field": field, "nearest": word }));
        serde_json::json!({ "checks": checks, "suggestion": suggestion })
    }

    /// Rebuild a report from [`Self::to_stored`] output. Returns `None` when
    /// the value is not a stored report for `kind`.
    #[must_use]
    pub fn from_stored(kind: DocumentKind, value: &serde_json::Value) -> Option<Self> {
        let stored: StoredReport = serde_json::from_value(value.clone()).ok()?;
        let field_for = |name: &str| kind.required_fields().iter().copied().find(|f| *f == name);

        let checks = stored
            .checks
            .iter()
            .map(|c| Some((field_for(&c.field)?, FieldCheck::parse(&c.check)?)))
            .collect::<Option<Vec<_>>>()?;
        let suggestion = match stored.suggestion {
            Some(s) => Some((field_for(&s.field)?, s.nearest)),
            None => None,
        };
        Some(Self { kind, checks, suggestion })
    }
}

#[derive(Deserialize)]
struct StoredCheck {
    field: String,
    check: String,
}

#[derive(Deserialize)]
struct StoredSuggestion {
    field: String,
    nearest: Option<String>,
}

#[derive(Deserialize)]
struct StoredReport {
    checks: Vec<StoredCheck>,
    suggestion: Option<StoredSuggestion>,
}

impl Serialize for VerificationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.checks.len() + usize::from(self.suggestion.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (field, check) in &self.checks {
            map.serialize_entry(&format!("{field}_check"), check.as_str())?;
        }
        if let Some((field, word)) = &self.suggestion {
            map.serialize_entry(&format!("nearest_{field}"), word.as_deref().unwrap_or(NO_SUGGESTION))?;
        }
        map.end()
    }
}

/// Check every submitted field against `extracted_text`.
#[must_use]
pub fn verify(fields: &SubmittedFields, extracted_text: &str) -> VerificationReport {
    let kind = fields.kind();
    let haystack = extracted_text.to_lowercase();

    let checks: Vec<(&'static str, FieldCheck)> = fields
        .iter()
        .map(|(name, value)| {
            let check = if haystack.contains(&value.to_lowercase()) {
                FieldCheck::Match
            } else {
                FieldCheck::DoesNotMatch
            };
            (name, check)
        })
        .collect();

    let mut report = VerificationReport { kind, checks, suggestion: None };
    if let Some(field) = kind.suggested_field()
        && report.check(field) == Some(FieldCheck::DoesNotMatch)
    {
        let value = fields.get(field).unwrap_or_default().to_lowercase();
        let nearest = similarity::close_matches(
            &value,
            haystack.split_whitespace(),
            similarity::DEFAULT_MATCH_COUNT,
            similarity::DEFAULT_CUTOFF,
        )
        .into_iter()
        .next();
        report.suggestion = Some((field, nearest));
    }
    report
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
