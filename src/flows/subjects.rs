//! Candidate subject extraction from open request payloads.
//!
//! Authentication requests carry their identifiers in differently named fields.
//! They arrive here as an untyped map so unknown fields pass through untouched.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Top-level string fields that may hold a subject.
const SUBJECT_FIELDS: [&str; 4] = ["email", "phoneNumber", "username", "userIdentifier"];

/// Open, caller-supplied fields threaded through unchanged.
pub type ExtraFields = Map<String, Value>;

/// Collect candidate subjects: `explicit` first, then fields found in `extra`
/// (including `contacts[].identifier` from passwordless payloads).
///
/// Values are trimmed; blanks and repeats are dropped, first occurrence wins.
#[must_use]
pub fn candidate_subjects(explicit: &[String], extra: &ExtraFields) -> Vec<String> {
    let mut candidates: Vec<String> = explicit.to_vec();

    for field in SUBJECT_FIELDS {
        if let Some(Value::String(value)) = extra.get(field) {
            candidates.push(value.clone());
        }
    }

    if let Some(Value::Array(contacts)) = extra.get("contacts") {
        for contact in contacts {
            if let Some(identifier) = contact.get("identifier").and_then(Value::as_str) {
                candidates.push(identifier.to_string());
            }
        }
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|candidate| candidate.trim().to_string())
        .filter(|candidate| !candidate.is_empty())
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

fn phone_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\+?[0-9]{4,15}$").ok())
        .as_ref()
}

/// A contact subject must look like an email address or a phone number.
#[must_use]
pub fn valid_contact(contact: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(contact))
        || phone_pattern().is_some_and(|re| re.is_match(contact))
}
