use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value as JsonValue};
use validator::Validate;

use crate::error::{Error, Result};

/// Fields that are never trimmed before validation.
const UNTRIMMED_FIELDS: &[&str] = &["password", "password_confirmation"];

/// Validation failures keyed by field, kept in the order the rules ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    entries: Vec<(String, Vec<String>)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let field = field.into();
        let message = message.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.entries.push((field, vec![message])),
        }
    }

    pub fn has(&self, field: &str) -> bool {
        self.entries.iter().any(|(name, _)| name == field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of messages across every field.
    pub fn count(&self) -> usize {
        self.entries.iter().map(|(_, messages)| messages.len()).sum()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// First message followed by how many others were collected, e.g.
    /// `The name field is required. (and 2 more errors)`.
    pub fn summary(&self) -> String {
        let Some(first) = self.entries.first().and_then(|(_, m)| m.first()) else {
            return "The given data was invalid.".to_string();
        };
        match self.count() - 1 {
            0 => first.clone(),
            1 => format!("{} (and 1 more error)", first),
            n => format!("{} (and {} more errors)", first, n),
        }
    }

    /// Copies `validator` failures for `order`'s fields, in that order.
    /// Fields that already failed a type check keep only that message.
    pub fn merge(&mut self, errors: &validator::ValidationErrors, order: &[&str]) {
        let field_errors = errors.field_errors();
        for field in order {
            if self.has(field) {
                continue;
            }
            if let Some(list) = field_errors.get(*field) {
                for error in list.iter() {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("The {} field is invalid.", attribute(field)));
                    self.add(*field, message);
                }
            }
        }
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailed(self))
        }
    }
}

impl Serialize for FieldErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, messages) in &self.entries {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

/// Runs the derived rules of `value` and merges their failures into `errors`.
pub fn validate<T: Validate>(value: &T, order: &[&str], errors: &mut FieldErrors) {
    if let Err(failures) = value.validate() {
        errors.merge(&failures, order);
    }
}

/// A single body field as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Patch<T> {
    #[default]
    Absent,
    Null,
    Value(T),
}

impl<T> Patch<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Patch::Value(value) => Some(value),
            Patch::Absent | Patch::Null => None,
        }
    }
}

/// Turns a parsed body into the field map the rules run against.
///
/// Top-level strings are trimmed (passwords excepted) and empty strings
/// become `null`. Anything other than an object is read as `{}`.
pub fn normalize_body(body: JsonValue) -> Map<String, JsonValue> {
    let JsonValue::Object(map) = body else {
        return Map::new();
    };
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                JsonValue::String(s) => {
                    let s = if UNTRIMMED_FIELDS.contains(&key.as_str()) {
                        s
                    } else {
                        s.trim().to_string()
                    };
                    if s.is_empty() {
                        JsonValue::Null
                    } else {
                        JsonValue::String(s)
                    }
                }
                other => other,
            };
            (key, value)
        })
        .collect()
}

/// Reads `field` as a string. Non-string values record a type error and
/// read as absent so no further rule fires for the field.
pub fn string_field(
    body: &Map<String, JsonValue>,
    field: &str,
    errors: &mut FieldErrors,
) -> Patch<String> {
    match body.get(field) {
        None => Patch::Absent,
        Some(JsonValue::Null) => Patch::Null,
        Some(JsonValue::String(s)) => Patch::Value(s.clone()),
        Some(_) => {
            errors.add(field, must_be_string(field));
            Patch::Absent
        }
    }
}

/// Records a mismatch when `password` is given without an equal confirmation.
pub fn check_confirmation(
    password: Option<&str>,
    confirmation: Option<&str>,
    errors: &mut FieldErrors,
) {
    if let Some(password) = password {
        if confirmation != Some(password) && !errors.has("password") {
            errors.add("password", "The password field confirmation does not match.");
        }
    }
}

/// Parses an integer query value the way form input is usually read.
pub fn parse_integer(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Human form of a field name: `perPage` -> `per page`,
/// `password_confirmation` -> `password confirmation`.
pub fn attribute(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c == '_' {
            out.push(' ');
        } else if c.is_ascii_uppercase() {
            out.push(' ');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn must_be_string(field: &str) -> String {
    format!("The {} field must be a string.", attribute(field))
}

pub fn must_be_integer(field: &str) -> String {
    format!("The {} field must be an integer.", attribute(field))
}
