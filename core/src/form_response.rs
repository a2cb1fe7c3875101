//! Outcome of a validation or business-logic operation.
//!
//! A [`FormResponse`] is produced by a step's form validation and again by its
//! business logic; the two are merged into the single response the HTTP
//! adapter reports to analytics and uses to pick redirect or re-render.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Error key used for engine-generated diagnostics.
pub const MESSAGE_ERROR_KEY: &str = "message";

/// Success flag, per-field error messages and arbitrary extra data.
///
/// Field order is preserved: "the first error" means the first message of the
/// first field that was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormResponse {
    success: bool,
    errors: IndexMap<String, Vec<String>>,
    #[serde(default)]
    error_details: IndexMap<String, BTreeSet<String>>,
    #[serde(default)]
    extra: Map<String, Value>,
    #[serde(default)]
    serialize_error_details_only: bool,
}

impl FormResponse {
    /// Create a successful response with no errors.
    #[must_use]
    pub fn success() -> Self {
        Self::new(true)
    }

    /// Create a failed response with no errors attached yet.
    #[must_use]
    pub fn failure() -> Self {
        Self::new(false)
    }

    /// Create a response with the given success flag.
    #[must_use]
    pub fn new(success: bool) -> Self {
        Self {
            success,
            errors: IndexMap::new(),
            error_details: IndexMap::new(),
            extra: Map::new(),
            serialize_error_details_only: false,
        }
    }

    /// Failure for a step name neither catalog knows about.
    ///
    /// # Examples
    ///
    /// ```
    /// # use waypoint_core::FormResponse;
    /// let response = FormResponse::unhandled_step("nonexistent");
    /// assert!(!response.is_success());
    /// assert_eq!(response.first_error_message(None), Some("Unhandled step nonexistent"));
    /// ```
    #[must_use]
    pub fn unhandled_step(step: &str) -> Self {
        Self::failure().with_error(MESSAGE_ERROR_KEY, format!("Unhandled step {step}"))
    }

    /// Append an error message for `field`.
    #[must_use]
    pub fn with_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_error(field, message);
        self
    }

    /// Record a machine-readable detail key (e.g. `blank`) for `field`.
    #[must_use]
    pub fn with_error_detail(mut self, field: impl Into<String>, detail: impl Into<String>) -> Self {
        self.error_details
            .entry(field.into())
            .or_default()
            .insert(detail.into());
        self
    }

    /// Attach an extra analytics value.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Omit the human-readable `errors` from [`FormResponse::to_h`].
    #[must_use]
    pub const fn serialize_error_details_only(mut self) -> Self {
        self.serialize_error_details_only = true;
        self
    }

    /// Append an error message for `field` in place.
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Whether the operation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Per-field error messages, in insertion order.
    #[must_use]
    pub const fn errors(&self) -> &IndexMap<String, Vec<String>> {
        &self.errors
    }

    /// Per-field error detail keys.
    #[must_use]
    pub const fn error_details(&self) -> &IndexMap<String, BTreeSet<String>> {
        &self.error_details
    }

    /// Extra data attached by the producer.
    #[must_use]
    pub const fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// First error message of `field`, or of the first field when `None`.
    #[must_use]
    pub fn first_error_message(&self, field: Option<&str>) -> Option<&str> {
        let messages = match field {
            Some(field) => self.errors.get(field)?,
            None => self.errors.values().next()?,
        };
        messages.first().map(String::as_str)
    }

    /// Combine two responses.
    ///
    /// - success is the logical AND of both
    /// - error messages are concatenated per field, `self` first
    /// - error details are unioned
    /// - `extra` keys present on `other` replace those on `self`
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.success = self.success && other.success;
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        for (field, details) in other.error_details {
            self.error_details.entry(field).or_default().extend(details);
        }
        self.extra.extend(other.extra);
        self.serialize_error_details_only |= other.serialize_error_details_only;
        self
    }

    /// Flatten into the property map handed to analytics.
    ///
    /// Keys: `success`, `errors` (unless only details are serialized),
    /// `error_details` (when non-empty), then every extra key.
    #[must_use]
    pub fn to_h(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(self.success));

        if !self.serialize_error_details_only {
            let errors = self
                .errors
                .iter()
                .map(|(field, messages)| (field.clone(), Value::from(messages.clone())))
                .collect::<Map<_, _>>();
            map.insert("errors".to_string(), Value::Object(errors));
        }

        if !self.error_details.is_empty() {
            let details = self
                .error_details
                .iter()
                .map(|(field, keys)| {
                    let flags = keys
                        .iter()
                        .map(|key| (key.clone(), Value::Bool(true)))
                        .collect::<Map<_, _>>();
                    (field.clone(), Value::Object(flags))
                })
                .collect::<Map<_, _>>();
            map.insert("error_details".to_string(), Value::Object(details));
        }

        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}
