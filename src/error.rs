//! Error taxonomy shared by the session store, the HTTP wrapper and the views.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Per-field validation messages collected by an entry form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn clear_field(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), ClientError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// Login or registration rejected; carries the backend's message.
    #[error("{0}")]
    Auth(String),
    /// The backend answered 401. The session has already been cleared.
    #[error("Session expired, please sign in again")]
    Unauthorized,
    /// No token held; the request was never sent.
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Invalid input: {0}")]
    Validation(FieldErrors),
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Decode(String),
    /// A submission from the same form is still in flight.
    #[error("Already submitting")]
    Busy,
}

impl ClientError {
    /// Transport-level failure: no usable answer from the backend at all.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Errors that mean the session is gone or never existed.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::NotAuthenticated)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

impl From<FieldErrors> for ClientError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_field_wins() {
        let mut errors = FieldErrors::new();
        errors.add("amount", "Amount is required");
        errors.add("amount", "Amount must be positive");
        errors.add("name", "Name is required");

        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("amount"), Some("Amount is required"));
        assert_eq!(
            errors.to_string(),
            "amount: Amount is required; name: Name is required"
        );
    }

    #[test]
    fn empty_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());

        let mut errors = FieldErrors::new();
        errors.add("title", "Goal title is required");
        assert!(matches!(
            errors.into_result(),
            Err(ClientError::Validation(_))
        ));
    }
}
