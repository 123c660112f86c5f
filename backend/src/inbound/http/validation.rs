//! Mapping of domain validation failures onto `400 Bad Request` envelopes.
//!
//! Every rejection carries `details.field` (the request field at fault) and
//! `details.code` (a stable snake_case reason) alongside the message.

use std::fmt;

use serde_json::json;

use crate::domain::{Error, LoginValidationError, PollValidationError, UserValidationError};

/// A validation error that knows which request field it concerns.
pub(crate) trait FieldViolation: fmt::Display {
    fn field(&self) -> &'static str;
    fn code(&self) -> &'static str;
}

/// Build the `400` envelope for a field violation.
pub(crate) fn invalid_field(violation: impl FieldViolation) -> Error {
    Error::invalid_request(violation.to_string()).with_details(json!({
        "field": violation.field(),
        "code": violation.code(),
    }))
}

impl FieldViolation for UserValidationError {
    fn field(&self) -> &'static str {
        UserValidationError::field(self)
    }

    fn code(&self) -> &'static str {
        match self {
            Self::EmptyId => "empty_id",
            Self::InvalidId => "invalid_id",
            Self::EmptyEmail => "empty_email",
            Self::InvalidEmail => "invalid_email",
            Self::EmailTooLong { .. } => "email_too_long",
            Self::EmptyName => "empty_name",
            Self::NameTooLong { .. } => "name_too_long",
            Self::EmptyPassword => "empty_password",
        }
    }
}

impl FieldViolation for PollValidationError {
    fn field(&self) -> &'static str {
        PollValidationError::field(self)
    }

    fn code(&self) -> &'static str {
        match self {
            Self::EmptyTitle => "empty_title",
            Self::TitleTooLong { .. } => "title_too_long",
            Self::EmptyOptionText => "empty_option_text",
            Self::OptionTextTooLong { .. } => "option_text_too_long",
            Self::TooFewOptions { .. } => "too_few_options",
            Self::TooManyOptions { .. } => "too_many_options",
            Self::InvalidId => "invalid_id",
        }
    }
}

impl FieldViolation for LoginValidationError {
    fn field(&self) -> &'static str {
        match self {
            Self::EmptyEmail => "email",
            Self::EmptyPassword => "password",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::EmptyEmail => "empty_email",
            Self::EmptyPassword => "empty_password",
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::Value;

    use super::*;
    use crate::domain::ErrorCode;

    #[rstest]
    #[case(invalid_field(UserValidationError::InvalidEmail), "email", "invalid_email")]
    #[case(
        invalid_field(PollValidationError::TooFewOptions { min: 2 }),
        "options",
        "too_few_options"
    )]
    #[case(invalid_field(LoginValidationError::EmptyPassword), "password", "empty_password")]
    fn details_name_field_and_code(
        #[case] error: Error,
        #[case] field: &str,
        #[case] code: &str,
    ) {
        assert_eq!(error.code(), ErrorCode::InvalidRequest);
        let details = error.details().expect("details present");
        assert_eq!(details.get("field").and_then(Value::as_str), Some(field));
        assert_eq!(details.get("code").and_then(Value::as_str), Some(code));
    }
}
