//! Operator error abstractions.

use http::StatusCode;
use thiserror::Error;

/// A result type where the error is an operator `Error`.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Operator error variants.
///
/// Errors returned from the K8s API are classified by status code, as the reconciler reacts
/// differently to each class.
#[derive(Debug, Error)]
pub enum Error {
    /// The API server rejected a request as malformed.
    #[error("request rejected as malformed by the K8s API")]
    BadRequest(#[source] kube::Error),
    /// The object being created already exists.
    #[error("object already exists")]
    AlreadyExists(#[source] kube::Error),
    /// Any other error returned from the K8s API or its transport.
    #[error("error from K8s API")]
    Kube(#[source] kube::Error),
    /// A K8s API call did not complete in time.
    #[error("timeout while {0}")]
    Timeout(&'static str),
    /// An object is missing a metadata field which the API server always sets.
    #[error("object is missing required field {0}")]
    MissingObjectKey(&'static str),
}

impl Error {
    /// Check if this error indicates that the target object already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    /// Check if this error indicates that the API server rejected the request as malformed.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::BadRequest(_))
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        let (is_bad_request, is_already_exists) = match &err {
            kube::Error::Api(api_err) => (
                api_err.code == StatusCode::BAD_REQUEST.as_u16(),
                api_err.code == StatusCode::CONFLICT.as_u16() && api_err.reason == "AlreadyExists",
            ),
            _ => (false, false),
        };
        if is_bad_request {
            Self::BadRequest(err)
        } else if is_already_exists {
            Self::AlreadyExists(err)
        } else {
            Self::Kube(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use kube::core::ErrorResponse;

    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: format!("test error {}", reason),
            reason: reason.into(),
            code,
        })
    }

    #[test]
    fn classifies_bad_request() {
        let err = Error::from(api_error(400, "BadRequest"));
        assert!(err.is_bad_request(), "expected BadRequest classification, got {:?}", err);
    }

    #[test]
    fn classifies_already_exists() {
        let err = Error::from(api_error(409, "AlreadyExists"));
        assert!(err.is_already_exists(), "expected AlreadyExists classification, got {:?}", err);
    }

    #[test]
    fn conflict_without_already_exists_reason_is_generic() {
        let err = Error::from(api_error(409, "Conflict"));
        assert!(matches!(err, Error::Kube(_)), "expected generic classification, got {:?}", err);
    }

    #[test]
    fn display_leaves_api_message_to_source() {
        let err = Error::from(api_error(400, "BadRequest"));

        let display = err.to_string();
        let source = std::error::Error::source(&err).map(ToString::to_string).unwrap_or_default();
        assert!(!display.contains("test error BadRequest"), "expected display without API message, got {}", display);
        assert!(source.contains("test error BadRequest"), "expected source to carry API message, got {}", source);
    }

    #[test]
    fn other_api_errors_are_generic() {
        let err = Error::from(api_error(403, "Forbidden"));
        assert!(matches!(err, Error::Kube(_)), "expected generic classification, got {:?}", err);
    }
}
