//! Unified error type.

use std::error::Error as StdError;
use std::fmt;

use http::StatusCode;

use crate::response::{IntoResponse, Response};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The error type returned by handlers, middleware, and the server.
///
/// Every error carries the HTTP status it turns into once it reaches the
/// edge of the chain. Middleware that rejects a request (missing credentials,
/// bad input) uses [`Error::http`]; anything else wrapped with [`Error::new`]
/// becomes `500 Internal Server Error`.
///
/// ```rust
/// use strata::Error;
/// use http::StatusCode;
///
/// let err = Error::http(StatusCode::UNAUTHORIZED, "missing token");
/// assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
/// ```
#[derive(Debug)]
pub struct Error {
    kind: Kind,
}

#[derive(Debug)]
enum Kind {
    Io(std::io::Error),
    Http { status: StatusCode, message: String },
    Other(BoxError),
}

impl Error {
    /// Wraps any error as a `500 Internal Server Error`.
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self { kind: Kind::Other(source.into()) }
    }

    /// An error that answers with `status`.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self { kind: Kind::Http { status, message: message.into() } }
    }

    /// The status code the client receives for this error.
    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            Kind::Http { status, .. } => *status,
            Kind::Io(_) | Kind::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the wrapped source if it is of type `T`.
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        match &self.kind {
            Kind::Io(e) => (e as &(dyn StdError + 'static)).downcast_ref(),
            Kind::Other(e) => e.downcast_ref(),
            Kind::Http { .. } => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Io(e) => write!(f, "io: {e}"),
            Kind::Http { status, message } => write!(f, "{}: {message}", status.as_u16()),
            Kind::Other(e) => write!(f, "{e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            Kind::Io(e) => Some(e),
            Kind::Other(e) => Some(e.as_ref()),
            Kind::Http { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self { kind: Kind::Io(e) }
    }
}

/// Client errors echo their message; server errors only expose the reason
/// phrase so internals never leak into a response body.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self.kind {
            Kind::Http { message, .. } if status.is_client_error() => message,
            _ => status.canonical_reason().unwrap_or_default().to_owned(),
        };
        Response::builder().status(status).text(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn wrapped_errors_are_internal() {
        let err = Error::new(Boom);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.downcast_ref::<Boom>().is_some());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn client_errors_echo_their_message() {
        let res = Error::http(StatusCode::FORBIDDEN, "nope").into_response();
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(&res.body()[..], b"nope");
    }

    #[test]
    fn server_errors_hide_their_message() {
        let res = Error::new("database password is hunter2").into_response();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(&res.body()[..], b"Internal Server Error");
    }
}
