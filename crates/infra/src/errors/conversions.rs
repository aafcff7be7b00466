//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use restq_domain::RestqError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub RestqError);

impl From<InfraError> for RestqError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<RestqError> for InfraError {
    fn from(value: RestqError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoRestqError {
    fn into_restq(self) -> RestqError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → RestqError */
/* -------------------------------------------------------------------------- */

impl IntoRestqError for HttpError {
    fn into_restq(self) -> RestqError {
        if self.is_builder() {
            return RestqError::Config(format!("invalid HTTP request: {self}"));
        }

        if self.is_timeout() {
            return RestqError::Network("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return RestqError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_decode() {
            return RestqError::Deserialization(format!("failed to read HTTP response: {self}"));
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
            let address = self.url().map(|url| url.to_string()).unwrap_or_default();

            return match code {
                401 | 403 => RestqError::Auth(message),
                _ => RestqError::http(code, address, message),
            };
        }

        RestqError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_restq())
    }
}

/* -------------------------------------------------------------------------- */
/* url::ParseError → RestqError */
/* -------------------------------------------------------------------------- */

impl IntoRestqError for UrlError {
    fn into_restq(self) -> RestqError {
        RestqError::Config(format!("invalid URL: {self}"))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(value.into_restq())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
