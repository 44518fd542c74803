//! Error types for leadsync-clients.

use thiserror::Error;

use leadsync_core::{classify_http_status, ErrorClass};

/// Failure talking to a remote store.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-success status.
    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// No response at all (DNS, connect, TLS, timeout, reset).
    #[error("{service} transport error: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected response from {service}: {message}")]
    Decode {
        service: &'static str,
        message: String,
    },

    /// The lead addressed by an update is no longer in the sheet.
    #[error("lead {0} not found in sheet")]
    LeadNotFound(String),
}

impl ClientError {
    /// 429/5xx and transport failures are worth retrying; everything else is not.
    pub fn classify(&self) -> ErrorClass {
        match self {
            ClientError::Http { status, .. } => classify_http_status(*status),
            ClientError::Transport { .. } => ErrorClass::Retryable,
            ClientError::Decode { .. } | ClientError::LeadNotFound(_) => ErrorClass::Fatal,
        }
    }

    pub(crate) fn from_ureq(service: &'static str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => ClientError::Http {
                service,
                status,
                body: response
                    .into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {e}>")),
            },
            ureq::Error::Transport(transport) => ClientError::Transport {
                service,
                message: transport.to_string(),
            },
        }
    }

    pub(crate) fn decode(service: &'static str, err: impl std::fmt::Display) -> Self {
        ClientError::Decode {
            service,
            message: err.to_string(),
        }
    }
}
