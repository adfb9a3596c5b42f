//! Meeting source contract.
//!
//! Every provider adapter implements [`MeetingSource`]: it authenticates,
//! paginates and maps its own field names into [`RawRecord`]s. Malformed
//! individual records are skipped with a warning; missing credentials fail
//! before any network call; network failures propagate without retry.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::backend::SourceBackendId;
use crate::domain::RawRecord;
use crate::http_client::{HttpError, HttpResponse};

/// Boxed future returned by adapter trait methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    MissingConfig,
    Unavailable,
    UpstreamStatus,
    InvalidPayload,
    InvalidRequest,
    Internal,
}

/// Structured source error carried into the tenant outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    status: Option<u16>,
}

impl SourceError {
    fn of_kind(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Credentials or identifiers are absent; raised before any network call.
    pub fn missing_config(message: impl Into<String>) -> Self {
        Self::of_kind(SourceErrorKind::MissingConfig, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::of_kind(SourceErrorKind::Unavailable, message)
    }

    /// Provider answered with a non-success status.
    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::of_kind(SourceErrorKind::UpstreamStatus, message)
        }
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::of_kind(SourceErrorKind::InvalidPayload, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::of_kind(SourceErrorKind::InvalidRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::of_kind(SourceErrorKind::Internal, message)
    }

    /// Maps a transport failure for the named provider.
    pub fn transport(provider: &str, error: HttpError) -> Self {
        if error.is_transient() {
            Self::unavailable(format!("{provider} transport error: {}", error.message()))
        } else {
            Self::internal(format!("{provider} transport error: {}", error.message()))
        }
    }

    /// Maps a non-success response, keeping the first 200 characters of the body.
    pub fn from_response(provider: &str, response: &HttpResponse) -> Self {
        Self::upstream_status(
            response.status,
            format!(
                "{provider} returned status {}: {}",
                response.status,
                response.body_snippet(200)
            ),
        )
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::MissingConfig => "source.missing_config",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::UpstreamStatus => "source.upstream_status",
            SourceErrorKind::InvalidPayload => "source.invalid_payload",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Meeting source adapter contract.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](MeetingSource::id) | Backend identifier |
/// | [`fetch_meetings`](MeetingSource::fetch_meetings) | Fetch all records for one tenant |
///
/// [`test_connection`](MeetingSource::test_connection) has a default that
/// performs a throwaway fetch; adapters override it with something cheaper.
pub trait MeetingSource: Send + Sync {
    fn id(&self) -> SourceBackendId;

    /// Fetches every record for `source_identifier` (sheet id, table, URL, form ids, ...).
    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>>;

    fn test_connection<'a>(&'a self) -> SourceFuture<'a, bool> {
        Box::pin(async move {
            match self.fetch_meetings("test").await {
                Ok(_) => true,
                Err(error) => {
                    warn!(source = %self.id(), %error, "connection test failed");
                    false
                }
            }
        })
    }
}
