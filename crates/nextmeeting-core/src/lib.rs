//! # NextMeeting Core
//!
//! Multi-tenant schedule regeneration: pull meeting records for each tenant
//! from a configurable source, normalize and order them, inject them into the
//! site template and push the result to a configurable storage backend.
//!
//! ## Overview
//!
//! - **Source adapters** behind one [`MeetingSource`] contract
//! - **Storage adapters** behind one [`StorageAdapter`] contract
//! - **Registries** that resolve a backend name into an adapter at most once
//! - **Normalization** into a weekly schedule ordered by next occurrence
//! - **Publisher** with a bounded template download retry
//! - **Job runner** that isolates tenant failures and drives advisory effects
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Google Sheets, Airtable, REST, SQL, JSON file and Jotform sources |
//! | [`backend`] | Closed sets of source and storage backend names |
//! | [`config`] | Environment-driven settings |
//! | [`data_source`] | Source contract and structured source errors |
//! | [`domain`] | Records, meetings, schedule payload, tenants, timestamps |
//! | [`effects`] | CDN purge, chat notification, crash reports, check-in |
//! | [`error`] | Validation, configuration and top-level errors |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`normalize`] | Record normalization and occurrence ordering |
//! | [`orchestrator`] | Per-run tenant loop |
//! | [`publisher`] | Template rendering and artifact upload |
//! | [`registry`] | Lazily resolved adapter registries |
//! | [`retry`] | Fixed-delay retry helper |
//! | [`storage`] | S3, R2, Fly volume and local filesystem storage |
//! | [`util`] | Strict booleans and ordered/parallel async map |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ CLI run / serve │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   JobRunner     │────▶│ Advisory effects │
//! └────────┬────────┘     └──────────────────┘
//!          │ per tenant
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │ MeetingSource   │────▶│   Normalizer     │────▶│    Publisher     │
//! │ (registry)      │     └──────────────────┘     │ StorageAdapter   │
//! └─────────────────┘                              │ (registry)       │
//!                                                  └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Adapter errors are structured with a kind and a stable code:
//!
//! ```rust
//! use nextmeeting_core::{SourceError, SourceErrorKind};
//!
//! fn is_config_problem(error: &SourceError) -> bool {
//!     matches!(error.kind(), SourceErrorKind::MissingConfig)
//! }
//!
//! assert!(is_config_problem(&SourceError::missing_config("GOOGLE_API_KEY is not set")));
//! ```
//!
//! ## Security
//!
//! - Credentials are read from the environment only and never logged
//! - Transport errors are reported without the request URL

pub mod adapters;
pub mod backend;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod effects;
pub mod error;
pub mod http_client;
pub mod normalize;
pub mod orchestrator;
pub mod publisher;
pub mod registry;
pub mod retry;
pub mod storage;
pub mod util;

// Adapter implementations
pub use adapters::{
    AirtableSource, DatabaseSource, GoogleSheetsSource, JotformSource, JsonFileSource,
    RestApiSource, SubmissionTransformer,
};

// Backend identifiers
pub use backend::{SourceBackendId, StorageBackendId};

// Configuration
pub use config::{Env, Settings};

// Source contract
pub use data_source::{MeetingSource, SourceError, SourceErrorKind};

// Domain models
pub use domain::{
    ClockTime, DayOfWeek, NormalizedMeeting, RawRecord, ScheduleMetadata, ScheduledMeeting,
    SchedulePayload, TenantConfig, UtcDateTime,
};

// Advisory effects
pub use effects::{Advisory, AdvisoryEffect, AdvisoryEffects, AdvisoryError, AdvisoryOutcome, CrashReport};

// Error types
pub use error::{ConfigError, CoreError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, NoopHttpClient,
    ReqwestHttpClient,
};

// Normalization
pub use normalize::Normalizer;

// Orchestration
pub use orchestrator::{JobError, JobResult, JobRunner, JobSummary, TenantError, TenantOutcome};

// Publishing
pub use publisher::{PublishError, Publisher, PublisherConfig};

// Registries
pub use registry::{Registries, SourceRegistry, StorageRegistry};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Storage contract
pub use storage::{ObjectBody, ObjectLocation, StorageAdapter, StorageError, StorageErrorKind};
