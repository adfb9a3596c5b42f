use std::str::FromStr;

use sqlx::mysql::MySqlConnection;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Row};
use tracing::{debug, warn};

use crate::backend::SourceBackendId;
use crate::config::Env;
use crate::data_source::{MeetingSource, SourceError, SourceFuture};
use crate::domain::RawRecord;
use crate::ValidationError;

const COLUMNS: [&str; 9] = [
    "day_of_week",
    "start_time",
    "meeting_name",
    "meeting_id",
    "password",
    "join_url",
    "contact_info",
    "notes",
    "duration_minutes",
];

/// SQL dialect of `DATABASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Postgres,
    MySql,
}

impl DatabaseKind {
    const fn text_type(self) -> &'static str {
        match self {
            Self::Postgres => "TEXT",
            Self::MySql => "CHAR",
        }
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            other => Err(format!(
                "unsupported database type '{other}', expected postgresql or mysql"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub kind: Result<DatabaseKind, String>,
}

impl DatabaseConfig {
    pub fn from_env(env: &Env) -> Self {
        Self {
            url: env.get("DATABASE_URL"),
            kind: env.get_or("DATABASE_TYPE", "postgresql").parse(),
        }
    }
}

/// Reads active meetings from a SQL table.
///
/// Columns are cast to text in the query so that integer and time columns
/// decode the same way on both dialects.
#[derive(Debug, Clone)]
pub struct DatabaseSource {
    config: DatabaseConfig,
}

impl DatabaseSource {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    fn connection(&self) -> Result<(&str, DatabaseKind), SourceError> {
        let url = self
            .config
            .url
            .as_deref()
            .ok_or_else(|| SourceError::missing_config("database source requires DATABASE_URL"))?;
        let kind = self
            .config
            .kind
            .clone()
            .map_err(SourceError::missing_config)?;
        Ok((url, kind))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn query(&self, table: &str) -> Result<Vec<RawRecord>, SourceError> {
        let (url, kind) = self.connection()?;
        let sql = select_statement(table, kind)
            .map_err(|error| SourceError::invalid_request(error.to_string()))?;

        let records = match kind {
            DatabaseKind::Postgres => {
                let mut conn = PgConnection::connect(url).await.map_err(connect_error)?;
                let rows = sqlx::query(&sql)
                    .fetch_all(&mut conn)
                    .await
                    .map_err(query_error)?;
                let records = rows_to_records(rows.iter().map(|row| {
                    move |column: &str| row.try_get::<Option<String>, _>(column)
                }));
                if let Err(error) = conn.close().await {
                    warn!(%error, "failed to close database connection");
                }
                records
            }
            DatabaseKind::MySql => {
                let mut conn = MySqlConnection::connect(url).await.map_err(connect_error)?;
                let rows = sqlx::query(&sql)
                    .fetch_all(&mut conn)
                    .await
                    .map_err(query_error)?;
                let records = rows_to_records(rows.iter().map(|row| {
                    move |column: &str| row.try_get::<Option<String>, _>(column)
                }));
                if let Err(error) = conn.close().await {
                    warn!(%error, "failed to close database connection");
                }
                records
            }
        };

        debug!(table, records = records.len(), "database meetings fetched");
        Ok(records)
    }
}

impl MeetingSource for DatabaseSource {
    fn id(&self) -> SourceBackendId {
        SourceBackendId::Database
    }

    fn fetch_meetings<'a>(
        &'a self,
        source_identifier: &'a str,
    ) -> SourceFuture<'a, Result<Vec<RawRecord>, SourceError>> {
        Box::pin(self.query(source_identifier))
    }

    fn test_connection<'a>(&'a self) -> SourceFuture<'a, bool> {
        Box::pin(async move {
            let Ok((url, kind)) = self.connection() else {
                return false;
            };
            let outcome = match kind {
                DatabaseKind::Postgres => match PgConnection::connect(url).await {
                    Ok(conn) => conn.close().await,
                    Err(error) => Err(error),
                },
                DatabaseKind::MySql => match MySqlConnection::connect(url).await {
                    Ok(conn) => conn.close().await,
                    Err(error) => Err(error),
                },
            };
            if let Err(error) = &outcome {
                warn!(%error, "database connection test failed");
            }
            outcome.is_ok()
        })
    }
}

/// `SELECT CAST(col AS TEXT) AS col, ... FROM <table> WHERE active`.
fn select_statement(table: &str, kind: DatabaseKind) -> Result<String, ValidationError> {
    let table = table.trim();
    validate_table_name(table)?;
    let columns = COLUMNS
        .iter()
        .map(|column| format!("CAST({column} AS {}) AS {column}", kind.text_type()))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("SELECT {columns} FROM {table} WHERE active"))
}

/// `name` or `schema.name`, ASCII letters, digits and underscores only.
fn validate_table_name(table: &str) -> Result<(), ValidationError> {
    let valid_part = |part: &str| {
        part.chars()
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| valid_part(part)) {
        return Err(ValidationError::InvalidIdentifier {
            value: table.to_owned(),
        });
    }
    Ok(())
}

/// Decodes rows through a column getter; rows that fail to decode are skipped.
fn rows_to_records<I, G>(rows: I) -> Vec<RawRecord>
where
    I: IntoIterator<Item = G>,
    G: Fn(&str) -> Result<Option<String>, sqlx::Error>,
{
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, get)| match record_from_columns(&get) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(index, %error, "skipping undecodable database row");
                None
            }
        })
        .collect()
}

fn record_from_columns<G>(get: &G) -> Result<RawRecord, sqlx::Error>
where
    G: Fn(&str) -> Result<Option<String>, sqlx::Error>,
{
    let text = |column: &str| -> Result<Option<String>, sqlx::Error> {
        Ok(get(column)?
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty()))
    };
    Ok(RawRecord {
        day_of_week: text("day_of_week")?,
        start_time: text("start_time")?,
        meeting_name: text("meeting_name")?,
        meeting_id: text("meeting_id")?,
        password: text("password")?,
        join_url: text("join_url")?,
        contact_info: text("contact_info")?,
        notes: text("notes")?,
        duration_minutes: text("duration_minutes")?,
    })
}

fn connect_error(error: sqlx::Error) -> SourceError {
    SourceError::unavailable(format!("database connection failed: {error}"))
}

fn query_error(error: sqlx::Error) -> SourceError {
    SourceError::unavailable(format!("database query failed: {error}"))
}
