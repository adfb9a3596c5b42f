use std::process::ExitCode;

use nextmeeting_core::{SourceBackendId, StorageBackendId};
use serde_json::json;

use crate::commands::Context;
use crate::error::CliError;

/// Prints the configured backends, the available ones and whether the
/// source adapter can reach its provider.
pub async fn execute(context: &Context) -> Result<ExitCode, CliError> {
    let source = context.registries.sources.resolve().await?;
    let storage = context.registries.storage.resolve().await?;
    let connected = source.test_connection().await;

    let report = json!({
        "source": {
            "backend": source.id().as_str(),
            "name": source.id().display_name(),
            "connected": connected,
        },
        "storage": {
            "backend": storage.id().as_str(),
            "name": storage.id().display_name(),
        },
        "tenants": context
            .settings
            .tenants
            .iter()
            .map(|tenant| tenant.name.as_str())
            .collect::<Vec<_>>(),
        "available": {
            "sources": SourceBackendId::ALL.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            "storage": StorageBackendId::ALL.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if connected {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}
