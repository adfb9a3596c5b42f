use std::process::ExitCode;

use nextmeeting_core::orchestrator::build_tenant_schedule;
use nextmeeting_core::{Normalizer, UtcDateTime};

use crate::cli::CheckArgs;
use crate::commands::Context;
use crate::error::CliError;

pub async fn execute(context: &Context, args: &CheckArgs) -> Result<ExitCode, CliError> {
    let tenant = context
        .settings
        .tenants
        .iter()
        .find(|tenant| tenant.name == args.tenant)
        .ok_or_else(|| CliError::UnknownTenant {
            name: args.tenant.clone(),
            known: context
                .settings
                .tenants
                .iter()
                .map(|tenant| tenant.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    let source = context.registries.sources.resolve().await?;
    let normalizer = Normalizer::new(context.settings.schedule_offset);
    let payload =
        build_tenant_schedule(source.as_ref(), &normalizer, tenant, UtcDateTime::now()).await?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&payload)?
    } else {
        serde_json::to_string(&payload)?
    };
    println!("{rendered}");
    Ok(ExitCode::SUCCESS)
}
