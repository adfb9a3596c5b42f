use std::process::ExitCode;

use crate::commands::Context;
use crate::error::CliError;

/// One regeneration; prints `{success, errors}` and exits 3 when a tenant failed.
pub async fn execute(context: &Context) -> Result<ExitCode, CliError> {
    let runner = context.job_runner().await;
    let result = runner.run().await?;

    let summary = result.summary();
    println!("{}", serde_json::to_string(&summary)?);

    if summary.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(3))
    }
}
