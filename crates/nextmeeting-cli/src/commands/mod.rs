mod check;
mod run;
mod serve;
mod sources;

use std::process::ExitCode;
use std::sync::Arc;

use nextmeeting_core::{
    AdvisoryEffects, Env, HttpClient, JobRunner, Registries, ReqwestHttpClient, Settings,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Everything a command needs, loaded once from the environment.
pub struct Context {
    pub settings: Settings,
    pub env: Env,
    pub http: Arc<dyn HttpClient>,
    pub registries: Arc<Registries>,
}

impl Context {
    pub fn load() -> Result<Self, CliError> {
        let env = Env::process();
        let settings = Settings::load(&env)?;
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let registries = Arc::new(Registries::from_settings(
            &settings,
            env.clone(),
            Arc::clone(&http),
        ));
        tracing::debug!(
            source = %settings.source_backend,
            storage = %settings.storage_backend,
            tenants = settings.tenants.len(),
            "configuration loaded"
        );
        Ok(Self {
            settings,
            env,
            http,
            registries,
        })
    }

    pub async fn job_runner(&self) -> JobRunner {
        let effects =
            AdvisoryEffects::from_settings(&self.settings, &self.env, Arc::clone(&self.http)).await;
        JobRunner::from_settings(&self.settings, Arc::clone(&self.registries), effects)
    }
}

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let context = Context::load()?;

    match &cli.command {
        Command::Run => run::execute(&context).await,
        Command::Serve(args) => serve::execute(context, args).await,
        Command::Sources => sources::execute(&context).await,
        Command::Check(args) => check::execute(&context, args).await,
    }
}
