use aws_sdk_cloudfront::error::DisplayErrorContext;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_cloudfront::Client;
use tracing::debug;

use super::{AdvisoryEffect, AdvisoryError, EffectFuture};
use crate::config::Env;
use crate::domain::UtcDateTime;
use crate::storage::load_aws_config;

/// Purges paths from a CloudFront distribution.
#[derive(Debug, Clone)]
pub struct CloudFrontInvalidator {
    client: Client,
    distribution_id: String,
}

impl CloudFrontInvalidator {
    pub fn new(client: Client, distribution_id: impl Into<String>) -> Self {
        Self {
            client,
            distribution_id: distribution_id.into(),
        }
    }

    /// CloudFront is a global service; its API lives in `us-east-1`.
    pub async fn from_env(env: &Env, distribution_id: String) -> Self {
        let shared = load_aws_config(env, "us-east-1").await;
        Self::new(Client::new(&shared), distribution_id)
    }

    pub fn distribution_id(&self) -> &str {
        &self.distribution_id
    }
}

/// Builds the invalidation batch; the caller reference must be unique per request.
fn invalidation_batch(
    paths: &[String],
    caller_reference: String,
) -> Result<InvalidationBatch, AdvisoryError> {
    let quantity = i32::try_from(paths.len())
        .map_err(|_| AdvisoryError::Provider(String::from("too many invalidation paths")))?;
    let paths = Paths::builder()
        .quantity(quantity)
        .set_items(Some(paths.to_vec()))
        .build()
        .map_err(|error| AdvisoryError::Provider(error.to_string()))?;
    InvalidationBatch::builder()
        .paths(paths)
        .caller_reference(caller_reference)
        .build()
        .map_err(|error| AdvisoryError::Provider(error.to_string()))
}

impl AdvisoryEffect<[String]> for CloudFrontInvalidator {
    fn name(&self) -> &'static str {
        "cloudfront"
    }

    fn apply<'a>(&'a self, paths: &'a [String]) -> EffectFuture<'a> {
        Box::pin(async move {
            let reference = format!("nextmeeting-{}", UtcDateTime::now().unix_nanos());
            let batch = invalidation_batch(paths, reference)?;
            let output = self
                .client
                .create_invalidation()
                .distribution_id(&self.distribution_id)
                .invalidation_batch(batch)
                .send()
                .await
                .map_err(|error| AdvisoryError::Provider(DisplayErrorContext(error).to_string()))?;

            debug!(
                distribution = %self.distribution_id,
                invalidation = ?output.invalidation().map(|invalidation| invalidation.id()),
                "invalidation created"
            );
            Ok(())
        })
    }
}
