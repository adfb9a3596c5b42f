use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, warn};

use super::{
    ObjectBody, ObjectLocation, StorageAdapter, StorageError, StorageFuture, UploadReceipt,
    UploadRequest,
};
use crate::backend::StorageBackendId;
use crate::config::Env;
use crate::ConfigError;

/// Shared SDK config for AWS services in `region`.
///
/// Static credentials are used when both `AWS_ACCESS_KEY_ID` and
/// `AWS_SECRET_ACCESS_KEY` are set; otherwise the default provider chain.
pub(crate) async fn load_aws_config(env: &Env, region: &str) -> SdkConfig {
    let mut loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_owned()));

    if let (Some(access_key), Some(secret_key)) = (
        env.get("AWS_ACCESS_KEY_ID"),
        env.get("AWS_SECRET_ACCESS_KEY"),
    ) {
        loader = loader.credentials_provider(Credentials::new(
            access_key,
            secret_key,
            env.get("AWS_SESSION_TOKEN"),
            None,
            "nextmeeting_env",
        ));
    }

    loader.load().await
}

#[derive(Debug, Clone)]
enum PublicUrlStyle {
    /// `https://{bucket}.s3.{region}.amazonaws.com/{key}`
    VirtualHosted { region: String },
    /// `https://{domain}/{key}`
    CustomDomain { domain: String },
    None,
}

/// S3-compatible object store: AWS S3 or Cloudflare R2.
#[derive(Debug, Clone)]
pub struct S3Storage {
    id: StorageBackendId,
    client: Client,
    public_urls: PublicUrlStyle,
}

impl S3Storage {
    /// AWS S3 in `AWS_S3_REGION` (default `us-east-1`).
    #[tracing::instrument(level = "debug", skip(env))]
    pub async fn aws_from_env(env: &Env) -> Self {
        let region = env.get_or("AWS_S3_REGION", "us-east-1");
        let shared = load_aws_config(env, &region).await;
        Self {
            id: StorageBackendId::AwsS3,
            client: Client::from_conf(aws_sdk_s3::Config::from(&shared)),
            public_urls: PublicUrlStyle::VirtualHosted { region },
        }
    }

    /// Cloudflare R2 through its S3-compatible account endpoint.
    #[tracing::instrument(level = "debug", skip(env))]
    pub async fn r2_from_env(env: &Env) -> Result<Self, ConfigError> {
        let account_id = env.require("R2_ACCOUNT_ID")?;
        let access_key = env.require("R2_ACCESS_KEY_ID")?;
        let secret_key = env.require("R2_SECRET_ACCESS_KEY")?;

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("auto"))
            .credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "nextmeeting_r2",
            ))
            .endpoint_url(format!("https://{account_id}.r2.cloudflarestorage.com"))
            .load()
            .await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        let public_urls = match env.get("R2_PUBLIC_DOMAIN") {
            Some(domain) => PublicUrlStyle::CustomDomain {
                domain: domain
                    .trim_start_matches("https://")
                    .trim_end_matches('/')
                    .to_owned(),
            },
            None => {
                warn!("R2_PUBLIC_DOMAIN is not set; R2 objects have no public URL");
                PublicUrlStyle::None
            }
        };

        Ok(Self {
            id: StorageBackendId::CloudflareR2,
            client: Client::from_conf(config),
            public_urls,
        })
    }

    fn backend_error(&self, operation: &str, location: &ObjectLocation, error: impl std::error::Error) -> StorageError {
        StorageError::unavailable(format!(
            "{} {operation} failed for '{location}': {}",
            self.id,
            DisplayErrorContext(error)
        ))
    }

    #[tracing::instrument(level = "debug", skip(self, request), fields(location = %request.location))]
    async fn put(&self, request: UploadRequest) -> Result<UploadReceipt, StorageError> {
        let UploadRequest {
            location,
            body,
            content_type,
        } = request;

        let output = self
            .client
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .content_type(content_type)
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|error| self.backend_error("put_object", &location, error))?;

        debug!(backend = %self.id, %location, "object uploaded");
        Ok(UploadReceipt {
            public_url: self.public_url(&location),
            etag: output.e_tag().map(str::to_owned),
            location,
        })
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, location: &ObjectLocation) -> Result<ObjectBody, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .map_err(|error| {
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key())
                {
                    StorageError::not_found(&location.bucket, &location.key)
                } else {
                    self.backend_error("get_object", location, error)
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|error| self.backend_error("read body", location, error))?
            .into_bytes();
        Ok(ObjectBody::Binary(bytes.to_vec()))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn head(&self, location: &ObjectLocation) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error)
                if error
                    .as_service_error()
                    .is_some_and(|service| service.is_not_found()) =>
            {
                Ok(false)
            }
            Err(error) => Err(self.backend_error("head_object", location, error)),
        }
    }
}

impl StorageAdapter for S3Storage {
    fn id(&self) -> StorageBackendId {
        self.id
    }

    fn upload_file<'a>(
        &'a self,
        request: UploadRequest,
    ) -> StorageFuture<'a, Result<UploadReceipt, StorageError>> {
        Box::pin(self.put(request))
    }

    fn download_file<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<ObjectBody, StorageError>> {
        Box::pin(self.get(location))
    }

    fn file_exists<'a>(
        &'a self,
        location: &'a ObjectLocation,
    ) -> StorageFuture<'a, Result<bool, StorageError>> {
        Box::pin(self.head(location))
    }

    fn public_url(&self, location: &ObjectLocation) -> Option<String> {
        match &self.public_urls {
            PublicUrlStyle::VirtualHosted { region } => Some(format!(
                "https://{}.s3.{region}.amazonaws.com/{}",
                location.bucket, location.key
            )),
            PublicUrlStyle::CustomDomain { domain } => {
                Some(format!("https://{domain}/{}", location.key))
            }
            PublicUrlStyle::None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn aws_public_url_uses_virtual_hosted_style() {
        let env = Env::from_pairs([
            ("AWS_S3_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);
        let storage = S3Storage::aws_from_env(&env).await;

        assert_eq!(storage.id(), StorageBackendId::AwsS3);
        assert_eq!(
            storage.public_url(&ObjectLocation::new("sites", "abc/index.html")),
            Some(String::from(
                "https://sites.s3.eu-west-1.amazonaws.com/abc/index.html"
            ))
        );
    }

    #[tokio::test]
    async fn r2_requires_account_credentials() {
        let error = S3Storage::r2_from_env(&Env::from_pairs([("R2_ACCOUNT_ID", "acct")]))
            .await
            .expect_err("missing keys");
        assert!(matches!(
            error,
            ConfigError::MissingEnvVar {
                name: "R2_ACCESS_KEY_ID"
            }
        ));
    }

    #[tokio::test]
    async fn r2_public_url_requires_public_domain() {
        let base = [
            ("R2_ACCOUNT_ID", "acct"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
        ];
        let location = ObjectLocation::new("sites", "abc.json");

        let private = S3Storage::r2_from_env(&Env::from_pairs(base))
            .await
            .expect("r2 config");
        assert_eq!(private.public_url(&location), None);

        let mut with_domain = base.to_vec();
        with_domain.push(("R2_PUBLIC_DOMAIN", "https://cdn.example.org/"));
        let public = S3Storage::r2_from_env(&Env::from_pairs(with_domain))
            .await
            .expect("r2 config");
        assert_eq!(
            public.public_url(&location),
            Some(String::from("https://cdn.example.org/abc.json"))
        );
    }
}
