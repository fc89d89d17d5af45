//! AWS SSM Parameter Store backend.
//!
//! Fetches configuration secrets from AWS Systems Manager Parameter
//! Store. Enable with `--features aws`.
//!
//! ## Usage
//!
//! Parameters are resolved under a prefix, one parameter per key:
//! `/<prefix>/<KEY>`. The client uses AWS credentials from the
//! environment (AWS_ACCESS_KEY_ID, etc.) or from the default credential
//! provider chain.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::trace;

use super::SecretStore;
use crate::error::StoreError;

/// AWS SSM Parameter Store [`SecretStore`] implementation.
pub struct SsmStore {
    client: aws_sdk_ssm::Client,
    prefix: String,
}

impl SsmStore {
    /// Connect using the default credential provider chain.
    ///
    /// `prefix` is the parameter path prefix, e.g. `/app/prod`.
    pub async fn connect(prefix: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::with_client(aws_sdk_ssm::Client::new(&config), prefix)
    }

    /// Wrap an existing SSM client.
    pub fn with_client(client: aws_sdk_ssm::Client, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.ends_with('/') {
            prefix.pop();
        }
        Self { client, prefix }
    }

    fn parameter_name(&self, key: &str) -> String {
        format!("{}/{}", self.prefix, key)
    }

    fn key_of<'a>(&self, parameter_name: &'a str) -> &'a str {
        parameter_name
            .strip_prefix(self.prefix.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(parameter_name)
    }
}

#[async_trait]
impl SecretStore for SsmStore {
    async fn fetch(&self, key: &str) -> Result<String, StoreError> {
        let name = self.parameter_name(key);
        trace!(parameter = %name, "fetching from SSM");

        let result = self
            .client
            .get_parameter()
            .name(&name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_parameter_not_found() {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::Unavailable(format!("SSM get_parameter failed: {service_err}"))
                }
            })?;

        result
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn fetch_many(&self, keys: &[String]) -> BTreeMap<String, Result<String, StoreError>> {
        let names: Vec<String> = keys.iter().map(|k| self.parameter_name(k)).collect();
        trace!(count = names.len(), "batch fetching from SSM");

        let response = self
            .client
            .get_parameters()
            .set_names(Some(names))
            .with_decryption(true)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                // Transport-level failure affects every requested key
                let detail = format!("SSM get_parameters failed: {e}");
                return keys
                    .iter()
                    .map(|k| (k.clone(), Err(StoreError::Unavailable(detail.clone()))))
                    .collect();
            }
        };

        let mut results: BTreeMap<String, Result<String, StoreError>> = BTreeMap::new();
        for parameter in response.parameters() {
            if let (Some(name), Some(value)) = (parameter.name(), parameter.value()) {
                results.insert(self.key_of(name).to_string(), Ok(value.to_string()));
            }
        }
        for invalid in response.invalid_parameters() {
            let key = self.key_of(invalid).to_string();
            results.insert(key.clone(), Err(StoreError::NotFound(key)));
        }
        // A parameter the response omitted entirely still gets an outcome
        for key in keys {
            results
                .entry(key.clone())
                .or_insert_with(|| Err(StoreError::NotFound(key.clone())));
        }

        results
    }

    fn name(&self) -> &'static str {
        "aws-ssm"
    }
}
