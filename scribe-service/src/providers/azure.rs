use secrecy::{ExposeSecret, SecretString};

use super::openai::{OpenAiCompatible, OpenAiTarget};
use crate::config::ProviderKind;

/// Azure OpenAI resource. Models are addressed by deployment name.
pub struct AzureDeployment {
    endpoint: String,
    api_version: String,
    api_key: SecretString,
}

pub type AzureProvider = OpenAiCompatible<AzureDeployment>;

impl AzureDeployment {
    pub fn new(endpoint: impl Into<String>, api_version: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_version: api_version.into(),
            api_key,
        }
    }
}

impl OpenAiTarget for AzureDeployment {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Azure
    }

    fn url(&self, model: &str, path: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, model, path, self.api_version
        )
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("api-key", self.api_key.expose_secret())
    }
}
