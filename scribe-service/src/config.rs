use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{ScribeError, ScribeResult};

pub const ENV_API_PROVIDER: &str = "SCRIBE_API_PROVIDER";
pub const ENV_PROVIDER_API_KEY: &str = "SCRIBE_PROVIDER_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "SCRIBE_OPENAI_API_KEY";
pub const ENV_AZURE_API_KEY: &str = "SCRIBE_AZURE_API_KEY";
pub const ENV_AUDIO_MODEL_NAME: &str = "SCRIBE_AUDIO_MODEL_NAME";
pub const ENV_CHAT_MODEL_NAME: &str = "SCRIBE_CHAT_MODEL_NAME";
pub const ENV_AZURE_API_VERSION: &str = "SCRIBE_AZURE_API_VERSION";
pub const ENV_AZURE_ENDPOINT: &str = "SCRIBE_AZURE_ENDPOINT";
pub const ENV_GOOGLE_PROJECT_ID: &str = "SCRIBE_GOOGLE_PROJECT_ID";
pub const ENV_GOOGLE_LOCATION: &str = "SCRIBE_GOOGLE_LOCATION";
pub const ENV_API_BASE_URL: &str = "SCRIBE_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SCRIBE_REQUEST_TIMEOUT_SECS";
pub const ENV_MAX_FIELDS_PER_REQUEST: &str = "SCRIBE_MAX_FIELDS_PER_REQUEST";
pub const ENV_TNC: &str = "SCRIBE_TNC";

pub const DEFAULT_AUDIO_MODEL: &str = "whisper-1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Upstream service a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI platform (Whisper + chat completions)
    #[serde(rename = "openai")]
    OpenAi,
    /// Azure OpenAI deployments
    Azure,
    /// Google Vertex AI Gemini
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Azure => "azure",
            ProviderKind::Google => "google",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "azure" => Ok(ProviderKind::Azure),
            "google" => Ok(ProviderKind::Google),
            other => Err(ScribeError::invalid_setting(
                ENV_API_PROVIDER,
                format!("unknown provider \"{}\", expected openai, azure or google", other),
            )),
        }
    }
}

/// Source of fallback settings.
///
/// The process environment in production, a plain map in tests.
pub trait EnvLookup: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvLookup for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Host-supplied provider settings.
///
/// Every field is optional; [`ProviderConfig::resolve`] fills the gaps from
/// the environment and the defaults, then checks that the selected provider
/// has what it needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: Option<ProviderKind>,
    pub api_key: Option<SecretString>,
    pub audio_model: Option<String>,
    pub chat_model: Option<String>,
    pub azure_api_version: Option<String>,
    pub azure_endpoint: Option<String>,
    pub google_project_id: Option<String>,
    pub google_location: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_fields_per_request: Option<usize>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    pub fn with_audio_model(mut self, model: impl Into<String>) -> Self {
        self.audio_model = Some(model.into());
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    pub fn with_azure(mut self, endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        self.azure_endpoint = Some(endpoint.into());
        self.azure_api_version = Some(api_version.into());
        self
    }

    pub fn with_google(mut self, project_id: impl Into<String>, location: impl Into<String>) -> Self {
        self.google_project_id = Some(project_id.into());
        self.google_location = Some(location.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn with_max_fields_per_request(mut self, max: usize) -> Self {
        self.max_fields_per_request = Some(max);
        self
    }

    /// Build a config purely from environment keys.
    pub fn from_lookup(env: &dyn EnvLookup) -> ScribeResult<Self> {
        Ok(Self {
            provider: env_provider(env)?,
            api_key: None,
            audio_model: non_empty(env.var(ENV_AUDIO_MODEL_NAME)),
            chat_model: non_empty(env.var(ENV_CHAT_MODEL_NAME)),
            azure_api_version: non_empty(env.var(ENV_AZURE_API_VERSION)),
            azure_endpoint: non_empty(env.var(ENV_AZURE_ENDPOINT)),
            google_project_id: non_empty(env.var(ENV_GOOGLE_PROJECT_ID)),
            google_location: non_empty(env.var(ENV_GOOGLE_LOCATION)),
            base_url: non_empty(env.var(ENV_API_BASE_URL)),
            request_timeout_secs: env_positive(env, ENV_REQUEST_TIMEOUT_SECS)?,
            max_fields_per_request: env_positive(env, ENV_MAX_FIELDS_PER_REQUEST)?.map(to_usize),
        })
    }

    /// Load configuration from environment variables
    pub fn from_env() -> ScribeResult<Self> {
        Self::from_lookup(&ProcessEnv)
    }

    /// Merge with the environment and defaults, then validate for the
    /// selected provider. Never touches the network.
    ///
    /// An environment key is only read, and parsed, when the matching
    /// config field is unset.
    pub fn resolve(&self, env: &dyn EnvLookup) -> ScribeResult<ResolvedConfig> {
        let kind = match self.provider {
            Some(kind) => kind,
            None => env_provider(env)?.unwrap_or(ProviderKind::OpenAi),
        };
        let pick = |own: &Option<String>, key: &str| {
            non_empty(own.clone()).or_else(|| non_empty(env.var(key)))
        };

        let api_key = self
            .api_key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .cloned()
            .or_else(|| non_empty(env.var(ENV_PROVIDER_API_KEY)).map(SecretString::from))
            .or_else(|| {
                let legacy = match kind {
                    ProviderKind::OpenAi => ENV_OPENAI_API_KEY,
                    ProviderKind::Azure => ENV_AZURE_API_KEY,
                    ProviderKind::Google => return None,
                };
                non_empty(env.var(legacy)).map(SecretString::from)
            });

        let audio_model = pick(&self.audio_model, ENV_AUDIO_MODEL_NAME)
            .unwrap_or_else(|| DEFAULT_AUDIO_MODEL.to_string());
        let chat_model = pick(&self.chat_model, ENV_CHAT_MODEL_NAME);
        let base_url = pick(&self.base_url, ENV_API_BASE_URL)
            .map(|url| url.trim_end_matches('/').to_string());

        let request_timeout = match self.request_timeout_secs {
            Some(0) => {
                return Err(ScribeError::invalid_setting(
                    ENV_REQUEST_TIMEOUT_SECS,
                    "must be greater than zero",
                ))
            }
            Some(secs) => secs,
            None => env_positive(env, ENV_REQUEST_TIMEOUT_SECS)?.unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };
        let max_fields_per_request = match self.max_fields_per_request {
            Some(0) => {
                return Err(ScribeError::invalid_setting(
                    ENV_MAX_FIELDS_PER_REQUEST,
                    "must be greater than zero",
                ))
            }
            Some(max) => Some(max),
            None => env_positive(env, ENV_MAX_FIELDS_PER_REQUEST)?.map(to_usize),
        };

        let provider = match kind {
            ProviderKind::OpenAi => ResolvedProvider::OpenAi {
                api_key: api_key.ok_or_else(|| ScribeError::missing_setting(ENV_PROVIDER_API_KEY, kind))?,
                base_url: base_url.unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                audio_model,
                chat_model: chat_model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            },
            // Azure is addressed by its resource endpoint; the base URL
            // override does not apply.
            ProviderKind::Azure => {
                let endpoint = pick(&self.azure_endpoint, ENV_AZURE_ENDPOINT)
                    .ok_or_else(|| ScribeError::missing_setting(ENV_AZURE_ENDPOINT, kind))?;
                let api_version = pick(&self.azure_api_version, ENV_AZURE_API_VERSION)
                    .ok_or_else(|| ScribeError::missing_setting(ENV_AZURE_API_VERSION, kind))?;
                ResolvedProvider::Azure {
                    api_key: api_key.ok_or_else(|| ScribeError::missing_setting(ENV_PROVIDER_API_KEY, kind))?,
                    endpoint: endpoint.trim_end_matches('/').to_string(),
                    api_version,
                    audio_model,
                    chat_model: chat_model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
                }
            }
            ProviderKind::Google => {
                let project_id = pick(&self.google_project_id, ENV_GOOGLE_PROJECT_ID)
                    .ok_or_else(|| ScribeError::missing_setting(ENV_GOOGLE_PROJECT_ID, kind))?;
                let location = pick(&self.google_location, ENV_GOOGLE_LOCATION)
                    .ok_or_else(|| ScribeError::missing_setting(ENV_GOOGLE_LOCATION, kind))?;
                let chat_model = chat_model
                    .ok_or_else(|| ScribeError::missing_setting(ENV_CHAT_MODEL_NAME, kind))?;
                let base_url = base_url.unwrap_or_else(|| vertex_base_url(&location));
                ResolvedProvider::Google {
                    access_token: api_key,
                    project_id,
                    location,
                    base_url,
                    chat_model,
                }
            }
        };

        Ok(ResolvedConfig {
            provider,
            request_timeout: Duration::from_secs(request_timeout),
            max_fields_per_request,
        })
    }
}

fn vertex_base_url(location: &str) -> String {
    if location == "global" {
        "https://aiplatform.googleapis.com".to_string()
    } else {
        format!("https://{}-aiplatform.googleapis.com", location)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_provider(env: &dyn EnvLookup) -> ScribeResult<Option<ProviderKind>> {
    non_empty(env.var(ENV_API_PROVIDER))
        .map(|p| p.parse::<ProviderKind>())
        .transpose()
}

fn env_positive(env: &dyn EnvLookup, key: &str) -> ScribeResult<Option<u64>> {
    non_empty(env.var(key))
        .map(|v| parse_positive(key, &v))
        .transpose()
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn parse_positive(key: &str, value: &str) -> ScribeResult<u64> {
    match value.parse::<u64>() {
        Ok(0) => Err(ScribeError::invalid_setting(key, "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(ScribeError::invalid_setting(key, e)),
    }
}

/// Validated, provider-tagged settings
#[derive(Debug, Clone)]
pub enum ResolvedProvider {
    OpenAi {
        api_key: SecretString,
        base_url: String,
        audio_model: String,
        chat_model: String,
    },
    Azure {
        api_key: SecretString,
        endpoint: String,
        api_version: String,
        audio_model: String,
        chat_model: String,
    },
    Google {
        access_token: Option<SecretString>,
        project_id: String,
        location: String,
        base_url: String,
        chat_model: String,
    },
}

impl ResolvedProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ResolvedProvider::OpenAi { .. } => ProviderKind::OpenAi,
            ResolvedProvider::Azure { .. } => ProviderKind::Azure,
            ResolvedProvider::Google { .. } => ProviderKind::Google,
        }
    }

    pub fn chat_model(&self) -> &str {
        match self {
            ResolvedProvider::OpenAi { chat_model, .. }
            | ResolvedProvider::Azure { chat_model, .. }
            | ResolvedProvider::Google { chat_model, .. } => chat_model,
        }
    }

    /// Google has no separate audio model; the chat model hears the audio.
    pub fn audio_model(&self) -> Option<&str> {
        match self {
            ResolvedProvider::OpenAi { audio_model, .. }
            | ResolvedProvider::Azure { audio_model, .. } => Some(audio_model),
            ResolvedProvider::Google { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: ResolvedProvider,
    pub request_timeout: Duration,
    pub max_fields_per_request: Option<usize>,
}

impl ResolvedConfig {
    pub fn kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Secret-free description for operators.
    pub fn summary(&self) -> ConfigSummary {
        let (endpoint, credentials) = match &self.provider {
            ResolvedProvider::OpenAi { base_url, .. } => (base_url.clone(), "api key"),
            ResolvedProvider::Azure { endpoint, api_version, .. } => {
                (format!("{} (api-version {})", endpoint, api_version), "api key")
            }
            ResolvedProvider::Google { base_url, project_id, location, access_token, .. } => (
                format!("{} (project {}, location {})", base_url, project_id, location),
                if access_token.is_some() { "access token" } else { "none" },
            ),
        };

        ConfigSummary {
            provider: self.kind(),
            endpoint,
            credentials: credentials.to_string(),
            audio_model: self.provider.audio_model().map(str::to_string),
            chat_model: self.provider.chat_model().to_string(),
            request_timeout_secs: self.request_timeout.as_secs(),
            max_fields_per_request: self.max_fields_per_request,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub provider: ProviderKind,
    pub endpoint: String,
    pub credentials: String,
    pub audio_model: Option<String>,
    pub chat_model: String,
    pub request_timeout_secs: u64,
    pub max_fields_per_request: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_provider_parse_is_case_insensitive() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(" AZURE ".parse::<ProviderKind>().unwrap(), ProviderKind::Azure);
        assert!("bedrock".parse::<ProviderKind>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_openai_defaults() {
        let resolved = ProviderConfig::new()
            .resolve(&env(&[(ENV_PROVIDER_API_KEY, "sk-test")]))
            .unwrap();

        match resolved.provider {
            ResolvedProvider::OpenAi { base_url, audio_model, chat_model, api_key } => {
                assert_eq!(base_url, DEFAULT_OPENAI_BASE_URL);
                assert_eq!(audio_model, "whisper-1");
                assert_eq!(chat_model, "gpt-4o");
                assert_eq!(api_key.expose_secret(), "sk-test");
            }
            other => panic!("unexpected provider: {:?}", other.kind()),
        }
        assert_eq!(resolved.request_timeout, Duration::from_secs(120));
        assert_eq!(resolved.max_fields_per_request, None);
    }

    #[test]
    fn test_config_wins_over_env() {
        let resolved = ProviderConfig::new()
            .with_api_key("sk-from-config")
            .with_chat_model("gpt-4.1")
            .resolve(&env(&[
                (ENV_PROVIDER_API_KEY, "sk-from-env"),
                (ENV_CHAT_MODEL_NAME, "gpt-4o-mini"),
            ]))
            .unwrap();

        assert_eq!(resolved.provider.chat_model(), "gpt-4.1");
        if let ResolvedProvider::OpenAi { api_key, .. } = resolved.provider {
            assert_eq!(api_key.expose_secret(), "sk-from-config");
        }
    }

    #[test]
    fn test_legacy_key_fallback() {
        let resolved = ProviderConfig::new()
            .with_provider(ProviderKind::Azure)
            .with_azure("https://example.openai.azure.com/", "2024-06-01")
            .resolve(&env(&[(ENV_AZURE_API_KEY, "azure-secret"), (ENV_OPENAI_API_KEY, "wrong")]))
            .unwrap();

        match resolved.provider {
            ResolvedProvider::Azure { api_key, endpoint, .. } => {
                assert_eq!(api_key.expose_secret(), "azure-secret");
                assert_eq!(endpoint, "https://example.openai.azure.com");
            }
            other => panic!("unexpected provider: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let err = ProviderConfig::new().resolve(&env(&[])).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains(ENV_PROVIDER_API_KEY));
    }

    #[test]
    fn test_azure_requires_endpoint_and_version() {
        let err = ProviderConfig::new()
            .with_provider(ProviderKind::Azure)
            .with_api_key("k")
            .resolve(&env(&[(ENV_AZURE_API_VERSION, "2024-06-01")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_AZURE_ENDPOINT));

        let err = ProviderConfig::new()
            .with_provider(ProviderKind::Azure)
            .with_api_key("k")
            .resolve(&env(&[(ENV_AZURE_ENDPOINT, "https://x.openai.azure.com")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_AZURE_API_VERSION));
    }

    #[test]
    fn test_google_needs_no_key_but_project_location_and_model() {
        let resolved = ProviderConfig::new()
            .resolve(&env(&[
                (ENV_API_PROVIDER, "google"),
                (ENV_GOOGLE_PROJECT_ID, "care-prod"),
                (ENV_GOOGLE_LOCATION, "us-central1"),
                (ENV_CHAT_MODEL_NAME, "gemini-2.5-flash"),
            ]))
            .unwrap();
        match &resolved.provider {
            ResolvedProvider::Google { base_url, access_token, .. } => {
                assert_eq!(base_url, "https://us-central1-aiplatform.googleapis.com");
                assert!(access_token.is_none());
            }
            other => panic!("unexpected provider: {:?}", other.kind()),
        }
        assert_eq!(resolved.provider.audio_model(), None);

        let err = ProviderConfig::new()
            .with_provider(ProviderKind::Google)
            .with_google("care-prod", "global")
            .resolve(&env(&[]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_CHAT_MODEL_NAME));
    }

    #[test]
    fn test_global_location_base_url() {
        assert_eq!(vertex_base_url("global"), "https://aiplatform.googleapis.com");
    }

    #[test]
    fn test_invalid_numeric_settings() {
        let err = ProviderConfig::new()
            .with_api_key("k")
            .resolve(&env(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(err.is_configuration());

        let err = ProviderConfig::new()
            .with_api_key("k")
            .with_max_fields_per_request(0)
            .resolve(&env(&[]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_FIELDS_PER_REQUEST));
    }

    #[test]
    fn test_malformed_env_ignored_when_config_is_set() {
        let resolved = ProviderConfig::new()
            .with_provider(ProviderKind::OpenAi)
            .with_api_key("sk-host")
            .with_request_timeout_secs(30)
            .with_max_fields_per_request(10)
            .resolve(&env(&[
                (ENV_API_PROVIDER, "openai-legacy"),
                (ENV_REQUEST_TIMEOUT_SECS, "30s"),
                (ENV_MAX_FIELDS_PER_REQUEST, "all"),
            ]))
            .unwrap();

        assert_eq!(resolved.kind(), ProviderKind::OpenAi);
        assert_eq!(resolved.request_timeout, Duration::from_secs(30));
        assert_eq!(resolved.max_fields_per_request, Some(10));

        let err = ProviderConfig::new()
            .with_api_key("sk-host")
            .resolve(&env(&[(ENV_API_PROVIDER, "openai-legacy")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_API_PROVIDER));
    }

    #[test]
    fn test_azure_ignores_base_url() {
        let err = ProviderConfig::new()
            .with_provider(ProviderKind::Azure)
            .with_api_key("k")
            .with_base_url("http://proxy.internal")
            .resolve(&env(&[(ENV_AZURE_API_VERSION, "2024-06-01")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_AZURE_ENDPOINT));

        let resolved = ProviderConfig::new()
            .with_provider(ProviderKind::Azure)
            .with_api_key("k")
            .with_azure("https://care.openai.azure.com/", "2024-06-01")
            .resolve(&env(&[(ENV_API_BASE_URL, "http://proxy.internal")]))
            .unwrap();
        match resolved.provider {
            ResolvedProvider::Azure { endpoint, .. } => assert_eq!(endpoint, "https://care.openai.azure.com"),
            other => panic!("unexpected provider: {:?}", other.kind()),
        }
    }

    #[test]
    fn test_summary_has_no_secret() {
        let resolved = ProviderConfig::new()
            .with_api_key("sk-supersecretvalue123")
            .resolve(&env(&[]))
            .unwrap();
        let json = serde_json::to_string(&resolved.summary()).unwrap();
        assert!(!json.contains("supersecret"));
        assert!(json.contains("\"provider\":\"openai\""));
    }

    #[test]
    fn test_deserialize_from_host_json() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"provider": "azure", "api_key": "k", "azure_endpoint": "https://x", "azure_api_version": "v"}"#,
        )
        .unwrap();
        assert_eq!(config.provider, Some(ProviderKind::Azure));
        assert!(config.resolve(&env(&[])).is_ok());
    }
}
