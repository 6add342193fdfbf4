//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.drape/config.json`) and environment.
//! Credentials and the public URL are usually supplied through the environment (or a `.env` file).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Twilio (WhatsApp) account, sender number and API base.
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Hosted try-on model settings.
    #[serde(default)]
    pub tryon: TryOnConfig,

    /// Where downloaded inputs and try-on results are written.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session store backend.
    #[serde(default)]
    pub sessions: SessionsConfig,
}

/// Gateway bind, port and public URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the webhook and static routes (default 5000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; Twilio must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Publicly reachable base URL (e.g. an ngrok tunnel). Result links are this plus `/static/<file>`.
    /// Overridden by DRAPE_PUBLIC_URL, then NGROK_URL.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            public_url: None,
        }
    }
}

/// Twilio account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwilioConfig {
    /// Account SID. Overridden by TWILIO_ACCOUNT_SID env.
    #[serde(default)]
    pub account_sid: Option<String>,

    /// Auth token. Overridden by TWILIO_AUTH_TOKEN env.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender id for outbound messages (the Twilio WhatsApp sandbox number by default).
    #[serde(default = "default_twilio_from")]
    pub from_number: String,

    /// REST API base (tests point this at a mock server).
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

fn default_twilio_from() -> String {
    "whatsapp:+14155238886".to_string()
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: default_twilio_from(),
            api_base: default_twilio_api_base(),
        }
    }
}

/// Hosted try-on model (a Gradio Space).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnConfig {
    /// Space id on the hub (default "HumanAIGC/OutfitAnyone").
    #[serde(default = "default_tryon_space")]
    pub space: String,

    /// Endpoint name exposed by the Space (default "/tryon").
    #[serde(default = "default_tryon_api_name")]
    pub api_name: String,

    /// Hub base used to resolve the Space host.
    #[serde(default = "default_hub_base")]
    pub hub_base: String,

    /// Direct Space URL; skips host resolution when set.
    #[serde(default)]
    pub space_url: Option<String>,

    /// Route prefix for the Gradio API ("" for Gradio 4, "/gradio_api" for Gradio 5).
    #[serde(default)]
    pub api_prefix: String,

    /// Hub token for private or rate-limited Spaces. Overridden by HF_TOKEN env.
    #[serde(default)]
    pub hf_token: Option<String>,

    /// Request timeout in seconds. When absent, the HTTP client default applies.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_tryon_space() -> String {
    "HumanAIGC/OutfitAnyone".to_string()
}

fn default_tryon_api_name() -> String {
    "/tryon".to_string()
}

fn default_hub_base() -> String {
    "https://huggingface.co".to_string()
}

impl Default for TryOnConfig {
    fn default() -> Self {
        Self {
            space: default_tryon_space(),
            api_name: default_tryon_api_name(),
            hub_base: default_hub_base(),
            space_url: None,
            api_prefix: String::new(),
            hf_token: None,
            timeout_secs: None,
        }
    }
}

/// Local directories for inputs and results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Directory served under `/static/` (try-on results).
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Directory for downloaded person/garment images.
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// Results older than this are pruned before each new one is written (0 keeps them forever).
    #[serde(default = "default_result_retention_secs")]
    pub result_retention_secs: u64,
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_result_retention_secs() -> u64 {
    86400
}

impl StorageConfig {
    /// Retention window for result files; None when pruning is disabled.
    pub fn result_retention(&self) -> Option<Duration> {
        (self.result_retention_secs > 0).then(|| Duration::from_secs(self.result_retention_secs))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            static_dir: default_static_dir(),
            media_dir: default_media_dir(),
            result_retention_secs: default_result_retention_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    /// Sessions live in process memory only.
    #[default]
    Memory,

    /// Sessions are persisted to a JSON file after every change.
    File,
}

/// Session store selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    #[serde(default)]
    pub store: SessionBackend,

    /// File for the `file` backend (default: `sessions.json` next to the config file).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Env value trimmed; empty counts as unset.
fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_nonempty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Twilio credentials (account SID, auth token). Env overrides config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
}

/// Resolve Twilio credentials: TWILIO_ACCOUNT_SID / TWILIO_AUTH_TOKEN override config.
/// Returns None unless both are present.
pub fn resolve_twilio_credentials(config: &Config) -> Option<TwilioCredentials> {
    let account_sid = env_nonempty("TWILIO_ACCOUNT_SID")
        .or_else(|| config_nonempty(config.twilio.account_sid.as_ref()))?;
    let auth_token = env_nonempty("TWILIO_AUTH_TOKEN")
        .or_else(|| config_nonempty(config.twilio.auth_token.as_ref()))?;
    Some(TwilioCredentials {
        account_sid,
        auth_token,
    })
}

/// Resolve the public base URL: DRAPE_PUBLIC_URL, then NGROK_URL, then config. Trailing slash removed.
pub fn resolve_public_url(config: &Config) -> Option<String> {
    env_nonempty("DRAPE_PUBLIC_URL")
        .or_else(|| env_nonempty("NGROK_URL"))
        .or_else(|| config_nonempty(config.gateway.public_url.as_ref()))
        .map(|u| u.trim_end_matches('/').to_string())
}

/// Resolve the hub token: HF_TOKEN env overrides config.
pub fn resolve_hf_token(config: &Config) -> Option<String> {
    env_nonempty("HF_TOKEN").or_else(|| config_nonempty(config.tryon.hf_token.as_ref()))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("DRAPE_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".drape").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Session file for the `file` backend; relative paths are resolved against the config file's parent.
pub fn resolve_sessions_path(config: &Config, config_path: &Path) -> PathBuf {
    match &config.sessions.path {
        Some(p) if p.is_absolute() => p.clone(),
        Some(p) if !p.as_os_str().is_empty() => config_parent(config_path).join(p),
        _ => config_parent(config_path).join("sessions.json"),
    }
}

/// Load config from the given path (or DRAPE_CONFIG_PATH / default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}


#[cfg(test)]
mod tests {
    use super::test_env::EnvGuard;
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 5000);
        assert_eq!(g.bind, "0.0.0.0");
    }

    #[test]
    fn empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.twilio.from_number, "whatsapp:+14155238886");
        assert_eq!(config.tryon.space, "HumanAIGC/OutfitAnyone");
        assert_eq!(config.tryon.api_name, "/tryon");
        assert_eq!(config.storage.static_dir, PathBuf::from("static"));
        assert_eq!(config.sessions.store, SessionBackend::Memory);
    }

    #[test]
    fn camel_case_keys_parse() {
        let config: Config = serde_json::from_str(
            r#"{
                "gateway": { "port": 8080, "publicUrl": "https://x.ngrok.app" },
                "twilio": { "accountSid": "AC1", "fromNumber": "whatsapp:+1" },
                "tryon": { "spaceUrl": "http://localhost:7860", "apiPrefix": "/gradio_api" },
                "sessions": { "store": "file", "path": "state/sessions.json" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.bind, "0.0.0.0");
        assert_eq!(config.twilio.account_sid.as_deref(), Some("AC1"));
        assert_eq!(config.twilio.from_number, "whatsapp:+1");
        assert_eq!(config.tryon.space_url.as_deref(), Some("http://localhost:7860"));
        assert_eq!(config.tryon.api_prefix, "/gradio_api");
        assert_eq!(config.sessions.store, SessionBackend::File);
    }

    #[test]
    fn resolve_sessions_path_default_and_relative() {
        let mut config = Config::default();
        let path = Path::new("/home/user/.drape/config.json");
        assert_eq!(
            resolve_sessions_path(&config, path),
            PathBuf::from("/home/user/.drape/sessions.json")
        );
        config.sessions.path = Some(PathBuf::from("state/s.json"));
        assert_eq!(
            resolve_sessions_path(&config, path),
            PathBuf::from("/home/user/.drape/state/s.json")
        );
        config.sessions.path = Some(PathBuf::from("/var/lib/drape/s.json"));
        assert_eq!(
            resolve_sessions_path(&config, path),
            PathBuf::from("/var/lib/drape/s.json")
        );
    }

    #[test]
    fn missing_config_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 5000);
    }

    #[test]
    fn invalid_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(Some(path)).is_err());
    }

    fn config_with_twilio(sid: &str, token: &str) -> Config {
        let mut config = Config::default();
        config.twilio.account_sid = Some(sid.to_string());
        config.twilio.auth_token = Some(token.to_string());
        config
    }

    #[test]
    fn twilio_env_overrides_config() {
        let env = EnvGuard::new();
        let config = config_with_twilio("ACconfig", "config-token");
        assert_eq!(
            resolve_twilio_credentials(&config),
            Some(TwilioCredentials {
                account_sid: "ACconfig".into(),
                auth_token: "config-token".into(),
            })
        );

        env.set("TWILIO_ACCOUNT_SID", " ACenv ");
        env.set("TWILIO_AUTH_TOKEN", "env-token");
        assert_eq!(
            resolve_twilio_credentials(&config),
            Some(TwilioCredentials {
                account_sid: "ACenv".into(),
                auth_token: "env-token".into(),
            })
        );

        env.set("TWILIO_AUTH_TOKEN", "   ");
        let creds = resolve_twilio_credentials(&config).unwrap();
        assert_eq!(creds.account_sid, "ACenv");
        assert_eq!(creds.auth_token, "config-token");
    }

    #[test]
    fn twilio_credentials_need_sid_and_token() {
        let env = EnvGuard::new();
        assert!(resolve_twilio_credentials(&Config::default()).is_none());

        env.set("TWILIO_ACCOUNT_SID", "ACenv");
        assert!(resolve_twilio_credentials(&Config::default()).is_none());

        let mut config = Config::default();
        config.twilio.auth_token = Some("  ".into());
        assert!(resolve_twilio_credentials(&config).is_none());
    }

    #[test]
    fn public_url_precedence_and_trailing_slash() {
        let env = EnvGuard::new();
        let mut config = Config::default();
        assert_eq!(resolve_public_url(&config), None);

        config.gateway.public_url = Some("https://config.example/".into());
        assert_eq!(resolve_public_url(&config).as_deref(), Some("https://config.example"));

        env.set("NGROK_URL", "https://tunnel.ngrok.app/");
        assert_eq!(resolve_public_url(&config).as_deref(), Some("https://tunnel.ngrok.app"));

        env.set("DRAPE_PUBLIC_URL", "https://drape.example");
        assert_eq!(resolve_public_url(&config).as_deref(), Some("https://drape.example"));

        env.set("DRAPE_PUBLIC_URL", " ");
        assert_eq!(resolve_public_url(&config).as_deref(), Some("https://tunnel.ngrok.app"));

        env.unset("NGROK_URL");
        assert_eq!(resolve_public_url(&config).as_deref(), Some("https://config.example"));
    }

    #[test]
    fn hf_token_env_overrides_config() {
        let env = EnvGuard::new();
        let mut config = Config::default();
        assert_eq!(resolve_hf_token(&config), None);

        config.tryon.hf_token = Some("hf_config".into());
        assert_eq!(resolve_hf_token(&config).as_deref(), Some("hf_config"));

        env.set("HF_TOKEN", "hf_env");
        assert_eq!(resolve_hf_token(&config).as_deref(), Some("hf_env"));

        env.set("HF_TOKEN", "");
        assert_eq!(resolve_hf_token(&config).as_deref(), Some("hf_config"));
    }

    #[test]
    fn result_retention_defaults_to_a_day_and_zero_disables() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.storage.result_retention(), Some(Duration::from_secs(86400)));

        let config: Config =
            serde_json::from_str(r#"{ "storage": { "resultRetentionSecs": 0 } }"#).unwrap();
        assert_eq!(config.storage.result_retention(), None);
    }
}
