//! Session context
//!
//! Settings are read once at start-up (config file, then `SEMLAYER_*`
//! environment variables) and frozen into an immutable [`SessionContext`]
//! that is handed to the client and the sync manager at construction time.

use crate::config::{
    CONFIG_DIRECTORY, CONFIG_FILE_NAME, DEFAULT_READ_TIMEOUT, ENV_PREFIX,
};
use crate::error::{SemLayerError, SemResult};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Raw, possibly incomplete settings as loaded from file and environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api_uri: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    /// Local semantic-layer directory (defaults to `<cwd>/<app_id>`)
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
    /// Where packed artifacts are staged before upload
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from `config_file` (optional) overlaid with the process environment.
    pub fn load(config_file: Option<&Path>) -> SemResult<Self> {
        Self::load_with_env(config_file, None)
    }

    /// Same as [`Settings::load`] but reads variables from `env` instead of the process.
    pub fn load_with_env(
        config_file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> SemResult<Self> {
        let mut builder = Config::builder();

        let file = match config_file {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_file(),
        };
        if let Some(path) = file {
            debug!("Reading settings from {}", path.display());
            builder = builder.add_source(File::from(path).required(config_file.is_some()));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .ignore_empty(true)
                .source(env),
        );

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize::<Settings>())
            .map_err(|err| SemLayerError::configuration(format!("Invalid settings: {err}"), None))
    }
}

/// `~/.semlayer/config.toml`
pub fn default_config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIRECTORY).join(CONFIG_FILE_NAME))
}

/// Immutable per-process session state.
#[derive(Clone)]
pub struct SessionContext {
    api_base_uri: Url,
    bearer_token: String,
    app_id: String,
    local_root: PathBuf,
    read_timeout: Duration,
    temp_dir: PathBuf,
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("api_base_uri", &self.api_base_uri.as_str())
            .field("bearer_token", &"<redacted>")
            .field("app_id", &self.app_id)
            .field("local_root", &self.local_root)
            .field("read_timeout", &self.read_timeout)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl SessionContext {
    pub fn new(
        api_base_uri: &str,
        bearer_token: impl Into<String>,
        app_id: impl Into<String>,
        local_root: impl Into<PathBuf>,
    ) -> SemResult<Self> {
        let bearer_token = required(Some(bearer_token.into()), "api_token")?;
        let app_id = required(Some(app_id.into()), "app_id")?;
        Ok(Self {
            api_base_uri: parse_base_uri(api_base_uri)?,
            bearer_token,
            app_id,
            local_root: local_root.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            temp_dir: std::env::temp_dir(),
        })
    }

    /// Validate settings; any missing value is a configuration error.
    pub fn from_settings(settings: Settings, working_dir: &Path) -> SemResult<Self> {
        let api_uri = required(settings.api_uri, "api_uri")?;
        let token = required(settings.api_token, "api_token")?;
        let app_id = required(settings.app_id, "app_id")?;
        let local_root = settings
            .root_dir
            .map(|dir| working_dir.join(dir))
            .unwrap_or_else(|| working_dir.join(&app_id));

        let mut session = Self::new(&api_uri, token, app_id, local_root)?;
        if let Some(secs) = settings.read_timeout_secs {
            if secs == 0 {
                return Err(SemLayerError::configuration(
                    "read timeout must be at least one second",
                    Some("read_timeout_secs"),
                ));
            }
            session.read_timeout = Duration::from_secs(secs);
        }
        if let Some(temp_dir) = settings.temp_dir {
            let temp_dir = working_dir.join(temp_dir);
            // a temp archive written under the root would be packed into itself
            if is_within(&temp_dir, &session.local_root) {
                return Err(SemLayerError::configuration(
                    format!(
                        "temp_dir {} must not be inside the local root {}",
                        temp_dir.display(),
                        session.local_root.display()
                    ),
                    Some("temp_dir"),
                ));
            }
            session.temp_dir = temp_dir;
        }
        Ok(session)
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn api_base_uri(&self) -> &Url {
        &self.api_base_uri
    }

    pub fn bearer_token(&self) -> &str {
        &self.bearer_token
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn local_root(&self) -> &Path {
        &self.local_root
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}

fn required(value: Option<String>, field: &str) -> SemResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(SemLayerError::configuration(
            format!(
                "missing required setting '{field}' (set it in the config file or {}_{})",
                ENV_PREFIX,
                field.to_uppercase()
            ),
            Some(field),
        )),
    }
}

fn is_within(path: &Path, root: &Path) -> bool {
    let canonical = |p: &Path| std::fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    path.starts_with(root) || canonical(path).starts_with(canonical(root))
}

fn parse_base_uri(raw: &str) -> SemResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|err| {
        SemLayerError::configuration(format!("invalid API URI '{raw}': {err}"), Some("api_uri"))
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(SemLayerError::configuration(
            format!("API URI must be an http(s) URL: {raw}"),
            Some("api_uri"),
        ));
    }
    Ok(url)
}
