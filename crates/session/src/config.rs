use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use artinfo_answer::AnswerServiceConfig;

use crate::attachment::AttachmentLimit;
use crate::session::SessionPolicy;
use crate::submission::SUBMIT_TIMEOUT;

/// Answer endpoint used when neither the settings file nor the environment names one.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/chatgpt";

/// Prefix of environment variables that override settings, e.g. `ARTINFO_ENDPOINT`
/// or `ARTINFO_POLICY__MAX_ATTACHMENTS`.
pub const ENV_PREFIX: &str = "ARTINFO_";

pub const SETTINGS_DIRECTORY_NAME: &str = ".artinfo";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("failed to read settings from {path:?} on `{stage}`: {source}"))]
    ReadConfig {
        stage: &'static str,
        path: PathBuf,
        source: figment::Error,
    },
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateConfigDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteConfig {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to rename {from:?} to {to:?} on `{stage}`: {source}"))]
    RenameConfig {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("invalid value '{value}' for setting '{key}' on `{stage}`"))]
    InvalidValue {
        stage: &'static str,
        key: String,
        value: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub endpoint: String,
    pub policy: SessionPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            policy: SessionPolicy::default(),
        }
    }
}

impl SessionConfig {
    pub fn service_config(&self) -> AnswerServiceConfig {
        AnswerServiceConfig::new(&self.endpoint).with_timeout(SUBMIT_TIMEOUT)
    }

    /// Trims the endpoint; a blank one falls back to [`DEFAULT_ENDPOINT`].
    pub fn normalized(mut self) -> Self {
        let endpoint = self.endpoint.trim();
        self.endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint.to_string()
        };
        self
    }

    /// Rejects settings that would leave the first question unanswerable.
    pub fn validate(&self) -> ConfigResult<()> {
        ensure!(
            self.policy.attachment_limit != AttachmentLimit::Capped(0),
            InvalidValueSnafu {
                stage: "validate-settings",
                key: "policy.max_attachments",
                value: "0",
            }
        );
        Ok(())
    }
}

/// Settings file persistence.
pub struct ConfigStore {
    config: SessionConfig,
    path: PathBuf,
}

impl ConfigStore {
    pub fn default_config_path() -> PathBuf {
        PathBuf::from(SETTINGS_DIRECTORY_NAME).join(SETTINGS_FILE_NAME)
    }

    /// Loads `path` merged with `ARTINFO_*` variables, falling back to
    /// defaults when the result is unreadable or invalid.
    pub fn new(path: PathBuf) -> Self {
        let config = match Self::read(&path) {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!("{error}. using default settings");
                SessionConfig::default()
            }
        };

        Self { config, path }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn update(&mut self, config: SessionConfig) -> ConfigResult<()> {
        let config = config.normalized();
        config.validate()?;
        self.persist(&config)?;
        self.config = config;
        Ok(())
    }

    /// Defaults, then the settings file when present, then the environment.
    pub fn read(path: &Path) -> ConfigResult<SessionConfig> {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let config = Figment::from(Serialized::defaults(SessionConfig::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract::<SessionConfig>()
            .context(ReadConfigSnafu {
                stage: "extract-settings",
                path: path.to_path_buf(),
            })?
            .normalized();

        config.validate()?;
        Ok(config)
    }

    fn persist(&self, config: &SessionConfig) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(CreateConfigDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(config).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteConfigSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.path).context(RenameConfigSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.path);
        Ok(())
    }
}
