use crate::{
    conflict_checker::{SlotOptions, SlotPolicy},
    configuration::Configuration,
    error::ConfigurationError,
    text_generation::{DEFAULT_ENDPOINT, DEFAULT_MODEL},
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "hidro_clean", about = "Hidro Clean CRM and scheduling service")]
pub struct ConfigurationHandler {
    /// Port the web server listens on
    #[arg(long, env = "HIDRO_PORT", default_value = "3000")]
    port: String,

    /// Password expected in the `x-admin-password` header
    #[arg(long, env = "HIDRO_ADMIN_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// PostgreSQL URL. Without it appointments are kept in memory only
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, env = "HIDRO_FRONTEND_PATH", default_value = "frontend/index.html")]
    frontend_path: PathBuf,

    #[arg(long, env = "HIDRO_WEBSITE_TITLE", default_value = "Hidro Clean")]
    website_title: String,

    /// Gemini API key. Without it replies come from the local template
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    ai_api_key: Option<String>,

    #[arg(long, env = "HIDRO_AI_MODEL", default_value = DEFAULT_MODEL)]
    ai_model: String,

    #[arg(long, env = "HIDRO_AI_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    ai_endpoint: String,

    /// Comma separated start times offered as free slots
    #[arg(
        long,
        env = "HIDRO_SLOT_ANCHORS",
        default_value = "08:00,10:00,12:00,14:00,16:00,18:00"
    )]
    slot_anchors: String,

    /// Length of a suggested slot in minutes
    #[arg(long, env = "HIDRO_SLOT_DURATION", default_value_t = 120)]
    slot_duration: u32,

    /// `flag` returns busy slots marked, `filter` leaves them out
    #[arg(long, env = "HIDRO_SLOT_POLICY", default_value = "flag")]
    slot_policy: String,

    #[arg(skip)]
    slot_options: SlotOptions,
}

impl ConfigurationHandler {
    /// Reads `.env`, the environment and the command line. Any missing or
    /// invalid setting is returned as an error; nothing falls back to a
    /// built-in secret.
    pub fn parse_arguments() -> Result<Self, ConfigurationError> {
        dotenvy::dotenv().ok();
        Self::parse().validated()
    }

    pub fn validated(mut self) -> Result<Self, ConfigurationError> {
        match self.password.as_deref().map(str::trim) {
            None | Some("") => return Err(ConfigurationError::Missing("password")),
            Some(_) => {}
        }

        if let Some(key) = &self.ai_api_key {
            if key.trim().is_empty() {
                return Err(ConfigurationError::Invalid {
                    name: "ai_api_key",
                    reason: "must not be empty when given".into(),
                });
            }
        }

        if let Some(url) = &self.database_url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(ConfigurationError::Invalid {
                    name: "database_url",
                    reason: "expected a postgres:// URL".into(),
                });
            }
        }

        self.port
            .parse::<u16>()
            .map_err(|err| ConfigurationError::Invalid {
                name: "port",
                reason: err.to_string(),
            })?;

        let anchors = SlotOptions::parse_anchors(&self.slot_anchors).map_err(|err| {
            ConfigurationError::Invalid {
                name: "slot_anchors",
                reason: err.to_string(),
            }
        })?;
        if anchors.is_empty() {
            return Err(ConfigurationError::Invalid {
                name: "slot_anchors",
                reason: "at least one anchor is required".into(),
            });
        }
        let policy = self
            .slot_policy
            .parse::<SlotPolicy>()
            .map_err(|err| ConfigurationError::Invalid {
                name: "slot_policy",
                reason: err.to_string(),
            })?;
        self.slot_options = SlotOptions::new(anchors, self.slot_duration, policy).map_err(
            |err| ConfigurationError::Invalid {
                name: "slot_duration",
                reason: err.to_string(),
            },
        )?;

        Ok(self)
    }
}

impl Configuration for ConfigurationHandler {
    fn website_title(&self) -> String {
        self.website_title.clone()
    }

    fn password(&self) -> String {
        self.password.clone().unwrap_or_default()
    }

    fn frontend_path(&self) -> PathBuf {
        self.frontend_path.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn ai_api_key(&self) -> Option<String> {
        self.ai_api_key.clone()
    }

    fn ai_model(&self) -> String {
        self.ai_model.clone()
    }

    fn ai_endpoint(&self) -> String {
        self.ai_endpoint.clone()
    }

    fn slot_options(&self) -> SlotOptions {
        self.slot_options.clone()
    }
}
