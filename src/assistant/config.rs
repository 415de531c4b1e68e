//! Runtime configuration.
//!
//! [`AssistantConfig`] is a plain struct: callers may build it by hand, or call
//! [`AssistantConfig::load`] to read a `.env` file and the process environment.
//!
//! ```rust
//! use piping_assistant::AssistantConfig;
//!
//! let config = AssistantConfig::from_lookup(|key| match key {
//!     "GEMINI_API_KEY" => Some("test-key".to_string()),
//!     _ => None,
//! })
//! .unwrap();
//! assert_eq!(config.limits.upload_char_limit, 500_000);
//! ```

use std::path::PathBuf;

use crate::clients::gemini::{DEFAULT_API_ROOT, DEFAULT_BASE_URL};

pub const DEFAULT_PROJECTS: [&str; 3] = ["General", "Brazi Refinery", "Gas Pipeline"];
pub const DEFAULT_MODELS: [&str; 2] = ["gemini-2.5-flash", "gemini-1.5-flash"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API key is missing: set GEMINI_API_KEY in the environment or in a .env file")]
    MissingApiKey,
    #[error("Drive access is not configured: set GOOGLE_APPLICATION_CREDENTIALS or DRIVE_ACCESS_TOKEN")]
    MissingDriveCredentials,
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Character and count ceilings applied to text handed to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Ceiling for an uploaded document interpolated into the document-chat prompt.
    pub upload_char_limit: usize,
    /// Ceiling for the text returned by one library document read.
    pub read_char_limit: usize,
    /// Pages extracted per library document read.
    pub read_page_limit: usize,
    /// Filenames returned by one library search.
    pub search_result_limit: usize,
    /// Results returned by one web search.
    pub web_result_limit: usize,
    /// Tool calls the agent may chain within one turn.
    pub max_tool_iterations: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            upload_char_limit: 500_000,
            read_char_limit: 100_000,
            read_page_limit: 50,
            search_result_limit: 20,
            web_result_limit: 5,
            max_tool_iterations: 5,
        }
    }
}

/// How the Drive client obtains its bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveCredentials {
    /// Path to a service-account JSON key file.
    ServiceAccount(PathBuf),
    /// Pre-issued OAuth access token.
    AccessToken(String),
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub gemini_api_key: String,
    /// OpenAI-compatible Gemini endpoint.
    pub gemini_base_url: String,
    /// Native Gemini REST root used for model listing.
    pub gemini_api_root: String,
    /// Models to try, most preferred first.
    pub preferred_models: Vec<String>,
    pub drive_credentials: Option<DriveCredentials>,
    /// Restrict library searches and uploads to this Drive folder.
    pub drive_folder_id: Option<String>,
    pub projects: Vec<String>,
    pub limits: Limits,
}

impl AssistantConfig {
    /// Load `.env` (if present) and then read the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => log::debug!("loaded environment from {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => log::warn!("ignoring unreadable .env file: {}", err),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gemini_api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_API_KEY"))
            .ok_or(ConfigError::MissingApiKey)?;

        let preferred_models = get("GEMINI_MODEL")
            .map(|v| split_list(&v))
            .unwrap_or_else(|| DEFAULT_MODELS.iter().map(|m| m.to_string()).collect());

        let projects = get("PIPING_PROJECTS")
            .map(|v| split_list(&v))
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROJECTS.iter().map(|p| p.to_string()).collect());

        let drive_credentials = match (get("GOOGLE_APPLICATION_CREDENTIALS"), get("DRIVE_ACCESS_TOKEN")) {
            (Some(path), _) => Some(DriveCredentials::ServiceAccount(PathBuf::from(path))),
            (None, Some(token)) => Some(DriveCredentials::AccessToken(token)),
            (None, None) => None,
        };

        let mut limits = Limits::default();
        if let Some(value) = get("PIPING_MAX_TOOL_ITERATIONS") {
            limits.max_tool_iterations = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "PIPING_MAX_TOOL_ITERATIONS".to_string(),
                value,
            })?;
        }

        Ok(Self {
            gemini_api_key,
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            gemini_api_root: get("GEMINI_API_ROOT").unwrap_or_else(|| DEFAULT_API_ROOT.to_string()),
            preferred_models,
            drive_credentials,
            drive_folder_id: get("DRIVE_FOLDER_ID"),
            projects,
            limits,
        })
    }

    /// The project selected when a session starts.
    pub fn default_project(&self) -> &str {
        self.projects.first().map(String::as_str).unwrap_or("General")
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
