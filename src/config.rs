//! Runtime settings: an optional TOML file, then environment overrides.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::coach::{CareerCoach, DEFAULT_FLASH_MODEL, DEFAULT_PRO_MODEL, ModelCatalog};
use crate::error::ConfigError;
use crate::llm::{GoogleModel, GoogleModelConfig};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub pro_model: String,
    pub flash_model: String,
    pub retries: u32,
    pub attempt_timeout_secs: Option<u64>,
    pub max_history_turns: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: None,
            pro_model: DEFAULT_PRO_MODEL.to_string(),
            flash_model: DEFAULT_FLASH_MODEL.to_string(),
            retries: 1,
            attempt_timeout_secs: None,
            max_history_turns: None,
        }
    }
}

impl Settings {
    /// Reads `path` when given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "reading_config_file");
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies overrides from `lookup`, which maps an environment variable
    /// name to its value. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = get("GEMINI_MODEL_NAME") {
            self.pro_model = model;
        }
        if let Some(model) = get("GEMINI_FLASH_MODEL_NAME") {
            self.flash_model = model;
        }
        if let Some(url) = get("GEMINI_API_BASE_URL") {
            self.api_base_url = Some(url);
        }
        if let Some(value) = get("KEJU_RETRIES") {
            self.retries = parse_number("KEJU_RETRIES", &value)?;
        }
        if let Some(value) = get("KEJU_ATTEMPT_TIMEOUT_SECS") {
            self.attempt_timeout_secs = Some(parse_number("KEJU_ATTEMPT_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = get("KEJU_MAX_HISTORY_TURNS") {
            self.max_history_turns = Some(parse_number("KEJU_MAX_HISTORY_TURNS", &value)?);
        }
        Ok(())
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs.map(Duration::from_secs)
    }

    pub fn model_catalog(&self) -> ModelCatalog {
        ModelCatalog {
            pro: self.pro_model.clone(),
            flash: self.flash_model.clone(),
        }
    }

    pub fn google_model(&self) -> Result<GoogleModel, ConfigError> {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let mut config = GoogleModelConfig::new(api_key);
        config.api_base_url = self.api_base_url.clone();
        Ok(GoogleModel::new(config)?)
    }

    pub fn career_coach(&self) -> Result<CareerCoach, ConfigError> {
        let mut coach = CareerCoach::new(Arc::new(self.google_model()?))
            .with_models(self.model_catalog())
            .with_retries(self.retries);
        if let Some(timeout) = self.attempt_timeout() {
            coach = coach.with_attempt_timeout(timeout);
        }
        if let Some(turns) = self.max_history_turns {
            coach = coach.with_history_window(turns);
        }
        Ok(coach)
    }
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn toml_fields_override_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            pro_model = "gemini-2.5-pro"
            retries = 3
            attempt_timeout_secs = 90
            "#,
        )
        .expect("parses");

        assert_eq!(settings.pro_model, "gemini-2.5-pro");
        assert_eq!(settings.flash_model, DEFAULT_FLASH_MODEL);
        assert_eq!(settings.retries, 3);
        assert_eq!(settings.attempt_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(settings.max_history_turns, None);
    }

    #[test]
    fn environment_wins_over_file_values() {
        let mut settings = Settings {
            pro_model: "from-file".to_string(),
            ..Settings::default()
        };

        settings
            .apply_overrides(env(&[
                ("GOOGLE_API_KEY", "google-key"),
                ("GEMINI_MODEL_NAME", "from-env"),
                ("KEJU_MAX_HISTORY_TURNS", "12"),
                ("GEMINI_FLASH_MODEL_NAME", "  "),
            ]))
            .expect("valid overrides");

        assert_eq!(settings.api_key.as_deref(), Some("google-key"));
        assert_eq!(settings.pro_model, "from-env");
        assert_eq!(settings.flash_model, DEFAULT_FLASH_MODEL);
        assert_eq!(settings.max_history_turns, Some(12));
    }

    #[test]
    fn gemini_key_takes_precedence() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(env(&[
                ("GEMINI_API_KEY", "gemini-key"),
                ("GOOGLE_API_KEY", "google-key"),
            ]))
            .expect("valid overrides");
        assert_eq!(settings.api_key.as_deref(), Some("gemini-key"));
    }

    #[test]
    fn non_numeric_overrides_are_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(env(&[("KEJU_RETRIES", "many")]))
            .expect_err("invalid");
        assert_eq!(err.to_string(), "invalid value for KEJU_RETRIES: \"many\"");
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = Settings::default().career_coach().expect_err("no key");
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn unreadable_file_reports_its_path() {
        let err = Settings::from_file(Path::new("/nonexistent/keju.toml")).expect_err("missing");
        assert!(err.to_string().contains("/nonexistent/keju.toml"));
    }

    #[test]
    fn catalog_mirrors_settings() {
        let settings = Settings {
            pro_model: "p".to_string(),
            flash_model: "f".to_string(),
            ..Settings::default()
        };
        let catalog = settings.model_catalog();
        assert_eq!(catalog.get(crate::coach::ModelTier::Flash), "f");
    }
}
