//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("APP_TOKEN is required")]
    MissingAppToken,
    #[error("OWNER_USER_ID is required")]
    MissingOwnerId,
    #[error("OWNER_USER_NAME is required")]
    MissingOwnerName,
    #[error("bot.prefix must not be empty")]
    EmptyPrefix,
    #[error("bot.prefix must not contain whitespace, got '{0}'")]
    PrefixWhitespace(String),
    #[error("database.path parent directory does not exist: {0}")]
    DatabasePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Mandatory identity
    if config.bot.app_token.as_deref().is_none_or(str::is_empty) {
        errors.push(ValidationError::MissingAppToken);
    }
    if config.bot.owner_user_id.is_none() {
        errors.push(ValidationError::MissingOwnerId);
    }
    if config.bot.owner_user_name.as_deref().is_none_or(str::is_empty) {
        errors.push(ValidationError::MissingOwnerName);
    }

    // Prefix
    let prefix = &config.bot.prefix;
    if prefix.is_empty() {
        errors.push(ValidationError::EmptyPrefix);
    } else if prefix.chars().any(char::is_whitespace) {
        errors.push(ValidationError::PrefixWhitespace(prefix.clone()));
    }

    // Database path validation
    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        errors.push(ValidationError::DatabasePathInvalid(config.database.path.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_valid_config() -> Config {
        toml::from_str(
            r#"
[bot]
app_token = "token"
owner_user_id = 1
owner_user_name = "owner"

[database]
path = ":memory:"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&minimal_valid_config()).is_ok());
    }

    #[test]
    fn test_missing_identity_reports_everything() {
        let errors = validate(&Config::default()).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingAppToken)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingOwnerId)));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingOwnerName)));
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = minimal_valid_config();
        config.bot.app_token = Some(String::new());
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::MissingAppToken)));
    }

    #[test]
    fn test_bad_prefix_fails() {
        let mut config = minimal_valid_config();
        config.bot.prefix = String::new();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::EmptyPrefix)));

        config.bot.prefix = "! ".to_string();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::PrefixWhitespace(_))));
    }

    #[test]
    fn test_missing_database_dir_fails() {
        let mut config = minimal_valid_config();
        config.database.path = "/nonexistent/rankbot/dir/bot.db".to_string();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DatabasePathInvalid(_))));
    }
}
