use crate::config::types::{CategoryEntry, Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_categories(&config.categories)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 100, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between 0 and 10, got {}",
            config.max_retries
        )));
    }

    if config.fetch_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "fetch_timeout_ms must be >= 100ms, got {}ms",
            config.fetch_timeout_ms
        )));
    }

    if config.max_claimed_identifiers == Some(0) {
        return Err(ConfigError::Validation(
            "max_claimed_identifiers must be >= 1 when set".to_string(),
        ));
    }

    if config.max_listing_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_listing_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    // Validate contact email (basic validation)
    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates category entries
fn validate_categories(categories: &[CategoryEntry]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for entry in categories {
        if entry.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Category name cannot be empty".to_string(),
            ));
        }

        if !names.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate category name '{}'",
                entry.name
            )));
        }

        let url = Url::parse(&entry.seed).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", entry.seed, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                entry.seed
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            crawler: CrawlerConfig {
                max_concurrent_fetches: 2,
                max_retries: 3,
                retry_backoff_ms: 1000,
                fetch_timeout_ms: 90_000,
                max_claimed_identifiers: None,
                max_listing_pages: None,
                max_side_requests: 8,
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: "./test.db".to_string(),
            },
            categories: vec![CategoryEntry {
                name: "gaming".to_string(),
                seed: "https://shop.example/s?k=gaming".to_string(),
            }],
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&create_test_config()).is_ok());
    }

    #[test]
    fn test_crawler_limits() {
        let mut config = create_test_config();
        config.crawler.max_concurrent_fetches = 101;
        assert!(validate(&config).is_err());

        let mut config = create_test_config();
        config.crawler.max_retries = 11;
        assert!(validate(&config).is_err());

        let mut config = create_test_config();
        config.crawler.max_retries = 0;
        assert!(validate(&config).is_ok());

        let mut config = create_test_config();
        config.crawler.fetch_timeout_ms = 99;
        assert!(validate(&config).is_err());

        let mut config = create_test_config();
        config.crawler.max_claimed_identifiers = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_categories() {
        let mut config = create_test_config();
        let duplicate = config.categories[0].clone();
        config.categories.push(duplicate);
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::Validation(_)
        ));

        let mut config = create_test_config();
        config.categories[0].seed = "not a url".to_string();
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));

        let mut config = create_test_config();
        config.categories[0].seed = "ftp://shop.example/s".to_string();
        assert!(validate(&config).is_err());

        let mut config = create_test_config();
        config.categories[0].seed = "http://localhost:8080/s?k=x".to_string();
        assert!(validate(&config).is_ok());

        let mut config = create_test_config();
        config.categories[0].name = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_user_agent() {
        let mut config = create_test_config();
        config.user_agent.crawler_name = "Bad Name".to_string();
        assert!(validate(&config).is_err());

        let mut config = create_test_config();
        config.user_agent.contact_url = "nope".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }
}
