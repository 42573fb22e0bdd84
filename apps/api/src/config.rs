use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::layout::{default_budget, CardBudget};

/// Application configuration loaded from environment variables.
/// Every variable has a default; startup fails only on unparsable values or an
/// inconsistent budget.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub budget: CardBudget,
    pub max_refine_depth: u8,
    /// Measurement service. `None` falls back to the offline estimate oracle.
    pub oracle_url: Option<String>,
    /// Rasterization service. `None` disables image rendering.
    pub renderer_url: Option<String>,
    pub oracle_timeout_secs: u64,
    /// Documents paginated concurrently.
    pub oracle_concurrency: usize,
    pub output_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        // Safe and hard heights default to the same distance from the frame
        // bottom as the 1080x1440 defaults.
        let defaults = default_budget();
        let card_width: u32 = parse_env("CARD_WIDTH", defaults.frame_width)?;
        let card_height: u32 = parse_env("CARD_HEIGHT", defaults.frame_height)?;
        let safe_inset = defaults.frame_height - defaults.safe_height;
        let hard_inset = defaults.frame_height - defaults.hard_height;
        let budget = CardBudget {
            frame_width: card_width,
            frame_height: card_height,
            safe_height: parse_env("SAFE_HEIGHT", card_height.saturating_sub(safe_inset))?,
            hard_height: parse_env("HARD_HEIGHT", card_height.saturating_sub(hard_inset))?,
        };
        validate_budget(&budget)?;

        let oracle_concurrency: usize = parse_env("ORACLE_CONCURRENCY", 2)?;
        if oracle_concurrency == 0 {
            bail!("ORACLE_CONCURRENCY must be at least 1");
        }

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            budget,
            max_refine_depth: parse_env("MAX_REFINE_DEPTH", 6)?,
            oracle_url: optional_env("ORACLE_URL"),
            renderer_url: optional_env("RENDERER_URL"),
            oracle_timeout_secs: parse_env("ORACLE_TIMEOUT_SECS", 30)?,
            oracle_concurrency,
            output_dir: optional_env("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./output")),
        })
    }
}

fn validate_budget(budget: &CardBudget) -> Result<()> {
    if budget.safe_height == 0 {
        bail!("SAFE_HEIGHT must be positive");
    }
    if budget.safe_height > budget.hard_height {
        bail!(
            "SAFE_HEIGHT ({}) must not exceed HARD_HEIGHT ({})",
            budget.safe_height,
            budget.hard_height
        );
    }
    if budget.hard_height > budget.frame_height {
        bail!(
            "HARD_HEIGHT ({}) must not exceed CARD_HEIGHT ({})",
            budget.hard_height,
            budget.frame_height
        );
    }
    Ok(())
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget_is_valid() {
        validate_budget(&default_budget()).unwrap();
    }

    #[test]
    fn test_safe_above_hard_is_rejected() {
        let budget = CardBudget {
            safe_height: 1400,
            ..default_budget()
        };
        let err = validate_budget(&budget).unwrap_err();
        assert!(err.to_string().contains("SAFE_HEIGHT"));
    }

    #[test]
    fn test_hard_above_frame_is_rejected() {
        let budget = CardBudget {
            hard_height: 2000,
            ..default_budget()
        };
        assert!(validate_budget(&budget).is_err());
    }

    #[test]
    fn test_parse_env_defaults_and_errors() {
        assert_eq!(parse_env::<u32>("CARDPACK_TEST_UNSET_VARIABLE", 7).unwrap(), 7);

        std::env::set_var("CARDPACK_TEST_BAD_NUMBER", "not-a-number");
        let err = parse_env::<u32>("CARDPACK_TEST_BAD_NUMBER", 7).unwrap_err();
        assert!(err.to_string().contains("CARDPACK_TEST_BAD_NUMBER"));

        std::env::set_var("CARDPACK_TEST_GOOD_NUMBER", " 42 ");
        assert_eq!(parse_env::<u32>("CARDPACK_TEST_GOOD_NUMBER", 7).unwrap(), 42);
    }
}
