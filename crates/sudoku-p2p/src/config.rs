//! Client configuration.
//!
//! Loaded from defaults, then an optional JSON file in the user's config
//! directory, then `SUDOKU_P2P_*` environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sudoku_core::{GeneratorConfig, PlacementRule};
use tracing::debug;

use crate::error::ConfigError;

/// Fewest clues a puzzle can have and still be uniquely solvable
const MIN_SOLVABLE_CLUES: usize = 17;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Attempts of every read-modify-write cycle before giving up
    pub max_attempts: u32,
    /// Upper bound of the random pause between attempts
    pub backoff_max_ms: u64,
    /// Bound on each call to the store
    pub operation_timeout_ms: u64,
    /// Bound on each notification send
    pub notify_timeout_ms: u64,
    pub min_players_to_start: usize,
    pub placement_rule: PlacementRule,
    pub min_clues: usize,
    pub max_clues: usize,
    /// Tentative writes older than this are abandoned (in-memory store)
    pub pending_ttl_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_max_ms: 500,
            operation_timeout_ms: 5000,
            notify_timeout_ms: 2000,
            min_players_to_start: 2,
            placement_rule: PlacementRule::MatchSolution,
            min_clues: 26,
            max_clues: 34,
            pending_ttl_ms: 5000,
        }
    }
}

impl ClientConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sudoku-p2p").join("config.json"))
    }

    /// Defaults, overlaid by the config file if present, then the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let config = serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply `SUDOKU_P2P_*` overrides read through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
            raw.trim().parse().map_err(|_| ConfigError::Invalid {
                reason: format!("{name} is not a valid number: {raw:?}"),
            })
        }

        if let Some(raw) = var("SUDOKU_P2P_MAX_ATTEMPTS") {
            self.max_attempts = parse("SUDOKU_P2P_MAX_ATTEMPTS", &raw)?;
        }
        if let Some(raw) = var("SUDOKU_P2P_BACKOFF_MAX_MS") {
            self.backoff_max_ms = parse("SUDOKU_P2P_BACKOFF_MAX_MS", &raw)?;
        }
        if let Some(raw) = var("SUDOKU_P2P_OPERATION_TIMEOUT_MS") {
            self.operation_timeout_ms = parse("SUDOKU_P2P_OPERATION_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = var("SUDOKU_P2P_NOTIFY_TIMEOUT_MS") {
            self.notify_timeout_ms = parse("SUDOKU_P2P_NOTIFY_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = var("SUDOKU_P2P_MIN_PLAYERS") {
            self.min_players_to_start = parse("SUDOKU_P2P_MIN_PLAYERS", &raw)?;
        }
        if let Some(raw) = var("SUDOKU_P2P_PLACEMENT_RULE") {
            self.placement_rule = match raw.trim() {
                "constraints-only" => PlacementRule::ConstraintsOnly,
                "match-solution" => PlacementRule::MatchSolution,
                other => {
                    return Err(ConfigError::Invalid {
                        reason: format!("unknown placement rule {other:?}"),
                    })
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid { reason });
        if self.max_attempts == 0 {
            return invalid("max_attempts must be >= 1".to_string());
        }
        if self.operation_timeout_ms == 0 {
            return invalid("operation_timeout_ms must be >= 1".to_string());
        }
        if self.notify_timeout_ms == 0 {
            return invalid("notify_timeout_ms must be >= 1".to_string());
        }
        if self.min_players_to_start == 0 {
            return invalid("min_players_to_start must be >= 1".to_string());
        }
        if self.min_clues < MIN_SOLVABLE_CLUES {
            return invalid(format!(
                "min_clues must be >= {MIN_SOLVABLE_CLUES}, got {}",
                self.min_clues
            ));
        }
        if self.max_clues > sudoku_core::CELL_COUNT {
            return invalid(format!("max_clues must be <= 81, got {}", self.max_clues));
        }
        if self.min_clues > self.max_clues {
            return invalid(format!(
                "min_clues ({}) must not exceed max_clues ({})",
                self.min_clues, self.max_clues
            ));
        }
        Ok(())
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_millis(self.pending_ttl_ms)
    }

    pub fn generator(&self) -> GeneratorConfig {
        GeneratorConfig {
            min_clues: self.min_clues,
            max_clues: self.max_clues,
        }
    }
}
