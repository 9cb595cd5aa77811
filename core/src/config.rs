use serde::{Deserialize, Serialize};

pub const CANDIDATE_WINDOW_DAYS_ENV: &str = "SPOTTER_CANDIDATE_WINDOW_DAYS";
pub const CLARIFICATION_SIZE_ENV: &str = "SPOTTER_CLARIFICATION_SIZE";

/// Tunable constants of the resolution engine.
///
/// Defaults are the production policy; tests and the CLI may override
/// individual fields, missing fields in a config file fall back to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Trailing window handed to the candidate provider
    pub candidate_window_days: i64,
    /// Days after which recency contributes nothing
    pub recency_horizon_days: i64,
    pub recency_max: f64,
    pub same_chat_bonus: f64,
    pub missing_outcome_bonus: f64,
    pub target_match_max: f64,
    pub negation_penalty: f64,
    /// Top scores strictly below this are ignored outright
    pub confidence_floor: f64,
    /// A lone candidate must score strictly above this to resolve
    pub single_candidate_min: f64,
    /// Auto-resolve needs a top score strictly above this...
    pub auto_resolve_min: f64,
    /// ...and a gap to the runner-up strictly above this
    pub clarification_gap: f64,
    /// Clarifications need a top score strictly above this
    pub clarification_min: f64,
    pub clarification_size: usize,
    /// Outcome text is truncated to this many characters
    pub outcome_text_limit: usize,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            candidate_window_days: 60,
            recency_horizon_days: 60,
            recency_max: 100.0,
            same_chat_bonus: 50.0,
            missing_outcome_bonus: 30.0,
            target_match_max: 100.0,
            negation_penalty: -1000.0,
            confidence_floor: 50.0,
            single_candidate_min: 50.0,
            auto_resolve_min: 70.0,
            clarification_gap: 20.0,
            clarification_min: 50.0,
            clarification_size: 3,
            outcome_text_limit: 200,
        }
    }
}

impl ResolutionConfig {
    /// Defaults overlaid with the supported environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup. Unparsable or out-of-range
    /// values are logged and ignored.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(CANDIDATE_WINDOW_DAYS_ENV) {
            match raw.trim().parse::<i64>() {
                Ok(days) if days > 0 => self.candidate_window_days = days,
                _ => tracing::warn!(
                    variable = CANDIDATE_WINDOW_DAYS_ENV,
                    value = %raw,
                    "ignoring invalid candidate window"
                ),
            }
        }
        if let Some(raw) = lookup(CLARIFICATION_SIZE_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => self.clarification_size = size,
                _ => tracing::warn!(
                    variable = CLARIFICATION_SIZE_ENV,
                    value = %raw,
                    "ignoring invalid clarification size"
                ),
            }
        }
        self
    }

    /// Range checks for configs loaded whole (e.g. from a file).
    pub fn validate(&self) -> Result<(), String> {
        if self.candidate_window_days <= 0 {
            return Err(format!(
                "candidate_window_days must be positive, got {}",
                self.candidate_window_days
            ));
        }
        if self.recency_horizon_days <= 0 {
            return Err(format!(
                "recency_horizon_days must be positive, got {}",
                self.recency_horizon_days
            ));
        }
        if self.clarification_size == 0 {
            return Err("clarification_size must be at least 1".to_string());
        }
        Ok(())
    }
}
