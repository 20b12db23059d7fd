//! Consensus round configuration from TOML (`[consensus]` section)
//!
//! ```toml
//! [consensus]
//! timeout_ms = 30000
//! convergence_step = 0.1
//! default_reputation = 0.8
//! ```

use conclave_domain::{ConfigIssue, ConfigIssueCode, RoundSettings};
use serde::{Deserialize, Serialize};

/// Raw consensus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConsensusConfig {
    /// Round deadline in milliseconds
    pub timeout_ms: u64,
    /// Convergence added per consensus-relevant event
    pub convergence_step: f64,
    /// Reputation assigned to every roster agent
    pub default_reputation: f64,
}

impl Default for FileConsensusConfig {
    fn default() -> Self {
        let settings = RoundSettings::default();
        Self {
            timeout_ms: settings.timeout_ms,
            convergence_step: settings.convergence_step,
            default_reputation: settings.default_reputation,
        }
    }
}

impl FileConsensusConfig {
    /// Convert to round settings, collecting issues.
    ///
    /// Out-of-range values are reported and replaced by their defaults.
    pub fn to_round_settings(&self) -> (RoundSettings, Vec<ConfigIssue>) {
        let defaults = RoundSettings::default();
        let mut settings = RoundSettings {
            timeout_ms: self.timeout_ms,
            convergence_step: self.convergence_step,
            default_reputation: self.default_reputation,
        };
        let mut issues = Vec::new();

        if self.timeout_ms == 0 {
            issues.push(out_of_range(
                "consensus.timeout_ms",
                self.timeout_ms.to_string(),
                "> 0",
            ));
            settings.timeout_ms = defaults.timeout_ms;
        }

        if !(self.convergence_step > 0.0 && self.convergence_step <= 1.0) {
            issues.push(out_of_range(
                "consensus.convergence_step",
                self.convergence_step.to_string(),
                "(0, 1]",
            ));
            settings.convergence_step = defaults.convergence_step;
        }

        if !(0.0..=1.0).contains(&self.default_reputation) {
            issues.push(out_of_range(
                "consensus.default_reputation",
                self.default_reputation.to_string(),
                "[0, 1]",
            ));
            settings.default_reputation = defaults.default_reputation;
        }

        (settings, issues)
    }
}

fn out_of_range(field: &str, value: String, range: &str) -> ConfigIssue {
    let message = format!("{field}: {value} is outside {range}, using the default");
    ConfigIssue::warning(
        ConfigIssueCode::OutOfRange {
            field: field.to_string(),
            value,
            range: range.to_string(),
        },
        message,
    )
}
