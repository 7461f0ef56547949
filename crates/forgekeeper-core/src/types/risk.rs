use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite score at or above which a recovery session is created
/// automatically (still gated on human approval past `Requested`).
pub const AUTO_RECOVERY_SCORE: u8 = 70;

/// Severity of an anomaly indicator fed in from the detection layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorSeverity {
    /// Informational signal
    Low,
    /// Suspicious but not conclusive
    Medium,
    /// Strong compromise signal
    High,
}

impl IndicatorSeverity {
    /// Contribution toward the composite 0-100 score
    #[must_use]
    pub const fn weight(self) -> u8 {
        match self {
            Self::Low => 10,
            Self::Medium => 25,
            Self::High => 50,
        }
    }
}

/// A single anomaly indicator from the external detection layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    /// Short machine name (e.g. "mass-file-rename")
    pub name: String,

    /// Severity assigned by the detector
    pub severity: IndicatorSeverity,

    /// When the indicator was observed
    pub observed_at: DateTime<Utc>,

    /// Free-form evidence
    #[serde(default)]
    pub detail: Option<String>,
}

/// Composite threat assessment consumed as a recovery trigger input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Composite score, clamped to 0-100
    pub score: u8,

    /// Indicators that contributed
    pub indicators: Vec<Indicator>,

    /// When the score was computed
    pub computed_at: DateTime<Utc>,
}

impl RiskAssessment {
    /// True when the score crosses the automatic-recovery threshold
    #[must_use]
    pub const fn requests_recovery(&self) -> bool {
        self.score >= AUTO_RECOVERY_SCORE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_inclusive() {
        let assessment = RiskAssessment {
            score: AUTO_RECOVERY_SCORE,
            indicators: vec![],
            computed_at: Utc::now(),
        };
        assert!(assessment.requests_recovery());

        let below = RiskAssessment {
            score: AUTO_RECOVERY_SCORE - 1,
            indicators: vec![],
            computed_at: Utc::now(),
        };
        assert!(!below.requests_recovery());
    }
}
