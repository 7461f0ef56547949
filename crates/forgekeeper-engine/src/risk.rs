//! Composite risk scoring over anomaly indicators.
//!
//! Detection lives elsewhere; this aggregator only folds externally
//! supplied indicators into a 0-100 score inside a sliding window. At
//! or above the threshold it prepares a recovery session, which stays
//! parked in `Requested` until a human approves. The score never
//! executes a restore on its own.

use std::sync::Mutex;

use chrono::Utc;
use tracing::{info, warn};

use forgekeeper_core::{
    Indicator, RiskAssessment, SnapshotId, VerificationReport, AUTO_RECOVERY_SCORE,
};

use crate::alert::{Alert, AlertSeverity, AlertSink};
use crate::recovery::orchestrator::RecoveryOrchestrator;

/// Sliding-window indicator aggregator.
pub struct RiskAggregator {
    window: chrono::Duration,
    indicators: Mutex<Vec<Indicator>>,
}

impl RiskAggregator {
    /// Create an aggregator that scores indicators observed within
    /// `window` of now
    #[must_use]
    pub const fn new(window: chrono::Duration) -> Self {
        Self {
            window,
            indicators: Mutex::new(Vec::new()),
        }
    }

    /// Feed one indicator from the detection layer
    pub fn ingest(&self, indicator: Indicator) {
        info!(
            name = %indicator.name,
            severity = ?indicator.severity,
            "risk indicator ingested"
        );
        if let Ok(mut indicators) = self.indicators.lock() {
            indicators.push(indicator);
        }
    }

    /// Compute the current assessment. Indicators outside the window
    /// are dropped; weights sum and clamp to 100.
    pub fn assess(&self) -> RiskAssessment {
        let now = Utc::now();
        let mut indicators = match self.indicators.lock() {
            Ok(i) => i,
            Err(poisoned) => poisoned.into_inner(),
        };
        indicators.retain(|i| now - i.observed_at <= self.window);

        let raw: u32 = indicators.iter().map(|i| u32::from(i.severity.weight())).sum();
        let score = raw.min(100) as u8;
        RiskAssessment {
            score,
            indicators: indicators.clone(),
            computed_at: now,
        }
    }

    /// Assess and, if the threshold is crossed, create an
    /// approval-gated recovery session targeting the newest recoverable
    /// snapshot from the latest sweep.
    ///
    /// Returns the parked session when one was created.
    pub async fn evaluate(
        &self,
        orchestrator: &RecoveryOrchestrator,
        target_env: &str,
        report: &VerificationReport,
        alerts: &dyn AlertSink,
    ) -> (RiskAssessment, Option<forgekeeper_core::RecoverySession>) {
        let assessment = self.assess();
        if !assessment.requests_recovery() {
            return (assessment, None);
        }

        let names: Vec<&str> = assessment
            .indicators
            .iter()
            .map(|i| i.name.as_str())
            .collect();
        warn!(
            score = assessment.score,
            threshold = AUTO_RECOVERY_SCORE,
            indicators = %names.join(","),
            "risk threshold crossed"
        );

        let snapshot: Option<SnapshotId> = report.newest_recoverable().cloned();
        let session = match snapshot {
            Some(snapshot) => Some(orchestrator.request_auto(target_env, snapshot)),
            None => {
                // Threshold crossed with nothing to restore from: the
                // worst of both worlds, alert at maximum severity.
                alerts
                    .raise(Alert::new(
                        AlertSeverity::Critical,
                        "risk-without-recoverable-copy",
                        format!(
                            "risk score {} but no recoverable snapshot exists",
                            assessment.score
                        ),
                    ))
                    .await;
                None
            }
        };
        if session.is_some() {
            alerts
                .raise(Alert::new(
                    AlertSeverity::Critical,
                    "auto-recovery-requested",
                    format!(
                        "risk score {} crossed {AUTO_RECOVERY_SCORE}; session awaits approval",
                        assessment.score
                    ),
                ))
                .await;
        }
        (assessment, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::testing::CapturingSink;
    use crate::recovery::orchestrator::{HealthProbe, Provisioner, RestoreTarget};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use forgekeeper_core::{
        IndicatorSeverity, Result, SessionState, TierMode, VerificationResult, VerifyStatus,
    };
    use forgekeeper_tiers::transport::memory::MemoryRepo;
    use std::sync::Arc;

    fn indicator(name: &str, severity: IndicatorSeverity, age: Duration) -> Indicator {
        Indicator {
            name: name.into(),
            severity,
            observed_at: Utc::now() - age,
            detail: None,
        }
    }

    struct Nop;

    #[async_trait]
    impl Provisioner for Nop {
        async fn provision(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn teardown(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl RestoreTarget for Nop {
        async fn capture_config(&self, _: &str) -> Result<String> {
            Ok("capture/1".into())
        }
        async fn restore_config(&self, _: &str, _: &[u8], _: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn restore_data(&self, _: &str, _: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn reconfigure(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn rollback_config(&self, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl HealthProbe for Nop {
        async fn check(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn orchestrator() -> RecoveryOrchestrator {
        RecoveryOrchestrator::new(
            Arc::new(MemoryRepo::new("offsite", "admin")),
            Arc::new(Nop),
            Arc::new(Nop),
            Arc::new(Nop),
            Arc::new(CapturingSink::default()),
        )
    }

    fn recoverable_report() -> VerificationReport {
        VerificationReport::new(
            vec![VerificationResult {
                tier: "offsite".into(),
                tier_mode: TierMode::AppendOnlyRemote,
                snapshot_id: Some(SnapshotId::new(
                    "forge",
                    Utc.with_ymd_and_hms(2025, 6, 1, 3, 30, 0).unwrap(),
                )),
                checked_at: Utc::now(),
                status: VerifyStatus::Ok,
                detail: None,
            }],
            Utc::now(),
        )
    }

    #[test]
    fn score_sums_and_clamps() {
        let aggregator = RiskAggregator::new(Duration::hours(1));
        for _ in 0..3 {
            aggregator.ingest(indicator(
                "mass-file-rename",
                IndicatorSeverity::High,
                Duration::minutes(1),
            ));
        }
        let assessment = aggregator.assess();
        assert_eq!(assessment.score, 100);
        assert!(assessment.requests_recovery());
    }

    #[test]
    fn stale_indicators_fall_out_of_the_window() {
        let aggregator = RiskAggregator::new(Duration::hours(1));
        aggregator.ingest(indicator(
            "old-signal",
            IndicatorSeverity::High,
            Duration::hours(2),
        ));
        aggregator.ingest(indicator(
            "fresh-signal",
            IndicatorSeverity::Low,
            Duration::minutes(5),
        ));
        let assessment = aggregator.assess();
        assert_eq!(assessment.score, 10);
        assert_eq!(assessment.indicators.len(), 1);
    }

    #[tokio::test]
    async fn threshold_creates_parked_session() {
        let aggregator = RiskAggregator::new(Duration::hours(1));
        aggregator.ingest(indicator("encryption-burst", IndicatorSeverity::High, Duration::minutes(1)));
        aggregator.ingest(indicator("snapshot-gap", IndicatorSeverity::Medium, Duration::minutes(1)));

        let orchestrator = orchestrator();
        let sink = CapturingSink::default();
        let (assessment, session) = aggregator
            .evaluate(&orchestrator, "production", &recoverable_report(), &sink)
            .await;
        assert!(assessment.score >= AUTO_RECOVERY_SCORE);

        let session = session.unwrap();
        assert_eq!(session.state, SessionState::Requested);
        assert!(session.auto_created);
        assert!(session.awaiting_approval());
        assert!(sink.taken().iter().any(|a| a.title == "auto-recovery-requested"));
    }

    #[tokio::test]
    async fn below_threshold_creates_nothing() {
        let aggregator = RiskAggregator::new(Duration::hours(1));
        aggregator.ingest(indicator("odd-login", IndicatorSeverity::Medium, Duration::minutes(1)));

        let orchestrator = orchestrator();
        let sink = CapturingSink::default();
        let (assessment, session) = aggregator
            .evaluate(&orchestrator, "production", &recoverable_report(), &sink)
            .await;
        assert!(assessment.score < AUTO_RECOVERY_SCORE);
        assert!(session.is_none());
        assert!(sink.taken().is_empty());
    }

    #[tokio::test]
    async fn threshold_without_recoverable_copy_alerts() {
        let aggregator = RiskAggregator::new(Duration::hours(1));
        for _ in 0..2 {
            aggregator.ingest(indicator("encryption-burst", IndicatorSeverity::High, Duration::minutes(1)));
        }

        let orchestrator = orchestrator();
        let sink = CapturingSink::default();
        let empty = VerificationReport::new(vec![], Utc::now());
        let (_, session) = aggregator
            .evaluate(&orchestrator, "production", &empty, &sink)
            .await;
        assert!(session.is_none());
        assert!(sink
            .taken()
            .iter()
            .any(|a| a.title == "risk-without-recoverable-copy"));
    }
}
