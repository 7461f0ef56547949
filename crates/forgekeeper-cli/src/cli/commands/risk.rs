//! `fkeeper risk` - score anomaly indicators against the recovery
//! threshold.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use serde::Serialize;

use forgekeeper::{
    FkError, Indicator, IndicatorSeverity, LogAlertSink, RecoverySession, RiskAggregator,
    RiskAssessment, AUTO_RECOVERY_SCORE,
};

use super::Context;
use crate::cli::args::RiskArgs;
use crate::output::{render_structured, OutputFormat};

#[derive(Serialize)]
struct RiskReport {
    assessment: RiskAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<RecoverySession>,
}

pub async fn execute(ctx: Context, args: RiskArgs) -> Result<()> {
    let aggregator = RiskAggregator::new(ctx.config.risk_window());
    for raw in &args.indicators {
        aggregator.ingest(parse_indicator(raw)?);
    }

    let report = if args.evaluate {
        let spec = ctx.restore_tier(None)?;
        let verifier = ctx.verifier().await?;
        let sweep = verifier.verify_all().await;
        let orchestrator = ctx.orchestrator(spec).await?;
        let alerts = LogAlertSink;
        let (assessment, session) = aggregator
            .evaluate(&orchestrator, &ctx.config.target_env, &sweep, &alerts)
            .await;
        RiskReport {
            assessment,
            session,
        }
    } else {
        RiskReport {
            assessment: aggregator.assess(),
            session: None,
        }
    };

    match ctx.output {
        OutputFormat::Pretty if !ctx.quiet => print_risk_pretty(&report),
        OutputFormat::Pretty => {}
        format => println!("{}", render_structured(format, &report)?),
    }
    Ok(())
}

/// Parse `name:severity[:detail]` into an indicator observed now.
fn parse_indicator(raw: &str) -> Result<Indicator> {
    let mut parts = raw.splitn(3, ':');
    let name = parts.next().unwrap_or_default();
    let severity = parts.next().unwrap_or_default();
    let detail = parts.next().map(ToString::to_string);
    if name.is_empty() || severity.is_empty() {
        return Err(
            FkError::Config(format!("indicator '{raw}' is not NAME:SEVERITY[:DETAIL]")).into(),
        );
    }
    let severity = match severity {
        "low" => IndicatorSeverity::Low,
        "medium" => IndicatorSeverity::Medium,
        "high" => IndicatorSeverity::High,
        other => {
            return Err(FkError::Config(format!(
                "unknown severity '{other}' (expected low, medium, or high)"
            ))
            .into())
        }
    };
    Ok(Indicator {
        name: name.to_string(),
        severity,
        observed_at: Utc::now(),
        detail,
    })
}

fn print_risk_pretty(report: &RiskReport) {
    let score = report.assessment.score;
    let rendered = if report.assessment.requests_recovery() {
        score.to_string().red().bold()
    } else {
        score.to_string().green()
    };
    println!(
        "{} {rendered} / 100 (recovery threshold {AUTO_RECOVERY_SCORE})",
        "Risk score:".bold()
    );
    for indicator in &report.assessment.indicators {
        let weight = indicator.severity.weight();
        match &indicator.detail {
            Some(detail) => println!("  +{weight:>2} {} ({detail})", indicator.name),
            None => println!("  +{weight:>2} {}", indicator.name),
        }
    }

    if let Some(session) = &report.session {
        println!();
        println!(
            "{} requested against snapshot {}; it will not run on its own.",
            "Recovery".red().bold(),
            session.snapshot
        );
        println!(
            "  Execute it with: fkeeper restore {} --confirm {}",
            session.snapshot, session.snapshot
        );
    }
}
