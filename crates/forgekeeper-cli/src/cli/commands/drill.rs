//! `fkeeper drill` - rehearse a restore into a throwaway target.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use forgekeeper::{DrillRunner, FkError, RecoverySession};

use super::restore::print_session_pretty;
use super::Context;
use crate::cli::args::DrillArgs;
use crate::output::{render_structured, OutputFormat};

#[derive(Serialize)]
struct DrillReport {
    passed: bool,
    session: RecoverySession,
    #[serde(skip_serializing_if = "Option::is_none")]
    teardown_failure: Option<String>,
}

pub async fn execute(ctx: Context, args: DrillArgs) -> Result<()> {
    let spec = ctx.restore_tier(args.from_tier.as_deref())?;
    let prefix = args
        .target_prefix
        .clone()
        .unwrap_or_else(|| ctx.config.drill.target_prefix.clone());

    let verifier = ctx.verifier().await?;
    let report = verifier.verify_all().await;

    let orchestrator = ctx.orchestrator(spec).await?;
    let runner = DrillRunner::new(&orchestrator, prefix);
    let outcome = runner.run(&report).await?;

    let drill = DrillReport {
        passed: outcome.passed,
        session: outcome.session,
        teardown_failure: outcome.teardown_failure,
    };

    match ctx.output {
        OutputFormat::Pretty if !ctx.quiet => print_drill_pretty(&drill),
        OutputFormat::Pretty => {}
        format => println!("{}", render_structured(format, &drill)?),
    }

    if drill.passed {
        Ok(())
    } else {
        Err(FkError::RecoveryStep {
            state: drill.session.state.to_string(),
            reason: drill
                .session
                .failure
                .clone()
                .unwrap_or_else(|| "drill did not complete".into()),
        }
        .into())
    }
}

fn print_drill_pretty(drill: &DrillReport) {
    print_session_pretty(&drill.session, None);
    println!();
    if drill.passed {
        println!("{}", "Drill passed: the backups restore.".green().bold());
    } else {
        println!("{}", "Drill failed.".red().bold());
    }
    if let Some(failure) = &drill.teardown_failure {
        println!(
            "  {} drill target survived teardown: {failure}",
            "!".yellow()
        );
    }
}
