//! `fkeeper status` - tier inventory at a glance.
//!
//! Status is the cheap view: reachability and archive listings only.
//! It makes no recoverability claim; that takes a `verify` sweep with
//! checksum recomputation and the enforcement probe.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use super::Context;
use crate::output::{render_structured, OutputFormat};

#[derive(Serialize)]
struct TierStatus {
    tier: String,
    mode: String,
    reachable: bool,
    archives: u64,
    total_bytes: u64,
    newest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Tier")]
    tier: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Reachable")]
    reachable: String,
    #[tabled(rename = "Archives")]
    archives: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Newest snapshot")]
    newest: String,
}

pub async fn execute(ctx: Context) -> Result<()> {
    let mut statuses = Vec::with_capacity(ctx.config.tiers.len());
    for spec in &ctx.config.tiers {
        statuses.push(tier_status(&ctx, spec).await);
    }

    match ctx.output {
        OutputFormat::Pretty if !ctx.quiet => print_status_pretty(&statuses),
        OutputFormat::Pretty => {}
        format => println!("{}", render_structured(format, &statuses)?),
    }
    Ok(())
}

async fn tier_status(ctx: &Context, spec: &forgekeeper::TierSpec) -> TierStatus {
    let unreachable = |error: String| TierStatus {
        tier: spec.name.clone(),
        mode: spec.mode.to_string(),
        reachable: false,
        archives: 0,
        total_bytes: 0,
        newest: None,
        error: Some(error),
    };

    let transport = match ctx.transport(spec).await {
        Ok(t) => t,
        Err(e) => return unreachable(e.to_string()),
    };
    let info = match transport.ping().await {
        Ok(info) => info,
        Err(e) => return unreachable(e.to_string()),
    };
    let newest = match transport.list_archives(Some(1)).await {
        Ok(entries) => entries.last().map(|e| e.id.to_string()),
        Err(e) => return unreachable(e.to_string()),
    };

    TierStatus {
        tier: spec.name.clone(),
        mode: spec.mode.to_string(),
        reachable: true,
        archives: info.archive_count,
        total_bytes: info.total_bytes,
        newest,
        error: None,
    }
}

fn print_status_pretty(statuses: &[TierStatus]) {
    let rows: Vec<StatusRow> = statuses
        .iter()
        .map(|s| StatusRow {
            tier: s.tier.clone(),
            mode: s.mode.clone(),
            reachable: if s.reachable {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            },
            archives: s.archives.to_string(),
            size: human_bytes(s.total_bytes),
            newest: s.newest.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");

    for status in statuses {
        if let Some(error) = &status.error {
            println!("  {} {}: {error}", "!".red(), status.tier);
        }
    }
    println!();
    println!(
        "{}",
        "Run `fkeeper verify` for checksums and the enforcement probe.".dimmed()
    );
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
