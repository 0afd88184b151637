//! Analytics and maintenance commands

use std::str::FromStr;

use chrono::{Duration, Utc};
use colored::Colorize;

use crate::interfaces::cli::CliError;
use crate::runtime::AppContext;
use crate::storage::{DateRange, Dimension};
use crate::utils::time_parser::parse_day;

pub async fn show_analytics(
    ctx: &AppContext,
    short_code: &str,
    from: Option<String>,
    to: Option<String>,
    dimension: &str,
) -> Result<(), CliError> {
    let dimension = Dimension::from_str(dimension).map_err(|_| {
        CliError::ParseError(format!(
            "Unknown dimension '{}', expected geo, device, referrer or outcome",
            dimension
        ))
    })?;

    let today = Utc::now().date_naive();
    let end = match to {
        Some(to) => parse_day(&to)?,
        None => today,
    };
    let start = match from {
        Some(from) => parse_day(&from)?,
        None => end - Duration::days(6),
    };
    let range = DateRange::new(start, end)?;

    let rollups = ctx
        .analytics_service
        .get_analytics(short_code, range, dimension)
        .await?;

    println!(
        "{} {} by {} ({} .. {})",
        "Analytics for".bold(),
        short_code.cyan(),
        dimension.to_string().magenta(),
        start,
        end
    );
    if rollups.is_empty() {
        println!("  {}", "No clicks recorded in this range".yellow());
        return Ok(());
    }
    for rollup in rollups {
        println!("  {}  total {}", rollup.bucket.to_string().bold(), rollup.total);
        for (value, count) in &rollup.counts {
            println!("    {:<32} {}", value, count);
        }
    }
    Ok(())
}

pub async fn rebuild_rollups(ctx: &AppContext) -> Result<(), CliError> {
    println!("{}", "Rebuilding rollups from the event log...".yellow());
    let report = ctx.analytics_service.rebuild().await?;
    match report.window_start {
        Some(day) => println!("  window: {} onwards, older rollups kept", day),
        None => println!("  window: event log is empty, rollups kept"),
    }
    println!(
        "{} Replayed {} events in {} pages, {} rollup deltas, {} links reconciled",
        "✓".bold().green(),
        report.events_scanned,
        report.pages,
        report.rollup_rows,
        report.links_reconciled
    );
    Ok(())
}

pub async fn show_stats(ctx: &AppContext) -> Result<(), CliError> {
    let links = ctx.links.count().await?;
    let events = ctx.events.event_count().await?;
    let pipeline = ctx.pipeline.stats();
    let cache = ctx.cache.stats();

    println!("{} {}", "Backend:".bold(), ctx.backend_name.cyan());
    println!("  links:         {}", links);
    println!("  click events:  {}", events);
    println!(
        "  pipeline:      enqueued={} written={} dropped={} dead_lettered={} lost={}",
        pipeline.enqueued,
        pipeline.written,
        pipeline.dropped,
        pipeline.dead_lettered,
        pipeline.lost
    );
    println!(
        "  cache:         hits={} tombstones={} misses={}",
        cache.hits, cache.tombstone_hits, cache.misses
    );
    Ok(())
}
