//! Link management commands

use chrono::Utc;
use colored::Colorize;

use crate::analytics::RequestContext;
use crate::interfaces::cli::CliError;
use crate::runtime::AppContext;
use crate::services::{CreateLinkRequest, Resolution};
use crate::storage::{Link, LinkUpdate};
use crate::utils::time_parser::parse_expire_time;

fn print_link(link: &Link) {
    let status = if !link.active {
        "inactive".red()
    } else if link.is_expired_at(Utc::now()) {
        "expired".yellow()
    } else {
        "active".green()
    };
    println!(
        "  {} -> {} [{}]",
        link.short_code.cyan(),
        link.original_url.blue().underline(),
        status
    );
    if let Some(expires_at) = link.expires_at {
        println!(
            "    expires: {}",
            expires_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
                .yellow()
        );
    }
    println!("    clicks:  {}", link.click_count);
}

pub async fn create_link(
    ctx: &AppContext,
    url: String,
    alias: Option<String>,
    expire: Option<String>,
    owner: Option<String>,
) -> Result<(), CliError> {
    let mut req = CreateLinkRequest::new(url);
    req.custom_alias = alias;
    req.owner_id = owner;
    if let Some(expire) = expire {
        req.expires_at = Some(parse_expire_time(&expire, Utc::now())?);
    }

    let generated = req.custom_alias.is_none();
    let link = ctx.link_service.create_link(req).await?;

    if generated {
        println!(
            "{} Generated random code: {}",
            "ℹ".bold().blue(),
            link.short_code.magenta()
        );
    }
    println!("{} Added short link:", "✓".bold().green());
    print_link(&link);
    Ok(())
}

/// 解析批量文件：每行 `URL` 或 `ALIAS URL`，忽略空行和 `#` 注释
pub fn parse_bulk_lines(content: &str) -> Vec<CreateLinkRequest> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((alias, url)) => CreateLinkRequest::new(url.trim()).with_alias(alias),
            None => CreateLinkRequest::new(line),
        })
        .collect()
}

pub async fn bulk_create(ctx: &AppContext, file_path: &str) -> Result<(), CliError> {
    let content = tokio::fs::read_to_string(file_path)
        .await
        .map_err(|e| CliError::CommandError(format!("Failed to read '{}': {}", file_path, e)))?;

    let requests = parse_bulk_lines(&content);
    let urls: Vec<String> = requests.iter().map(|r| r.original_url.clone()).collect();
    let results = ctx.link_service.bulk_create(requests).await;

    let mut failed = 0;
    for (i, (url, result)) in urls.iter().zip(&results).enumerate() {
        match result {
            Ok(link) => println!(
                "{} #{} {} -> {}",
                "✓".green(),
                i + 1,
                link.short_code.cyan(),
                url.blue()
            ),
            Err(e) => {
                failed += 1;
                println!("{} #{} {}: {}", "✗".red(), i + 1, url, e.format_simple().red());
            }
        }
    }
    println!(
        "{} {} created, {} failed",
        "Bulk create finished:".bold(),
        results.len() - failed,
        failed
    );
    Ok(())
}

pub async fn show_link(ctx: &AppContext, short_code: &str) -> Result<(), CliError> {
    let link = ctx.link_service.get_link(short_code).await?;
    print_link(&link);
    Ok(())
}

pub async fn update_link(
    ctx: &AppContext,
    short_code: &str,
    url: Option<String>,
    expire: Option<String>,
    no_expire: bool,
) -> Result<(), CliError> {
    let expires_at = match (expire, no_expire) {
        (_, true) => Some(None),
        (Some(expire), false) => Some(Some(parse_expire_time(&expire, Utc::now())?)),
        (None, false) => None,
    };
    let update = LinkUpdate {
        original_url: url,
        expires_at,
    };
    if update.is_empty() {
        return Err(CliError::ParseError(
            "Nothing to update, pass --url, --expire or --no-expire".to_string(),
        ));
    }

    let link = ctx.link_service.update_link(short_code, update).await?;
    println!("{} Updated short link:", "✓".bold().green());
    print_link(&link);
    Ok(())
}

pub async fn resolve_link(
    ctx: &AppContext,
    short_code: &str,
    user_agent: Option<String>,
    referrer: Option<String>,
    geo: Option<String>,
) -> Result<(), CliError> {
    let request = RequestContext {
        user_agent,
        referrer,
        geo,
    };
    match ctx.redirect_service.resolve(short_code, &request).await {
        Resolution::Redirect { target_url } => {
            println!(
                "{} {} -> {}",
                "→".bold().green(),
                short_code.cyan(),
                target_url.blue().underline()
            );
            Ok(())
        }
        Resolution::NotFound => Err(CliError::CommandError(format!(
            "Short code '{}' not found",
            short_code
        ))),
    }
}

pub async fn deactivate_link(ctx: &AppContext, short_code: &str) -> Result<(), CliError> {
    ctx.link_service.deactivate_link(short_code).await?;
    println!(
        "{} Deactivated short link: {}",
        "✓".bold().green(),
        short_code.cyan()
    );
    Ok(())
}

pub async fn sweep_expired(ctx: &AppContext) -> Result<(), CliError> {
    let count = ctx.link_service.sweep_expired(Utc::now()).await?;
    println!(
        "{} Deactivated {} expired links",
        "✓".bold().green(),
        count.to_string().yellow()
    );
    Ok(())
}
