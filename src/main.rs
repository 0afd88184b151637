use clap::Parser;
use tracing::{error, info};

use linkpulse::cli::{Cli, Commands};
use linkpulse::config::{CONFIG_FILE, StaticConfig, get_config, init_config_with};
use linkpulse::interfaces::cli::{run_cli_command, run_offline_command};
use linkpulse::runtime::{AppContext, listen_for_shutdown, perform_shutdown};
use linkpulse::system::init_logging;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Some(result) = run_offline_command(&cli.command) {
        if let Err(e) = result {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
        return;
    }

    init_config_with(StaticConfig::load_from(
        cli.config.as_deref().unwrap_or(CONFIG_FILE),
    ));
    let config = get_config();

    // 必须持有到进程结束，保证日志刷盘
    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    let ctx = match AppContext::build(&config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            eprintln!("Startup failed: {:#}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Run => {
            ctx.start_background_tasks(&config);
            info!("linkpulse running, press Ctrl+C to stop");
            listen_for_shutdown(&ctx).await;
        }
        command => {
            let result = run_cli_command(&ctx, command).await;
            perform_shutdown(&ctx).await;
            if let Err(e) = result {
                eprintln!("{}", e.format_colored());
                std::process::exit(1);
            }
        }
    }
}
