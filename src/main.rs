use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod bucket;
mod cache;
mod chart;
mod config;
mod db;
mod error;
mod export;
mod metrics;
mod models;
mod render;
mod report;
mod server;
mod session;

#[derive(Parser)]
#[command(name = "bot-analytics")]
#[command(about = "Read-only analytics dashboard for the bot database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web dashboard (default)
    Serve,
    /// Load one snapshot and write a markdown report. The operator password
    /// is read from the first line of stdin.
    Report {
        /// Operator username, checked against USERNAME
        #[arg(long)]
        username: String,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bot_analytics=info,tower_http=info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    init_tracing();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = config::Config::from_env().context("invalid configuration")?;
            let pool = db::connect(&config.database_url, config.max_connections).await?;
            let source = Arc::new(db::PgSource::new(pool));
            let state = Arc::new(server::AppStateInner::new(&config, source));
            server::serve(&config, state).await?;
        }
        Commands::Report { username, out } => {
            let config = config::Config::from_env().context("invalid configuration")?;
            let submitted = config::Credentials {
                username,
                password: read_password()?,
            };
            session::authorize(&submitted, &config.credentials)?;

            let pool = db::connect(&config.database_url, 1).await?;
            let snapshot = db::fetch_snapshot(&pool).await?;
            let report = report::build_report(&metrics::Dashboard::compute(&snapshot));

            match out {
                Some(path) => {
                    std::fs::write(&path, report)?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{report}"),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_requires_an_operator_username() {
        assert!(Cli::try_parse_from(["bot-analytics", "report"]).is_err());

        let cli = Cli::try_parse_from(["bot-analytics", "report", "--username", "operator"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Report { ref username, out: None }) if username == "operator"
        ));
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["bot-analytics"]).unwrap();
        assert!(cli.command.is_none());
    }
}
