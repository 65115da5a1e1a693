use std::fs;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

mod models;
mod repositories;
pub mod services;
pub mod settings;

#[cfg(test)]
mod testing;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Send every due reminder once, then exit.
    Sweep,
    /// Print a new bearer token for a user.
    IssueToken {
        #[arg(long)]
        user_id: i32,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    init_logging(&args.log4rs)?;
    let settings = settings::Settings::new(&args.config).context("Could not load config file.")?;

    let conn = PgPoolOptions::new()
        .max_connections(settings.postgres.max_connections)
        .connect(&settings.postgres.url)
        .await
        .context("Could not connect to database.")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            log::info!("Starting bill reminder service.");
            services::start_services(conn, settings).await?;
        }
        Command::Sweep => {
            let summary = services::run_sweep_once(conn, &settings).await?;
            log::info!("Sweep finished, reminded {} bills.", summary.count);
        }
        Command::IssueToken { user_id } => {
            let token = repositories::users::UserRepository::new(conn)
                .issue_token(user_id)
                .await?;
            println!("{}", token);
        }
    }

    Ok(())
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => Ok(()),
        Err(e) => {
            eprintln!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
