use call_status::url_resolver::resolver_from_config;
use call_status::{render_json, CallStatusService, Collaborators, Enriched, PgCallStore, ServiceConfig};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "call-status", about = "Inspect onboarding call status for a user")]
struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify the user's latest call and store a new recheck anchor when due
    Check {
        #[arg(long)]
        user_id: String,
    },
    /// List the user's audio clips with public URLs
    Audio {
        #[arg(long)]
        user_id: String,
        /// Fail instead of printing a partial listing when a URL lookup fails
        #[arg(long)]
        strict: bool,
    },
    /// List the user's photos with public URLs
    Photos {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        strict: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut config = ServiceConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    info!("Connecting to database: {}", redact(&config.database_url));

    let store = PgCallStore::connect(&config.database_url, config.max_connections)
        .await
        .map_err(|e| {
            error!("Failed to connect to database. Make sure PostgreSQL is running:");
            error!("  Check connection string: {}", redact(&config.database_url));
            Box::new(e) as Box<dyn std::error::Error>
        })?;

    let resolver = resolver_from_config(&config)?;
    let service = CallStatusService::new(Collaborators::from_store(Arc::new(store), resolver));

    match cli.command {
        Command::Check { user_id } => {
            let report = service.check_call_status(&user_id, Utc::now()).await?;
            println!("{}", render_json(&report)?);
        }
        Command::Audio { user_id, strict } => {
            let enriched = service.audio_artifacts(&user_id).await?;
            print_listing(enriched, strict)?;
        }
        Command::Photos { user_id, strict } => {
            let enriched = service.photos(&user_id).await?;
            print_listing(enriched, strict)?;
        }
    }

    Ok(())
}

fn print_listing<T: serde::Serialize>(enriched: Enriched<T>, strict: bool) -> call_status::Result<()> {
    if strict {
        let items = enriched.into_complete()?;
        println!("{}", render_json(&items)?);
        return Ok(());
    }

    println!("{}", render_json(&enriched.items)?);
    if let Some(err) = enriched.error {
        for message in err.messages() {
            warn!("  {}", message);
        }
    }
    Ok(())
}

/// Hide the password part of a connection string.
fn redact(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => database_url.to_string(),
    }
}
