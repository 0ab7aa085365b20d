//! ReAdmit
//!
//! Main entry point: the API server, plus a few client commands that drive a
//! running server with a persisted session.

use std::path::PathBuf;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_actix_web::TracingLogger;

use readmit::api::{self, AppState};
use readmit::client::{ApiClient, FileSessionStorage, Store};
use readmit::config::{self, DEFAULT_JWT_SECRET};
use readmit::{db, error, telemetry};

#[derive(Parser)]
#[command(name = "readmit", about = "Hospital readmission risk service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    /// API root used by the client commands
    #[arg(long, global = true, env = "READMIT_API_URL", default_value = "http://localhost:5000/api")]
    api_url: String,
    /// Where the client commands keep their session
    #[arg(long, global = true, env = "READMIT_SESSION", default_value = ".readmit/session.json")]
    session: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server (default)
    Serve,
    Login {
        email: String,
        #[arg(long, env = "READMIT_PASSWORD")]
        password: String,
    },
    Logout,
    /// Check the stored token against the server
    Verify,
    /// List the hospital's patient records
    Patients,
    /// Weekly statistics
    Stats,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logger
    telemetry::init(cli.json_logs);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve().await,
        Commands::Login { email, password } => {
            let (client, mut store) = client_store(&cli.api_url, cli.session)?;
            store.login(&client, &email, &password).await?;
            if let Some(hospital) = &store.state().auth.hospital {
                println!("Logged in as {} ({})", hospital.name, hospital.email);
            }
            Ok(())
        }
        Commands::Logout => {
            let (_, mut store) = client_store(&cli.api_url, cli.session)?;
            store.logout();
            println!("Logged out");
            Ok(())
        }
        Commands::Verify => {
            let (client, mut store) = client_store(&cli.api_url, cli.session)?;
            let hospital = store.verify(&client).await?;
            println!("Token valid for {} ({})", hospital.name, hospital.id);
            Ok(())
        }
        Commands::Patients => {
            let (client, mut store) = client_store(&cli.api_url, cli.session)?;
            let records = store.load_patients(&client).await?;
            println!("{}", serde_json::to_string_pretty(records)?);
            Ok(())
        }
        Commands::Stats => {
            let (client, mut store) = client_store(&cli.api_url, cli.session)?;
            let stats = store.load_stats(&client).await?;
            println!("{}", serde_json::to_string_pretty(stats)?);
            Ok(())
        }
    }
}

fn client_store(api_url: &str, session: PathBuf) -> Result<(ApiClient, Store<FileSessionStorage>)> {
    let client = ApiClient::new(api_url)?;
    Ok((client, Store::new(FileSessionStorage::new(session))))
}

async fn serve() -> Result<()> {
    // Load configuration
    let config = config::load_config().context("Failed to load configuration")?;
    if config.is_production() && config.auth.jwt_secret == DEFAULT_JWT_SECRET {
        bail!("auth.jwt_secret must be set in production");
    }

    // Connect to database
    let database = db::Database::connect(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to database")?;

    // Run migrations
    database
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;

    // Create app state
    let app_state = web::Data::new(AppState::from_config(database, &config)?);
    error::expose_details(app_state.expose_details);

    let cors_origin = config.server.cors_origin.clone();
    info!(host = %config.server.host, port = config.server.port, "starting server");

    // Start HTTP server
    HttpServer::new(move || {
        let cors = if cors_origin == "*" {
            Cors::permissive()
        } else {
            Cors::default()
                .allowed_origin(&cors_origin)
                .allow_any_method()
                .allow_any_header()
        };

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(api::configure)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
