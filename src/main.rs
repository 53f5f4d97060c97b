//! tally - engagement ledger service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally::{
    auth::JwtValidator,
    config::Args,
    db::MongoClient,
    ledger::EngagementLedger,
    projection::ProjectionReader,
    server,
    store::{
        IdeaStore, MemoryIdeaStore, MemoryUserStore, MongoIdeaStore, MongoUserStore, UserStore,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tally={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  tally - engagement ledger service");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Free view quota: {}", args.free_view_quota);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Wire stores against whichever backend is available
    let (users, ideas): (Arc<dyn UserStore>, Arc<dyn IdeaStore>) = match &mongo {
        Some(client) => (
            Arc::new(MongoUserStore::new(client.clone())),
            Arc::new(MongoIdeaStore::new(client.clone())),
        ),
        None => (
            Arc::new(MemoryUserStore::new()),
            Arc::new(MemoryIdeaStore::new()),
        ),
    };

    let ledger = Arc::new(EngagementLedger::new(
        Arc::clone(&users),
        Arc::clone(&ideas),
        args.free_view_quota,
    ));
    let reader = ProjectionReader::new(Arc::clone(&ideas));

    // JWT validator: verification only, issuance is the identity
    // provider's job
    let validator = if args.dev_mode {
        match args.jwt_secret.clone() {
            Some(secret) => JwtValidator::new(secret).unwrap_or_else(|e| {
                warn!("Ignoring unusable JWT_SECRET in dev mode: {}", e);
                JwtValidator::new_dev()
            }),
            None => JwtValidator::new_dev(),
        }
    } else {
        // validate() already guaranteed the secret is present and long enough
        match JwtValidator::new(args.jwt_secret.clone().unwrap_or_default()) {
            Ok(v) => v,
            Err(e) => {
                error!("JWT configuration error: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Create application state and run the server
    let state = Arc::new(server::AppState::new(args, validator, ledger, reader, mongo));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
