use anyhow::{Context, Result};
use chrono::Utc;
use loyalink_crm::{CrmClient, PosterClient};
use loyalink_storage::{RegistrationStore, TokenCodec};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use loyalink_server::app;
use loyalink_server::bot::telegram::TelegramPoller;
use loyalink_server::bot::AdminBot;
use loyalink_server::config::ServerConfig;
use loyalink_server::registration::{EnrollmentWorkflow, RegistrationService};
use loyalink_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  loyalink-server [config.toml]              Start the HTTP server and admin bot");
    eprintln!("  loyalink-server issue-link <config.toml>   Print one fresh registration link");
    eprintln!("  loyalink-server migrate <config.toml>      Apply database migrations and exit");
    eprintln!();
    eprintln!("Without a config file, settings come from the environment (BASE_URL, POSTER_TOKEN, ...).");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("loyalink=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("issue-link") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("issue-link requires <config.toml> argument")
            })?;
            run_issue_link(config_path).await
        }
        Some("migrate") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("migrate requires <config.toml> argument")
            })?;
            run_migrate(config_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        Some(config_path) => run_server(ServerConfig::load(config_path)?).await,
        None => run_server(ServerConfig::from_env()?).await,
    }
}

async fn open_store(config: &ServerConfig) -> Result<Arc<RegistrationStore>> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create data dir '{}'", config.data_dir))?;
    let store = RegistrationStore::new(&config.database_url()).await?;
    Ok(Arc::new(store))
}

/// An explicit key wins; otherwise the key file under `data_dir` is used.
fn load_codec(config: &ServerConfig) -> Result<Arc<TokenCodec>> {
    let codec = match config.security.encryption_key.as_deref() {
        Some(secret) => {
            TokenCodec::from_secret(secret).context("Invalid encryption key (ENCRYPTION_KEY)")?
        }
        None => TokenCodec::load_or_create(Path::new(&config.data_dir))
            .context("Failed to load encryption key file")?,
    };
    Ok(Arc::new(codec))
}

async fn run_migrate(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    open_store(&config).await?;
    tracing::info!("Migrations applied");
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run_issue_link(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = open_store(&config).await?;
    let codec = load_codec(&config)?;
    let service = RegistrationService::new(store, codec);
    let link = service.issue_link(&config.base_url).await?;
    println!("{link}");
    Ok(())
}

async fn run_server(config: ServerConfig) -> Result<()> {
    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        database = %loyalink_storage::store::redact_db_url(&config.database_url()),
        locale = %config.locale,
        "loyalink-server starting"
    );

    let store = open_store(&config).await?;
    let codec = load_codec(&config)?;
    let crm: Arc<dyn CrmClient> = Arc::new(
        PosterClient::new(config.crm.poster_config()).context("Failed to build CRM client")?,
    );

    let registration = Arc::new(RegistrationService::new(store.clone(), codec));
    let workflow = Arc::new(EnrollmentWorkflow::new(
        store,
        crm,
        config.crm.bonus_amount,
        config.crm.default_sex,
    ));

    let config = Arc::new(config);
    let state = AppState {
        registration: registration.clone(),
        workflow,
        start_time: Utc::now(),
        config: config.clone(),
    };

    // Admin bot
    let bot_handle = match config.bot.token.as_deref().filter(|_| config.bot.enabled()) {
        Some(token) => {
            if config.bot.admins.is_empty() {
                tracing::warn!("No bot admins configured; every bot command will be refused");
            }
            let bot = Arc::new(AdminBot::new(
                registration,
                config.base_url.clone(),
                config.bot.admins.iter().copied(),
                &config.locale,
            ));
            let poller = Arc::new(
                TelegramPoller::new(
                    &config.bot.api_url,
                    token,
                    config.bot.poll_timeout_secs,
                    bot,
                )
                .context("Failed to build Telegram client")?,
            );
            Some(tokio::spawn(poller.run()))
        }
        None => {
            tracing::warn!("No bot token configured; admin bot disabled");
            None
        }
    };

    // HTTP server
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .with_context(|| format!("Failed to bind {http_addr}"))?;
    tracing::info!(http = %http_addr, "Server started");

    let result = axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
        })
        .await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "HTTP server error");
    }

    if let Some(h) = bot_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    result.context("HTTP server failed")
}
