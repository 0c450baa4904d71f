use sipdesk::application::SipService;
use sipdesk::config::{Config, StoreBackend};
use sipdesk::domain::auth::{ApiKeyAuthenticator, ScopePermissionChecker};
use sipdesk::domain::participant::ParticipantRequestOptions;
use sipdesk::domain::sip_store::SipStore;
use sipdesk::infrastructure::persistence::InMemorySipStore;
use sipdesk::infrastructure::rpc::JsonRpcSipClient;
use sipdesk::interface::api::{build_router, init_metrics, SipApiState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "postgres")]
use sipdesk::infrastructure::persistence::{create_pool, run_migrations, PgSipStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--print-config") {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting sipdesk");

    let store = build_store(&config).await?;
    if store.is_none() {
        warn!("SIP store disabled, admin requests will fail");
    }

    let client = JsonRpcSipClient::new(&config.sip.rpc_url)?;
    info!("SIP RPC endpoint: {}", client.url());

    let service = SipService::new(store, Arc::new(client), Arc::new(ScopePermissionChecker))
        .with_participant_timeout(config.sip.participant_timeout());

    let authenticator = ApiKeyAuthenticator::new(config.auth.api_keys.iter().cloned());
    if authenticator.is_empty() {
        warn!("No API keys configured, every SIP request will be rejected");
    } else {
        info!("Loaded {} API keys", authenticator.len());
    }

    // Initialize metrics exporter
    info!("Initializing Prometheus metrics exporter");
    let prometheus_handle = init_metrics()?;

    let state = SipApiState {
        service: Arc::new(service),
        authenticator: Arc::new(authenticator),
        participant_options: ParticipantRequestOptions {
            ws_url: config.sip.ws_url.clone(),
            ..Default::default()
        },
    };
    let app = build_router(state, prometheus_handle);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!("REST API server listening on {}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn build_store(config: &Config) -> anyhow::Result<Option<Arc<dyn SipStore>>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory SIP store");
            let store: Arc<dyn SipStore> = Arc::new(InMemorySipStore::new());
            Ok(Some(store))
        }
        StoreBackend::Disabled => Ok(None),
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres => {
            info!("Initializing database connection...");
            let pool = create_pool(&config.store.database).await?;
            run_migrations(&pool).await?;
            let store: Arc<dyn SipStore> = Arc::new(PgSipStore::new(pool));
            Ok(Some(store))
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres => {
            anyhow::bail!("store.backend = \"postgres\" requires the postgres feature")
        }
    }
}
