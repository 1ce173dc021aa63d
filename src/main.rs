use library_lending::{
    adapters::memory::{
        InMemoryBookCatalog, InMemoryEventStore, InMemoryLoanReadModel, InMemoryMemberRegistry,
        InMemoryNotificationService, InMemoryShelfRegistry,
    },
    adapters::postgres::{
        PostgresBookCatalog, PostgresEventStore, PostgresLoanReadModel, PostgresMemberRegistry,
        PostgresShelfRegistry,
    },
    api::{handlers::AppState, router::create_router},
    application::{ServiceDependencies, member::BorrowLocks},
    config::{AppConfig, DatabaseConfig},
    domain::Policy,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// PostgreSQLのアダプターで依存関係を組み立てる（起動時にマイグレーションを実行）
async fn postgres_dependencies(
    database: &DatabaseConfig,
    policy: Policy,
) -> Result<ServiceDependencies, BoxError> {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(database.max_connections)
        .connect(&database.url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(ServiceDependencies {
        event_store: Arc::new(PostgresEventStore::new(pool.clone())),
        loan_read_model: Arc::new(PostgresLoanReadModel::new(pool.clone())),
        book_catalog: Arc::new(PostgresBookCatalog::new(pool.clone())),
        member_registry: Arc::new(PostgresMemberRegistry::new(pool.clone())),
        shelf_registry: Arc::new(PostgresShelfRegistry::new(pool)),
        notification_service: Arc::new(InMemoryNotificationService::new()),
        policy,
        borrow_locks: Arc::new(BorrowLocks::new()),
    })
}

fn in_memory_dependencies(policy: Policy) -> ServiceDependencies {
    ServiceDependencies {
        event_store: Arc::new(InMemoryEventStore::new()),
        loan_read_model: Arc::new(InMemoryLoanReadModel::new()),
        book_catalog: Arc::new(InMemoryBookCatalog::new()),
        member_registry: Arc::new(InMemoryMemberRegistry::new()),
        shelf_registry: Arc::new(InMemoryShelfRegistry::new()),
        notification_service: Arc::new(InMemoryNotificationService::new()),
        policy,
        borrow_locks: Arc::new(BorrowLocks::new()),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_lending=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    config.policy.validate()?;

    // Initialize adapters
    let service_deps = match &config.database {
        Some(database) => {
            tracing::info!("Using PostgreSQL adapters");
            postgres_dependencies(database, config.policy.clone()).await?
        }
        None => {
            tracing::warn!("No database configured; using in-memory adapters");
            in_memory_dependencies(config.policy.clone())
        }
    };

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;
    Ok(())
}
