use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use boutiq_agent::llm::AnthropicClient;
use boutiq_agent::{AssistantClient, MessagePipeline, OrderWriter};
use boutiq_core::config::{AppConfig, ConfigError, LoadOptions};
use boutiq_db::repositories::{
    SqlCustomerRepository, SqlMerchantRepository, SqlMessageUsageRepository, SqlOrderRepository,
    SqlProductRepository, SqlSessionRepository,
};
use boutiq_db::{connect_with_settings, migrations, DbPool};
use boutiq_whatsapp::gateway::MessagingGateway;
use boutiq_whatsapp::notify::OrderNotifier;
use boutiq_whatsapp::CloudApiClient;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub pipeline: Arc<MessagePipeline>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client initialization failed: {0}")]
    Llm(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let merchants = Arc::new(SqlMerchantRepository::new(db_pool.clone()));
    let customers = Arc::new(SqlCustomerRepository::new(db_pool.clone()));
    let sessions = Arc::new(SqlSessionRepository::new(db_pool.clone()));
    let products = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let orders = Arc::new(SqlOrderRepository::new(db_pool.clone()));
    let usage = Arc::new(SqlMessageUsageRepository::new(db_pool.clone()));

    let gateway: Arc<dyn MessagingGateway> =
        Arc::new(CloudApiClient::new(&config.whatsapp.api_base));
    let llm = AnthropicClient::from_config(&config.llm).map_err(BootstrapError::Llm)?;
    let assistant = AssistantClient::new(Arc::new(llm));
    let order_writer = OrderWriter::new(products.clone(), orders, customers.clone());
    let notifier = OrderNotifier::new(gateway.clone(), &config.notifications);

    let pipeline = Arc::new(MessagePipeline::new(
        merchants,
        customers,
        sessions,
        products,
        usage,
        assistant,
        order_writer,
        gateway,
        notifier,
    ));

    Ok(Application { config, db_pool, pipeline })
}
