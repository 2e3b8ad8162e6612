use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{repo::UserRepo, services::seed_admin};
use crate::config::AppConfig;
use crate::db::PgStore;
use crate::orders::repo::OrderRepo;
use crate::payment::gateway::{PaymentGateway, RazorpayClient};
use crate::products::repo::ProductRepo;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub products: Arc<dyn ProductRepo>,
    pub orders: Arc<dyn OrderRepo>,
    /// `None` when no gateway credentials are configured.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = Arc::new(PgStore::connect(&config.database_url).await?);
        store.migrate().await?;

        let gateway = RazorpayClient::from_config(&config.payment)?
            .map(|client| Arc::new(client) as Arc<dyn PaymentGateway>);
        if config.payment.is_configured() {
            info!("payment gateway enabled");
        } else {
            warn!("RAZORPAY_KEY_ID / RAZORPAY_KEY_SECRET not set; prepaid orders are disabled");
        }

        if let Some(seed) = &config.admin {
            seed_admin(store.as_ref(), seed).await?;
        }

        Ok(Self::from_parts(config, store.clone(), store.clone(), store, gateway))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        products: Arc<dyn ProductRepo>,
        orders: Arc<dyn OrderRepo>,
        gateway: Option<Arc<dyn PaymentGateway>>,
    ) -> Self {
        Self {
            config,
            users,
            products,
            orders,
            gateway,
        }
    }
}
