//! Application state for regravity-cloud

use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use crate::auth::rate_limit::RateLimiter;
use crate::config::Config;
use crate::db::{PgRepository, Repository};
use crate::email::emailjs::EmailJsTransport;
use crate::email::{EmailTransport, Notifier};
use crate::orders::OrderService;
use crate::verification::VerificationService;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Hosted relational store
    pub repo: Arc<dyn Repository>,
    /// Notification dispatcher (EmailJS in production)
    pub notifier: Notifier,
    pub orders: OrderService,
    pub verification: VerificationService,
    /// Rate limiter for public email-sending routes
    pub rate_limiter: RateLimiter,
    /// Secret shared with the identity provider
    pub jwt_secret: String,
    /// Background notification tasks, drained on shutdown
    pub tracker: TaskTracker,
}

impl AppState {
    /// Create a new AppState: connect, migrate, build the EmailJS transport
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        let transport = EmailJsTransport::new(config)?;
        Ok(Self::from_parts(
            Arc::new(PgRepository::new(pool)),
            Arc::new(transport),
            config,
        ))
    }

    /// Wire the services over explicit collaborators
    pub fn from_parts(
        repo: Arc<dyn Repository>,
        transport: Arc<dyn EmailTransport>,
        config: &Config,
    ) -> Self {
        let tracker = TaskTracker::new();
        let notifier = Notifier::new(transport, config);
        Self {
            orders: OrderService::new(repo.clone(), notifier.clone(), tracker.clone()),
            verification: VerificationService::new(notifier.clone()),
            repo,
            notifier,
            rate_limiter: RateLimiter::new(),
            jwt_secret: config.jwt_secret.clone(),
            tracker,
        }
    }
}
