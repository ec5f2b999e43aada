use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::books::repo::{BookRepo, PgBookRepo};
use crate::config::AppConfig;
use crate::mail::{Mailer, SmtpMailer};
use crate::storage::{Storage, StorageClient};
use crate::users::repo::{PgUserRepo, UserRepo};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub books: Arc<dyn BookRepo>,
    pub mailer: Arc<dyn Mailer>,
    pub storage: Arc<dyn StorageClient>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let storage = Arc::new(Storage::new(&config.media).await?) as Arc<dyn StorageClient>;
        let mailer = Arc::new(SmtpMailer::new(&config.smtp)?) as Arc<dyn Mailer>;

        Ok(Self {
            users: Arc::new(PgUserRepo::new(db.clone())),
            books: Arc::new(PgBookRepo::new(db)),
            config,
            mailer,
            storage,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        books: Arc<dyn BookRepo>,
        mailer: Arc<dyn Mailer>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            config,
            users,
            books,
            mailer,
            storage,
        }
    }

    /// State backed by in-memory fakes, for tests that only need a router.
    #[cfg(test)]
    pub fn fake() -> Self {
        crate::testing::fake_state().0
    }
}
