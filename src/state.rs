use std::sync::Arc;

use crate::config::{AppConfig, Backend};
use crate::mail::{LogMailer, Mailer, SesMailer};
use crate::memory::MemoryStore;
use crate::store::{PgStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Connects the configured backend, runs migrations and seeds defaults.
    /// Any failure here aborts startup.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let store: Arc<dyn Store> = match config.backend {
            Backend::Postgres => {
                let pg = PgStore::connect(&config.database).await?;
                pg.migrate().await?;
                Arc::new(pg)
            }
            Backend::Memory => {
                tracing::warn!("running on the in-memory backend; data is lost on restart");
                Arc::new(MemoryStore::new(&config.database))
            }
        };
        store.ping().await?;

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => Arc::new(SesMailer::new(mail).await?),
            None => {
                tracing::warn!("MAIL_FROM/SES_REGION not set; outgoing mail will only be logged");
                Arc::new(LogMailer)
            }
        };

        let state = Self::from_parts(store, config, mailer);
        crate::db::seed_defaults(&state).await?;
        Ok(state)
    }

    pub fn from_parts(store: Arc<dyn Store>, config: Arc<AppConfig>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            config,
            mailer,
        }
    }

    #[cfg(test)]
    pub async fn fake() -> Self {
        Self::fake_with(
            AppConfig::for_tests(),
            Arc::new(crate::mail::testing::RecordingMailer::default()),
        )
        .await
    }

    /// Memory backend, seeded, with the given config and mailer.
    #[cfg(test)]
    pub async fn fake_with(config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        let store = Arc::new(MemoryStore::new(&config.database));
        let state = Self::from_parts(store, Arc::new(config), mailer);
        crate::db::seed_defaults(&state).await.expect("seed memory store");
        state
    }
}
