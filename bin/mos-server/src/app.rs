//! Composition root: datastores, unit of work, repositories, services and
//! the adapters between modules, all chosen from configuration.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::{Client, Database};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use mos_acl::{UserOwnerDirectory, UserServiceProvisioner};
use mos_auth::subscriber::USER_DELETED;
use mos_auth::{
    Argon2Config, AuthService, CredentialRepository, MemoryCredentialRepository,
    MemorySessionRepository, MongoCredentialRepository, MongoSessionRepository, PasswordPolicy,
    PasswordService, RevokeOnUserDeleted, SessionRepository, SqlCredentialRepository,
    SqlSessionRepository,
};
use mos_config::{AppConfig, PasswordPolicyLevel, SqlConfig, StoreBackend};
use mos_core::{
    CompositeUnitOfWork, DocumentUnitOfWork, EventEnvelope, EventHandler, InProcessEventBus,
    SqlUnitOfWork, UnitOfWork,
};
use mos_product::{
    MemoryProductRepository, MongoProductRepository, ProductRepository, ProductService,
    SqlProductRepository,
};
use mos_user::{MemoryUserRepository, MongoUserRepository, SqlUserRepository, UserRepository, UserService};

use crate::api::AppState;

/// Connected datastores plus the one unit of work every repository shares.
struct Backends {
    sql: Option<SqlitePool>,
    document: Option<Database>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl Backends {
    async fn connect(config: &AppConfig) -> Result<Self> {
        let mut composite = CompositeUnitOfWork::default();

        let sql = if config.sql.is_enabled() && config.storage.uses(StoreBackend::Sql) {
            ensure_sqlite_dir(&config.sql.url)?;
            let pool = SqlitePoolOptions::new()
                .max_connections(config.sql.max_connections)
                .connect_with(sqlite_options(&config.sql)?)
                .await
                .with_context(|| format!("connecting to {}", config.sql.url))?;
            info!(url = %config.sql.url, "Connected to SQLite");
            composite = composite.with_relational(Arc::new(SqlUnitOfWork::new(pool.clone())));
            Some(pool)
        } else {
            None
        };

        let document =
            if config.mongodb.is_enabled() && config.storage.uses(StoreBackend::Document) {
                let client = Client::with_uri_str(&config.mongodb.uri)
                    .await
                    .context("connecting to MongoDB")?;
                info!(database = %config.mongodb.database, "Connected to MongoDB");
                let db = client.database(&config.mongodb.database);
                composite = composite.with_document(Arc::new(DocumentUnitOfWork::new(client)));
                Some(db)
            } else {
                None
            };

        if composite.is_empty() {
            debug!("No transactional backend in use");
        }

        Ok(Self {
            sql,
            document,
            unit_of_work: Arc::new(composite),
        })
    }

    fn sql(&self) -> Result<SqlitePool> {
        self.sql.clone().context("relational backend is not configured")
    }

    fn document(&self) -> Result<&Database> {
        self.document
            .as_ref()
            .context("document backend is not configured")
    }

    fn uow(&self) -> Arc<dyn UnitOfWork> {
        self.unit_of_work.clone()
    }

    async fn users(&self, backend: StoreBackend) -> Result<Arc<dyn UserRepository>> {
        Ok(match backend {
            StoreBackend::Sql => {
                let repo = SqlUserRepository::new(self.sql()?, self.uow());
                repo.init_schema().await?;
                Arc::new(repo)
            }
            StoreBackend::Document => {
                let repo = MongoUserRepository::new(self.document()?, self.uow());
                repo.init_indexes().await?;
                Arc::new(repo)
            }
            StoreBackend::Memory => Arc::new(MemoryUserRepository::with_unit_of_work(self.uow())),
        })
    }

    async fn products(&self, backend: StoreBackend) -> Result<Arc<dyn ProductRepository>> {
        Ok(match backend {
            StoreBackend::Sql => {
                let repo = SqlProductRepository::new(self.sql()?, self.uow());
                repo.init_schema().await?;
                Arc::new(repo)
            }
            StoreBackend::Document => {
                let repo = MongoProductRepository::new(self.document()?, self.uow());
                repo.init_indexes().await?;
                Arc::new(repo)
            }
            StoreBackend::Memory => {
                Arc::new(MemoryProductRepository::with_unit_of_work(self.uow()))
            }
        })
    }

    async fn credentials(&self, backend: StoreBackend) -> Result<Arc<dyn CredentialRepository>> {
        Ok(match backend {
            StoreBackend::Sql => {
                let repo = SqlCredentialRepository::new(self.sql()?, self.uow());
                repo.init_schema().await?;
                Arc::new(repo)
            }
            StoreBackend::Document => {
                let repo = MongoCredentialRepository::new(self.document()?, self.uow());
                repo.init_indexes().await?;
                Arc::new(repo)
            }
            StoreBackend::Memory => {
                Arc::new(MemoryCredentialRepository::with_unit_of_work(self.uow()))
            }
        })
    }

    async fn sessions(&self, backend: StoreBackend) -> Result<Arc<dyn SessionRepository>> {
        Ok(match backend {
            StoreBackend::Sql => {
                let repo = SqlSessionRepository::new(self.sql()?, self.uow());
                repo.init_schema().await?;
                Arc::new(repo)
            }
            StoreBackend::Document => {
                let repo = MongoSessionRepository::new(self.document()?, self.uow());
                repo.init_indexes().await?;
                Arc::new(repo)
            }
            StoreBackend::Memory => {
                Arc::new(MemorySessionRepository::with_unit_of_work(self.uow()))
            }
        })
    }
}

/// WAL lets readers run beside the single writer; the busy timeout makes
/// `BEGIN IMMEDIATE` queue behind that writer instead of failing.
fn sqlite_options(config: &SqlConfig) -> Result<SqliteConnectOptions> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("parsing {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));
    Ok(options)
}

/// `sqlite://path?opts` needs the parent directory of `path` to exist.
fn ensure_sqlite_dir(url: &str) -> Result<()> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Logs every event at debug level.
struct EventLog;

#[async_trait]
impl EventHandler for EventLog {
    fn name(&self) -> &str {
        "event-log"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        debug!(
            event = %envelope.name,
            event_id = %envelope.metadata.event_id,
            request_id = ?envelope.metadata.request_id,
            payload = %envelope.payload,
            "Domain event"
        );
        Ok(())
    }
}

fn password_service(config: &AppConfig) -> Result<PasswordService> {
    let policy = match config.auth.password_policy {
        PasswordPolicyLevel::Strict => PasswordPolicy::strict(),
        PasswordPolicyLevel::Lenient => PasswordPolicy::lenient(),
    };
    Ok(PasswordService::new(Argon2Config::default(), policy)?)
}

pub async fn build_state(config: &AppConfig) -> Result<AppState> {
    build_state_with(config, password_service(config)?).await
}

/// Same as [`build_state`] with a caller-supplied password service.
pub async fn build_state_with(config: &AppConfig, passwords: PasswordService) -> Result<AppState> {
    let backends = Backends::connect(config).await?;
    let bus = Arc::new(InProcessEventBus::with_capacity(config.events.channel_capacity));

    let users = Arc::new(UserService::new(
        backends.users(config.storage.user).await?,
        bus.clone(),
    ));
    let products = Arc::new(ProductService::new(
        backends.products(config.storage.product).await?,
        Arc::new(UserOwnerDirectory::new(users.clone())),
        bus.clone(),
    ));
    let auth = Arc::new(
        AuthService::new(
            backends.credentials(config.storage.auth).await?,
            backends.sessions(config.storage.auth).await?,
            Arc::new(UserServiceProvisioner::new(users.clone())),
            passwords,
            bus.clone(),
        )
        .with_session_ttl(chrono::Duration::seconds(config.auth.session_ttl_secs)),
    );

    bus.subscribe_to(USER_DELETED, Arc::new(RevokeOnUserDeleted::new(auth.clone())));
    bus.subscribe_all(Arc::new(EventLog));
    info!(handlers = bus.handler_count(), "Event bus ready");

    Ok(AppState {
        users,
        products,
        auth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_dir_is_created() {
        let dir = std::env::temp_dir().join(format!("mosaic-{}", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}/nested/app.db?mode=rwc", dir.display());

        ensure_sqlite_dir(&url).unwrap();
        assert!(dir.join("nested").is_dir());
        std::fs::remove_dir_all(&dir).unwrap();

        ensure_sqlite_dir("sqlite::memory:").unwrap();
    }

    #[tokio::test]
    async fn test_document_module_without_mongodb_fails() {
        let mut config = AppConfig::default();
        config.sql.url = String::new();
        config.storage.user = StoreBackend::Memory;
        config.storage.product = StoreBackend::Memory;
        config.storage.auth = StoreBackend::Document;

        let passwords =
            PasswordService::new(Argon2Config::testing(), PasswordPolicy::lenient()).unwrap();
        let err = build_state_with(&config, passwords).await.err().unwrap();
        assert!(err.to_string().contains("document backend"));
    }
}
