use std::sync::Arc;

use db::{FileStorage, JSONStore, MemoryStorage, Storage, StorageError};
use identity::{IdentityResolver, OfflineBackend, RemoteBackend, SessionTiers, SupabaseBackend};
use tokio::sync::Mutex;

use crate::config::Cfg;

pub type Store = JSONStore<Box<dyn Storage>>;

/// The single application context served by this process
pub struct App {
    pub store: Store,
    pub identity: IdentityResolver,
}

pub type SharedApp = Arc<Mutex<App>>;

impl App {
    pub fn new(store: Store, identity: IdentityResolver) -> Self {
        Self { store, identity }
    }

    /// Opens the data and session files and picks the remote backend. Unreadable files are an
    /// error, never replaced.
    pub async fn from_config(cfg: &Cfg) -> Result<Self, StorageError> {
        let data = FileStorage::open(&cfg.data_file)?;
        let store = db::new_store(Box::new(data) as Box<dyn Storage>);

        let remote: Arc<dyn RemoteBackend> = match &cfg.supabase_url {
            Some(url) => {
                log::info!("using remote backend at {}", url);
                Arc::new(SupabaseBackend::new(
                    url,
                    &cfg.supabase_anon_key,
                    cfg.site_url.clone(),
                ))
            }
            None => {
                log::info!("no remote backend configured, running offline");
                Arc::new(OfflineBackend::new())
            }
        };

        let tiers = SessionTiers {
            durable: Box::new(FileStorage::open(&cfg.session_file)?),
            tab: Box::new(MemoryStorage::new()),
        };

        let mut identity = IdentityResolver::new(tiers, remote);
        identity.initialize().await;

        Ok(Self::new(store, identity))
    }

    pub fn shared(self) -> SharedApp {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn corrupt_data_file_stops_startup() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Cfg {
            data_file: dir.path().join("data.json"),
            session_file: dir.path().join("session.json"),
            ..Cfg::default()
        };
        std::fs::write(&cfg.data_file, "{\"educare_users_v1\": \"[").unwrap();

        assert!(matches!(
            App::from_config(&cfg).await,
            Err(StorageError::Json(_))
        ));
        assert_eq!(
            std::fs::read_to_string(&cfg.data_file).unwrap(),
            "{\"educare_users_v1\": \"["
        );
    }
}
