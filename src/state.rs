use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{mailer::Mailer, storage::StorageService},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub storage: StorageService,
    pub mailer: Arc<dyn Mailer>,
    pub cookie_key: Key,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        storage: StorageService,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let digest = Sha512::digest(config.cookie_secret.as_bytes());
        let cookie_key = Key::from(&digest[..]);
        Self {
            config,
            db,
            storage,
            mailer,
            cookie_key,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
