use crate::{
    backend::{
        oauth::OAuthRegistry,
        utils::{config::FolioConfig, error::BackendResult, rate_limit::RateLimiter},
    },
    common::profile::Profile,
};
use anyhow::anyhow;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use comment::CommentRepo;
use diesel::{define_sql_function, sql_types::Integer};
use like::LikeRepo;
use media::MediaRepo;
use memory::MemoryStore;
use moka::sync::Cache;
use pg::PgStore;
use post::PostRepo;
use profile::ProfileRepo;
use sha2::{Digest, Sha512};
use std::{sync::Arc, time::Duration};
use user::{SessionRepo, UserRepo};

pub mod comment;
pub mod like;
pub mod media;
pub mod memory;
pub mod pg;
pub mod post;
pub mod profile;
pub(crate) mod schema;
pub mod user;

define_sql_function! {
    /// Larger of two integers, used to keep counters from going negative.
    fn greatest(x: Integer, y: Integer) -> Integer;
}

/// Every repository, as used by the services. Implemented by the PostgreSQL store, the
/// in-memory store and their transaction handles.
pub trait Repo:
    UserRepo + SessionRepo + PostRepo + CommentRepo + LikeRepo + MediaRepo + ProfileRepo
{
}

impl<T> Repo for T where
    T: UserRepo + SessionRepo + PostRepo + CommentRepo + LikeRepo + MediaRepo + ProfileRepo
{
}

pub trait Store: Repo + Send + Sync {
    /// Runs `f` with a repository handle bound to a single transaction. All writes are rolled
    /// back if `f` returns an error.
    fn transaction(&self, f: &mut dyn FnMut(&dyn Repo) -> BackendResult<()>)
        -> BackendResult<()>;

    /// Checks that the store can serve queries.
    fn ping(&self) -> BackendResult<()>;

    fn repo(&self) -> &dyn Repo;
}

/// Typed wrapper around [Store::transaction].
pub fn transaction<T>(
    store: &dyn Store,
    f: impl FnOnce(&dyn Repo) -> BackendResult<T>,
) -> BackendResult<T> {
    let mut f = Some(f);
    let mut result = None;
    store.transaction(&mut |repo| {
        let f = f
            .take()
            .ok_or_else(|| anyhow!("Transaction closure called twice"))?;
        result = Some(f(repo)?);
        Ok(())
    })?;
    Ok(result.ok_or_else(|| anyhow!("Transaction finished without result"))?)
}

#[derive(Clone)]
pub struct FolioContext {
    pub store: Arc<dyn Store>,
    pub config: Arc<FolioConfig>,
    pub oauth: Arc<OAuthRegistry>,
    pub rate_limiter: Arc<RateLimiter>,
    pub profile_cache: Cache<(), Profile>,
    pub cookie_key: Key,
}

impl FolioContext {
    /// Connects to the configured store and sets up the enabled OAuth providers.
    pub fn init(config: FolioConfig) -> BackendResult<Self> {
        let store: Arc<dyn Store> = if config.database.in_memory {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(PgStore::connect(&config.database)?)
        };
        let oauth = OAuthRegistry::from_config(&config.oauth)?;
        Ok(Self::new(config, store, oauth))
    }

    pub fn new(config: FolioConfig, store: Arc<dyn Store>, oauth: OAuthRegistry) -> Self {
        let rate_limiter = RateLimiter::new(
            config.rate_limit.enabled,
            config.rate_limit.requests_limit,
            Duration::from_secs(config.rate_limit.window_secs),
        );
        let profile_cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(5 * 60))
            .build();
        let cookie_key = Key::from(Sha512::digest(config.auth.session_secret.as_bytes()).as_slice());
        FolioContext {
            store,
            config: Arc::new(config),
            oauth: Arc::new(oauth),
            rate_limiter: Arc::new(rate_limiter),
            profile_cache,
            cookie_key,
        }
    }

    pub fn repo(&self) -> &dyn Repo {
        self.store.repo()
    }
}

impl FromRef<FolioContext> for Key {
    fn from_ref(context: &FolioContext) -> Self {
        context.cookie_key.clone()
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> FolioContext {
    FolioContext::new(
        FolioConfig::default(),
        Arc::new(MemoryStore::new()),
        OAuthRegistry::default(),
    )
}
