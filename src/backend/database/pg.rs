use super::{Repo, Store};
use crate::backend::utils::{
    config::FolioConfigDatabase,
    error::{BackendError, BackendResult},
};
use anyhow::anyhow;
use diesel::{
    r2d2::{ConnectionManager, Pool},
    result::{DatabaseErrorKind, Error as DieselError},
    sql_query,
    Connection,
    PgConnection,
    RunQueryDsl,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use std::{cell::RefCell, env, ops::DerefMut};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

/// Source of a database connection for a single query.
pub trait Connect {
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> BackendResult<T>,
    ) -> BackendResult<T>;
}

impl Connect for DbPool {
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut conn = self.get()?;
        f(conn.deref_mut())
    }
}

/// Connection which is inside an open transaction.
pub struct TxConn<'a>(RefCell<&'a mut PgConnection>);

impl Connect for TxConn<'_> {
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut PgConnection) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut conn = self.0.try_borrow_mut()?;
        f(&mut **conn)
    }
}

/// Repositories backed by PostgreSQL, either on the pool or inside a transaction.
pub struct PgRepo<C>(pub C);

pub type PgStore = PgRepo<DbPool>;

impl PgStore {
    /// Creates the connection pool and applies pending migrations. The connection url can be
    /// overridden with env var DATABASE_URL.
    pub fn connect(config: &FolioConfigDatabase) -> BackendResult<Self> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| config.connection_url.clone());
        let manager = ConnectionManager::<PgConnection>::new(url);
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .build(manager)?;
        pool.get()?
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow!("Failed to run migrations: {e}"))?;
        info!("Connected to database");
        Ok(PgRepo(pool))
    }
}

impl Store for PgStore {
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn Repo) -> BackendResult<()>,
    ) -> BackendResult<()> {
        let mut conn = self.0.get()?;
        conn.deref_mut()
            .transaction::<_, BackendError, _>(|conn| f(&PgRepo(TxConn(RefCell::new(conn)))))
    }

    fn ping(&self) -> BackendResult<()> {
        self.0.with_conn(|conn| {
            sql_query("select 1").execute(conn)?;
            Ok(())
        })
    }

    fn repo(&self) -> &dyn Repo {
        self
    }
}

/// Maps a unique constraint violation to a conflict, other errors become internal errors.
pub(super) fn map_unique_violation(e: DieselError, message: &str) -> BackendError {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            BackendError::conflict(message)
        }
        e => e.into(),
    }
}
