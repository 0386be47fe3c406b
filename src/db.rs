use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::time::Duration;

use crate::error::ServiceError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Retry budget for write transactions that lose the SQLITE_BUSY race
/// despite the busy_timeout pragma. Exhaustion surfaces as `Busy`.
pub const TX_RETRY_ATTEMPTS: u32 = 3;

pub fn establish_pool(database_url: &str) -> DbPool {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(5)
        .build(manager)
        .expect("Failed to create pool")
}

pub fn configure_connection(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute("PRAGMA busy_timeout = 2000;")?;
    conn.batch_execute("PRAGMA journal_mode = WAL;")?;
    conn.batch_execute("PRAGMA synchronous = NORMAL;")?;
    conn.batch_execute("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), ServiceError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| ServiceError::Internal(format!("migrations failed: {e}")))
}

/// Runs `op` inside a BEGIN IMMEDIATE transaction, retrying the whole
/// closure when the store reports contention. Counter updates must go
/// through here so the read-modify-write cycle stays atomic.
pub fn write_tx<T>(
    conn: &mut SqliteConnection,
    mut op: impl FnMut(&mut SqliteConnection) -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let mut attempt = 0;
    loop {
        match conn.immediate_transaction(|c| op(c)) {
            Err(ServiceError::Busy) if attempt + 1 < TX_RETRY_ATTEMPTS => {
                attempt += 1;
                std::thread::sleep(Duration::from_millis(50 * u64::from(attempt)));
            }
            result => return result,
        }
    }
}

/// Bridges sync diesel work onto the blocking thread pool.
pub async fn with_conn<T, F>(pool: DbPool, f: F) -> Result<T, ServiceError>
where
    F: FnOnce(&mut SqliteConnection) -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("blocking task: {e}")))?
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory store exposing the same transactional interface as the
    /// production pool. Single connection so every pooled checkout sees
    /// the same database.
    pub fn memory_pool() -> DbPool {
        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .expect("Failed to create test pool");
        let mut conn = pool.get().expect("Failed to get test connection");
        configure_connection(&mut conn).expect("Failed to configure test connection");
        run_migrations(&mut conn).expect("Failed to run test migrations");
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_tx_commits() {
        let pool = testing::memory_pool();
        let mut conn = pool.get().unwrap();

        let now = 1_700_000_000_i64;
        let inserted = write_tx(&mut conn, |c| {
            use crate::schema::users::dsl::*;
            diesel::insert_into(users)
                .values((
                    id.eq("u1"),
                    name.eq("Ana"),
                    photo_url.eq(None::<String>),
                    created_at.eq(now),
                ))
                .execute(c)
                .map_err(ServiceError::from)
        })
        .unwrap();
        assert_eq!(inserted, 1);

        use crate::schema::users::dsl::*;
        let count: i64 = users.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_write_tx_rolls_back_on_error() {
        let pool = testing::memory_pool();
        let mut conn = pool.get().unwrap();

        let result: Result<(), ServiceError> = write_tx(&mut conn, |c| {
            use crate::schema::users::dsl::*;
            diesel::insert_into(users)
                .values((
                    id.eq("u1"),
                    name.eq("Ana"),
                    photo_url.eq(None::<String>),
                    created_at.eq(0_i64),
                ))
                .execute(c)?;
            Err(ServiceError::Invalid("boom".into()))
        });
        assert!(result.is_err());

        use crate::schema::users::dsl::*;
        let count: i64 = users.count().get_result(&mut conn).unwrap();
        assert_eq!(count, 0);
    }
}
