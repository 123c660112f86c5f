//! Per-test PostgreSQL schemas for Diesel adapter tests.
//!
//! Tests need `LIVEPOLL_TEST_DATABASE_URL` pointing at a reachable server.
//! Without one they fail, unless `SKIP_TEST_DATABASE` is truthy, in which
//! case they print a skip marker and return early. Each test gets its own
//! schema with the embedded migrations applied and a pool whose connections
//! default to that schema; the schema is dropped again when the handle goes
//! out of scope.

use diesel::{Connection, PgConnection, RunQueryDsl};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use livepoll::outbound::persistence::{DbPool, PoolConfig};
use url::Url;
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Environment variable naming the server used by database tests.
pub const DATABASE_URL_ENV: &str = "LIVEPOLL_TEST_DATABASE_URL";

/// Environment variable that turns a missing database into a skip.
pub const SKIP_ENV: &str = "SKIP_TEST_DATABASE";

/// Returns true when `SKIP_TEST_DATABASE` is "1", "true" or "yes"
/// (case-insensitive).
pub fn should_skip_database_tests() -> bool {
    std::env::var(SKIP_ENV)
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Prints a skip marker and returns `None` when skipping was requested,
/// otherwise panics so a missing database never passes silently.
pub fn handle_database_unavailable<T>(reason: impl std::fmt::Display) -> Option<T> {
    if should_skip_database_tests() {
        eprintln!("SKIP-TEST-DATABASE: {reason}");
        None
    } else {
        panic!("Test database unavailable: {reason}. Set {SKIP_ENV}=1 to skip.");
    }
}

/// One isolated schema and a pool scoped to it.
pub struct TestSchema {
    admin_url: String,
    schema: String,
    pub pool: DbPool,
}

impl TestSchema {
    /// Provision a schema, or `None` when the database is unavailable and
    /// skipping was requested.
    pub async fn provision() -> Option<Self> {
        let Ok(admin_url) = std::env::var(DATABASE_URL_ENV) else {
            return handle_database_unavailable(format!("{DATABASE_URL_ENV} is not set"));
        };
        let mut conn = match PgConnection::establish(&admin_url) {
            Ok(conn) => conn,
            Err(error) => return handle_database_unavailable(error),
        };
        let schema = format!("livepoll_test_{}", Uuid::new_v4().simple());

        diesel::sql_query(format!("CREATE SCHEMA {schema}"))
            .execute(&mut conn)
            .expect("create schema");
        diesel::sql_query(format!("SET search_path TO {schema}"))
            .execute(&mut conn)
            .expect("set search path");
        conn.run_pending_migrations(MIGRATIONS)
            .expect("apply migrations");

        let pool = DbPool::new(
            PoolConfig::new(scoped_url(&admin_url, &schema))
                .with_max_size(16)
                .with_min_idle(Some(1)),
        )
        .await
        .expect("build pool");

        Some(Self {
            admin_url,
            schema,
            pool,
        })
    }
}

impl Drop for TestSchema {
    fn drop(&mut self) {
        if let Ok(mut conn) = PgConnection::establish(&self.admin_url) {
            let _ = diesel::sql_query(format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema))
                .execute(&mut conn);
        }
    }
}

fn scoped_url(admin_url: &str, schema: &str) -> String {
    let mut url = Url::parse(admin_url).expect("test database URL parses");
    url.query_pairs_mut()
        .append_pair("options", &format!("-csearch_path={schema}"));
    url.to_string()
}
