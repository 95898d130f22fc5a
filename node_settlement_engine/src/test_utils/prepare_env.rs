//! Test database plumbing. Every integration test gets its own throwaway SQLite file under
//! `data/`, dropped and recreated on each run so tests never see each other's settlements, trial
//! claims or code usage counters.
use std::path::Path;

use log::*;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// One-stop setup for a settlement store test: env + logging + a fresh, migrated database at `url`.
pub async fn prepare_test_env(url: &str) {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await;
}

pub fn random_db_path() -> String {
    format!("sqlite://../data/test_store_{}", rand::random::<u64>())
}

pub async fn run_migrations(url: &str) {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to settlement store");
    migrate!("./src/sqlite/migrations").run(db.pool()).await.expect("Error migrating settlement store");
    info!("🚀️ Settlement store schema is up to date");
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping settlement store {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating settlement store");
    info!("Created Sqlite settlement store at {p}");
}
