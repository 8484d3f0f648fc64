// SQLite-backed store for saved articles
// Survives restarts and keeps the app useful offline

pub mod db;

pub use db::{ArticleDb, StoreError, StoredRecord, SCHEMA_VERSION};
