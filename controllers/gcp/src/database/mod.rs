//! Cloud SQL managed resources

pub mod cloudsql;

pub use cloudsql::CloudSqlExternal;
