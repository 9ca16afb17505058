//! Cloud SQL CRDs

pub mod cloudsql_instance;

pub use cloudsql_instance::*;
