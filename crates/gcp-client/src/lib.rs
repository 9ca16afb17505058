//! GCP REST API Client
//!
//! A Rust client library for the parts of the Google Cloud REST APIs the
//! GCP controllers manage: Cloud DNS managed zones and record sets, and
//! Cloud SQL instances.
//!
//! # Example
//!
//! ```no_run
//! use gcp_client::{GcpClient, GcpClientTrait, GcpEndpoints};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = GcpClient::new(
//!     "my-project".to_string(),
//!     "ya29.access-token".to_string(),
//!     GcpEndpoints::default(),
//! )?;
//!
//! let zone = client.get_managed_zone("example-zone").await?;
//! println!("name servers: {:?}", zone.name_servers);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Cloud DNS**: managed zones and resource record sets
//! - **Cloud SQL**: database instances
//! - **Authentication**: OAuth2 access tokens from a secret or the metadata server
//! - **Mocking**: `MockGcpClient` behind the `test-util` feature

pub mod auth;
pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod gcp_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use auth::{metadata_access_token, parse_access_token};
pub use client::{GcpClient, GcpEndpoints};
pub use common::HttpClient;
pub use error::GcpError;
pub use gcp_trait::GcpClientTrait;
pub use models::*;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockGcpClient;
