//! # Cerberus LDAP
//!
//! Read-only LDAP v3 server backed by declarative YAML directories.
//!
//! This crate provides:
//! - An immutable, in-memory LDAP directory tree loaded from YAML
//! - An LDAP search filter evaluator (boolean, equality, substring,
//!   ordering, approximate and presence matches)
//! - A Bind/Search/Unbind request dispatcher with per-entry ACLs and
//!   TTL-bounded authenticated sessions
//! - Password hashing utilities for LDAP `{SCHEME}` formats
//!
//! ## Example
//!
//! ```rust,no_run
//! use cerberus_ldap::directory::yaml;
//! use cerberus_ldap::server::{LdapServer, SessionRegistry};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = yaml::load_str("dc:org:\n  uid:alice: {}\n")?;
//!     let sessions = SessionRegistry::new(Duration::from_secs(3600));
//!     let server = LdapServer::new(directory, sessions, None);
//!
//!     server.run("0.0.0.0:389".parse()?, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod directory;
pub mod errors;
pub mod filters;
pub mod server;

pub use errors::{CerberusError, Result};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
