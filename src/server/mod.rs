//! LDAP server runtime.
//!
//! This module wires the request [`dispatcher`] and the [`sessions`]
//! registry to a TCP (or TLS) listener. The directory itself is immutable
//! and shared; the registry is the only mutable state, and it is safe for
//! concurrent access from every connection task.

pub mod dispatcher;
pub mod server;
pub mod sessions;

pub use dispatcher::{Dispatcher, Disposition};
pub use server::LdapServer;
pub use sessions::SessionRegistry;
