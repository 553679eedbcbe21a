//! Password hashing utilities.
//!
//! Directory credentials are compared verbatim at bind time; these helpers
//! exist for the `hash` CLI subcommand and for operators migrating
//! existing `{SCHEME}`-formatted secrets.

mod password;

pub use password::{hash_password, verify_password, HashScheme};
