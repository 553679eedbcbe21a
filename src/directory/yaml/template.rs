//! Template pass over the raw directory definition.
//!
//! The YAML source is rendered as a minijinja template before parsing, so
//! definitions can use the generic string helpers plus `read_file(path)`
//! to inline external material (certificates, shared fragments, secrets).

use minijinja::{Environment, ErrorKind};

use crate::errors::{CerberusError, Result};

/// Renders the raw directory definition.
pub(super) fn render(raw: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_function("read_file", read_file);

    env.render_str(raw, ())
        .map_err(|err| CerberusError::Template(err.to_string()))
}

fn read_file(path: String) -> std::result::Result<String, minijinja::Error> {
    std::fs::read_to_string(&path).map_err(|err| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("cannot read '{path}': {err}"),
        )
    })
}
