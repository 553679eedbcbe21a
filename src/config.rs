//! CLI surface, logging setup and TLS material loading.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::crypto::HashScheme;
use crate::directory::{yaml, Directory};
use crate::errors::{CerberusError, Result};

/// Command-line interface of the server binary.
#[derive(Parser, Debug)]
#[command(
    name = "cerberus-ldap",
    version,
    about = "Read-only LDAP server backed by declarative YAML directories"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the LDAP server
    Serve(ServeArgs),
    /// Hash a password for use in a directory definition
    Hash(HashArgs),
}

/// `serve` subcommand flags.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long = "listen-address", default_value = ":389")]
    pub listen_address: String,

    /// Backend which stores the directory data
    #[arg(long = "backend.name", value_enum, default_value_t = BackendKind::Yaml)]
    pub backend_name: BackendKind,

    /// URL used to locate the backend source (e.g. file:///etc/ldap.yaml)
    #[arg(long = "backend.url")]
    pub backend_url: String,

    /// Enable TLS
    #[arg(long = "tls")]
    pub tls: bool,

    /// Enable mutual TLS (requires and verifies client certificates)
    #[arg(long = "mtls")]
    pub mtls: bool,

    /// Path to the CA bundle (PEM), required with --mtls
    #[arg(long = "tls.ca")]
    pub tls_ca: Option<PathBuf>,

    /// Path to the server certificate chain (PEM)
    #[arg(long = "tls.cert")]
    pub tls_cert: Option<PathBuf>,

    /// Path to the server private key (PEM)
    #[arg(long = "tls.key")]
    pub tls_key: Option<PathBuf>,

    /// Lifetime of an authenticated session
    #[arg(long = "session-ttl", value_parser = humantime::parse_duration, default_value = "168h")]
    pub session_ttl: Duration,

    /// Log format
    #[arg(long = "log.format", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    /// Log level
    #[arg(long = "log.level", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

/// `hash` subcommand flags.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// Hash scheme
    #[arg(long, default_value = "ssha")]
    pub scheme: HashScheme,

    /// Password to hash (use - to read a line from stdin)
    pub password: String,
}

/// Supported directory backends.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Declarative YAML document
    Yaml,
}

/// Log output formats.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text on stderr
    Text,
    /// One JSON object per line on stderr
    Json,
    /// Discard everything (used by the test harness)
    Test,
}

/// Log verbosity levels.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl ServeArgs {
    /// Resolves the listen address; a bare `:port` binds every interface.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let address = if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        };

        address.parse().map_err(|_| {
            CerberusError::Config(format!("invalid listen address: {}", self.listen_address))
        })
    }

    /// Loads the directory from the configured backend.
    pub fn load_directory(&self) -> Result<Directory> {
        match self.backend_name {
            BackendKind::Yaml => yaml::load_file(file_url_to_path(&self.backend_url)?),
        }
    }

    /// Builds the TLS acceptor when TLS or mutual TLS is enabled.
    pub fn tls_acceptor(&self) -> Result<Option<TlsAcceptor>> {
        if !self.tls && !self.mtls {
            return Ok(None);
        }

        let cert_path = self
            .tls_cert
            .as_deref()
            .ok_or_else(|| CerberusError::Config("--tls.cert is required with TLS".to_string()))?;
        let key_path = self
            .tls_key
            .as_deref()
            .ok_or_else(|| CerberusError::Config("--tls.key is required with TLS".to_string()))?;

        let certs = read_certs(cert_path)?;
        let key = read_private_key(key_path)?;

        let builder = ServerConfig::builder();
        let config = if self.mtls {
            let ca_path = self.tls_ca.as_deref().ok_or_else(|| {
                CerberusError::Config("--tls.ca is required with mutual TLS".to_string())
            })?;

            let mut roots = RootCertStore::empty();
            for cert in read_certs(ca_path)? {
                roots
                    .add(cert)
                    .map_err(|err| CerberusError::Tls(err.to_string()))?;
            }

            let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|err| CerberusError::Tls(err.to_string()))?;
            builder
                .with_client_cert_verifier(verifier)
                .with_single_cert(certs, key)
                .map_err(|err| CerberusError::Tls(err.to_string()))?
        } else {
            builder
                .with_no_client_auth()
                .with_single_cert(certs, key)
                .map_err(|err| CerberusError::Tls(err.to_string()))?
        };

        Ok(Some(TlsAcceptor::from(Arc::new(config))))
    }

    /// Installs the global tracing subscriber.
    pub fn init_logging(&self) {
        let filter = EnvFilter::new(self.log_level.as_directive());

        match self.log_format {
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init(),
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init(),
            LogFormat::Test => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .init(),
        }
    }
}

fn file_url_to_path(raw: &str) -> Result<PathBuf> {
    let url = Url::parse(raw)
        .map_err(|err| CerberusError::Config(format!("invalid backend URL '{raw}': {err}")))?;

    if url.scheme() != "file" {
        return Err(CerberusError::Config(format!(
            "unsupported backend URL scheme '{}', only file:// is supported",
            url.scheme()
        )));
    }

    url.to_file_path()
        .map_err(|()| CerberusError::Config(format!("backend URL '{raw}' has no local path")))
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|err| CerberusError::Tls(format!("cannot parse {}: {err}", path.display())))
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|err| CerberusError::Tls(format!("cannot parse {}: {err}", path.display())))?
        .ok_or_else(|| CerberusError::Tls(format!("no private key in {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn serve_args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec![
            "cerberus-ldap",
            "serve",
            "--backend.name",
            "yaml",
            "--backend.url",
            "file:///tmp/dir.yaml",
        ];
        argv.extend_from_slice(extra);

        match Cli::parse_from(argv).command {
            Command::Serve(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let args = serve_args(&[]);

        assert_eq!(args.listen_address, ":389");
        assert_eq!(args.session_ttl, Duration::from_secs(168 * 3600));
        assert_eq!(args.log_format, LogFormat::Json);
        assert_eq!(args.log_level, LogLevel::Info);
        assert!(!args.tls);
        assert!(!args.mtls);
    }

    #[test]
    fn test_listen_addr_expands_bare_ports() {
        let args = serve_args(&["--listen-address", ":10389"]);
        assert_eq!(args.listen_addr().unwrap(), "0.0.0.0:10389".parse().unwrap());

        let args = serve_args(&["--listen-address", "127.0.0.1:389"]);
        assert_eq!(args.listen_addr().unwrap(), "127.0.0.1:389".parse().unwrap());

        let args = serve_args(&["--listen-address", "not-an-address"]);
        assert!(args.listen_addr().is_err());
    }

    #[test]
    fn test_session_ttl_accepts_humantime() {
        let args = serve_args(&["--session-ttl", "5m"]);
        assert_eq!(args.session_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_file_url_to_path() {
        assert_eq!(
            file_url_to_path("file:///etc/ldap.yaml").unwrap(),
            PathBuf::from("/etc/ldap.yaml")
        );
        assert!(file_url_to_path("http://example.org/dir.yaml").is_err());
        assert!(file_url_to_path("not a url").is_err());
    }

    #[test]
    fn test_tls_requires_cert_and_key() {
        let args = serve_args(&["--tls"]);
        assert!(args.tls_acceptor().is_err());

        let args = serve_args(&[]);
        assert!(args.tls_acceptor().unwrap().is_none());
    }

    #[test]
    fn test_hash_subcommand_parses_scheme() {
        let cli = Cli::parse_from([
            "cerberus-ldap",
            "hash",
            "--scheme",
            "argon2id",
            "hunter2",
        ]);

        match cli.command {
            Command::Hash(args) => {
                assert_eq!(args.scheme, HashScheme::Argon2id);
                assert_eq!(args.password, "hunter2");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
