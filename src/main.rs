use std::io::BufRead;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cerberus_ldap::config::{Cli, Command, HashArgs, ServeArgs};
use cerberus_ldap::crypto;
use cerberus_ldap::server::{LdapServer, SessionRegistry};

fn main() -> ExitCode {
    match Cli::parse().command {
        Command::Serve(args) => {
            args.init_logging();
            match serve(args) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    error!("{err:#}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Hash(args) => match hash(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("cannot start the async runtime")?;

    runtime.block_on(async {
        let directory = args.load_directory().context("cannot load the directory")?;
        info!(entries = directory.len(), "directory loaded");

        let acceptor = args.tls_acceptor().context("cannot set up TLS")?;
        let sessions = SessionRegistry::new(args.session_ttl);
        let server = LdapServer::new(directory, sessions, acceptor);

        let shutdown = CancellationToken::new();
        tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, shutting down");
                    shutdown.cancel();
                }
            }
        });

        server
            .run(args.listen_addr()?, shutdown)
            .await
            .context("server terminated abnormally")
    })
}

fn hash(args: HashArgs) -> anyhow::Result<()> {
    let password = if args.password == "-" {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("cannot read the password from stdin")?;
        line.trim_end_matches(['\r', '\n']).to_string()
    } else {
        args.password
    };

    let hashed = crypto::hash_password(&password, args.scheme)?;
    println!("{hashed}");
    Ok(())
}
