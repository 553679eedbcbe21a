//! TCP/TLS listener and per-connection loop.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use ldap3_proto::LdapCodec;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::errors::Result;
use crate::server::dispatcher::{Dispatcher, Disposition};
use crate::server::sessions::SessionRegistry;

/// The LDAP server: one directory, one session registry, one listener.
///
/// Each accepted connection is served by its own task; a handler panic
/// only tears down the offending connection.
pub struct LdapServer {
    directory: Arc<Directory>,
    sessions: Arc<SessionRegistry>,
    tls: Option<TlsAcceptor>,
}

impl LdapServer {
    /// Creates a server over the given directory. With a TLS acceptor the
    /// listener speaks LDAPS (optionally with client certificate
    /// verification, depending on the acceptor configuration).
    pub fn new(
        directory: Directory,
        sessions: Arc<SessionRegistry>,
        tls: Option<TlsAcceptor>,
    ) -> Self {
        Self {
            directory: Arc::new(directory),
            sessions,
            tls,
        }
    }

    /// Accepts connections until the cancellation token fires, then drains
    /// in-flight connections before returning.
    pub async fn run(&self, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, tls = self.tls.is_some(), "listening for LDAP connections");

        let tracker = TaskTracker::new();
        tracker.spawn(self.sessions.clone().run_gc(shutdown.clone()));

        let mut next_conn_id: u64 = 0;
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "failed to accept connection");
                    continue;
                }
            };

            next_conn_id += 1;
            let conn_id = next_conn_id;
            let dispatcher = Dispatcher::new(self.directory.clone(), self.sessions.clone());
            let sessions = self.sessions.clone();
            let tls = self.tls.clone();

            tracker.spawn(async move {
                debug!(conn_id, %peer, "connection accepted");

                let served = match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(stream) => serve_connection(stream, conn_id, dispatcher).await,
                        Err(err) => {
                            warn!(conn_id, %peer, error = %err, "TLS handshake failed");
                            Ok(())
                        }
                    },
                    None => serve_connection(stream, conn_id, dispatcher).await,
                };

                // the session dies with the connection
                sessions.delete(conn_id);
                match served {
                    Ok(()) => debug!(conn_id, %peer, "connection closed"),
                    Err(err) => debug!(conn_id, %peer, error = %err, "connection aborted"),
                }
            });
        }

        info!("shutting down, draining connections");
        drop(listener);
        tracker.close();
        tracker.wait().await;
        Ok(())
    }
}

/// Reads framed LDAP messages off one connection and writes back whatever
/// the dispatcher produces. Codec-level failures end the connection.
async fn serve_connection<S>(
    stream: S,
    conn_id: u64,
    dispatcher: Dispatcher,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(stream, LdapCodec::default());

    while let Some(decoded) = framed.next().await {
        let msg = match decoded {
            Ok(msg) => msg,
            Err(err) => {
                debug!(conn_id, error = %err, "undecodable PDU, closing connection");
                break;
            }
        };

        match dispatcher.handle(conn_id, msg) {
            Disposition::Reply(responses) => {
                for response in responses {
                    framed.send(response).await?;
                }
            }
            Disposition::Close => break,
        }
    }
    Ok(())
}
