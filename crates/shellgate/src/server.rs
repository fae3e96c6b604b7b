//! Connection supervisor.
//!
//! Binds the listen socket, runs one task per accepted connection and
//! enforces the two connection limits:
//!
//! - idle: handed to russh as its inactivity timeout
//! - lifetime: the connection future is bounded with [`tokio::time::timeout`]
//!   and the client is disconnected when it fires
//!
//! The two are independent; either may be disabled.

pub mod handler;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use russh::Disconnect;
use russh::keys::PrivateKey;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

pub use handler::{ConnectionHandler, SFTP_SUBSYSTEM, Shared};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hostkey::HostKey;
use crate::sftp::{FileTransfer, SftpServerProcess};

/// Delay after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// How long a disconnected client gets to go away before it is dropped.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Start the server from a resolved configuration and run until `shutdown` resolves.
pub async fn run<S>(config: ServerConfig, shutdown: S) -> Result<(), ServerError>
where
    S: Future<Output = ()>,
{
    announce_auth(&config);

    let dirs = config.host_key_dirs.clone();
    // RSA generation takes a while on first start
    let host_key = tokio::task::spawn_blocking(move || HostKey::load_or_create(&dirs))
        .await
        .map_err(std::io::Error::other)??;
    tracing::info!(
        path = %host_key.path().display(),
        fingerprint = %host_key.fingerprint(),
        created = host_key.was_created(),
        "Host key ready"
    );

    let server = Server::new(config, host_key.into_private_key());
    let listener = server.bind().await?;
    server.serve(listener, shutdown).await
}

/// Log how clients will be authenticated.
fn announce_auth(config: &ServerConfig) {
    let Some(verifier) = config.verifier() else {
        tracing::warn!(
            path = %config.config_path.display(),
            "NO PASSWORD CONFIGURED: authentication is disabled and anyone can log in"
        );
        return;
    };

    if config.uses_placeholder_password() {
        tracing::warn!(
            path = %config.config_path.display(),
            "Using the placeholder password from the default config, change it"
        );
    }
    tracing::info!(
        user = %config.user,
        scheme = %verifier.scheme(),
        "Password authentication enabled"
    );
}

/// Build the transport configuration.
#[must_use]
pub fn ssh_config<F: FileTransfer>(shared: &Shared<F>, key: PrivateKey) -> russh::server::Config {
    russh::server::Config {
        inactivity_timeout: shared.config().idle_timeout,
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::ZERO),
        keys: vec![key],
        methods: shared.methods(),
        ..Default::default()
    }
}

/// The SSH endpoint.
pub struct Server<F = SftpServerProcess> {
    shared: Arc<Shared<F>>,
    ssh: Arc<russh::server::Config>,
}

impl Server<SftpServerProcess> {
    /// Create a server whose `sftp` subsystem runs the configured sftp-server binary.
    #[must_use]
    pub fn new(config: ServerConfig, key: PrivateKey) -> Self {
        let transfer = SftpServerProcess::new(&config.sftp.server_path);
        Self::with_transfer(config, key, transfer)
    }
}

impl<F: FileTransfer> Server<F> {
    /// Create a server with a custom file-transfer collaborator.
    #[must_use]
    pub fn with_transfer(config: ServerConfig, key: PrivateKey, transfer: F) -> Self {
        let shared = Arc::new(Shared::new(Arc::new(config), transfer));
        let ssh = Arc::new(ssh_config(&shared, key));
        Self { shared, ssh }
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        self.shared.config()
    }

    /// Bind the configured port on all interfaces.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let port = self.config().port;
        TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| ServerError::Listen { port, source })
    }

    /// Accept connections until `shutdown` resolves, then drop every open connection.
    pub async fn serve<S>(&self, listener: TcpListener, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "Listening for SSH connections");
        }

        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(self.connection(stream, peer));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    match joined {
                        Err(e) if e.is_panic() => {
                            tracing::error!(error = %e, "Connection task panicked");
                        }
                        _ => {}
                    }
                }
            }
        }

        tracing::info!(open = connections.len(), "Shutting down");
        connections.shutdown().await;
        Ok(())
    }

    /// Drive one connection to completion.
    fn connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> impl Future<Output = ()> + Send + use<F> {
        let handler = ConnectionHandler::new(Arc::clone(&self.shared), Some(peer));
        let ssh = Arc::clone(&self.ssh);
        let lifetime = self.config().max_connection_time;

        async move {
            tracing::info!(%peer, "Connection accepted");

            let session = match russh::server::run_stream(ssh, stream, handler).await {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(%peer, error = %e, "SSH handshake failed");
                    return;
                }
            };
            let handle = session.handle();
            tokio::pin!(session);

            let result = match lifetime {
                Some(limit) => match tokio::time::timeout(limit, session.as_mut()).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::info!(%peer, ?limit, "Maximum connection time reached, disconnecting");
                        let _ = handle
                            .disconnect(
                                Disconnect::ByApplication,
                                "maximum connection time reached".to_string(),
                                String::new(),
                            )
                            .await;
                        let _ = tokio::time::timeout(DISCONNECT_GRACE, session.as_mut()).await;
                        return;
                    }
                },
                None => session.as_mut().await,
            };

            match result {
                Ok(()) => tracing::info!(%peer, "Connection closed"),
                Err(e) => tracing::info!(%peer, error = %e, "Connection ended"),
            }
        }
    }
}
