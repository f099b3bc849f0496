use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use russh::client::{self, Handle};
use russh::keys::{self, PrivateKey, PrivateKeyWithHashAlg, PublicKey};
use russh::Disconnect;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::services::connection::SshTunnelParameter;

/// How long to wait for the SSH handshake
pub const TUNNEL_TIMEOUT: Duration = Duration::from_secs(30);
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("Failed to load SSH key {path}: {source}")]
    Key {
        path: PathBuf,
        #[source]
        source: keys::Error,
    },

    #[error("Neither an SSH key nor an SSH password was given for {user}@{host}")]
    MissingCredentials { user: String, host: String },

    #[error("SSH authentication as '{user}' failed")]
    AuthenticationFailed { user: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SSH connection to {host} was not established within {timeout:?}")]
    Timeout { host: String, timeout: Duration },
}

/// How to log in on the SSH host
enum Credentials {
    Key(PrivateKey),
    Password(String),
}

impl Credentials {
    /// A configured key wins over a password
    fn from_params(params: &SshTunnelParameter) -> Result<Self, TunnelError> {
        if let Some(path) = &params.key {
            let key = keys::load_secret_key(path, None).map_err(|source| TunnelError::Key {
                path: path.clone(),
                source,
            })?;
            return Ok(Credentials::Key(key));
        }

        match &params.password {
            Some(password) => Ok(Credentials::Password(password.clone())),
            None => Err(TunnelError::MissingCredentials {
                user: params.user.clone(),
                host: params.address.clone(),
            }),
        }
    }
}

struct TunnelHandler {
    host: String,
    port: u16,
}

impl client::Handler for TunnelHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                tracing::warn!("Host key of {} is not in known_hosts, accepting it", self.host);
                Ok(true)
            }
            Err(e) => {
                tracing::error!("Rejecting host key of {}: {}", self.host, e);
                Ok(false)
            }
        }
    }
}

/// Local port forwarding over an in-process SSH session
///
/// Connections to `127.0.0.1:local_port` are forwarded to the remote
/// database address. Dropping the tunnel stops accepting connections.
pub struct SshTunnel {
    session: Arc<Handle<TunnelHandler>>,
    forwarder: JoinHandle<()>,
    local_port: u16,
}

impl SshTunnel {
    /// Connect, authenticate and start forwarding
    pub async fn open(params: &SshTunnelParameter) -> Result<Self, TunnelError> {
        let credentials = Credentials::from_params(params)?;

        tracing::info!(
            "Opening SSH tunnel via {}@{}:{}",
            params.user,
            params.address,
            params.port
        );

        let config = Arc::new(client::Config {
            keepalive_interval: Some(KEEPALIVE_INTERVAL),
            ..Default::default()
        });
        let handler = TunnelHandler {
            host: params.address.clone(),
            port: params.port,
        };

        let connect = client::connect(config, (params.address.as_str(), params.port), handler);
        let mut session = tokio::time::timeout(TUNNEL_TIMEOUT, connect)
            .await
            .map_err(|_| TunnelError::Timeout {
                host: params.address.clone(),
                timeout: TUNNEL_TIMEOUT,
            })??;

        let auth = match credentials {
            Credentials::Key(key) => {
                let hash_alg = session.best_supported_rsa_hash().await?.flatten();
                session
                    .authenticate_publickey(
                        params.user.clone(),
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await?
            }
            Credentials::Password(password) => {
                session
                    .authenticate_password(params.user.clone(), password)
                    .await?
            }
        };
        if !auth.success() {
            return Err(TunnelError::AuthenticationFailed {
                user: params.user.clone(),
            });
        }

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let local_port = listener.local_addr()?.port();
        let session = Arc::new(session);

        let forwarder = tokio::spawn(forward(
            listener,
            session.clone(),
            params.remote_address.clone(),
            params.remote_port,
        ));

        tracing::info!(
            "SSH tunnel established (127.0.0.1:{} -> {}:{})",
            local_port,
            params.remote_address,
            params.remote_port
        );

        Ok(Self {
            session,
            forwarder,
            local_port,
        })
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Stop forwarding and end the SSH session
    pub async fn close(self) -> Result<(), TunnelError> {
        self.forwarder.abort();
        self.session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        tracing::info!("SSH tunnel closed");
        Ok(())
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

async fn forward(
    listener: TcpListener,
    session: Arc<Handle<TunnelHandler>>,
    remote_address: String,
    remote_port: u16,
) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("Tunnel listener failed: {}", e);
                return;
            }
        };

        tracing::debug!("Forwarding connection from {}", peer);
        tokio::spawn(forward_connection(
            socket,
            session.clone(),
            remote_address.clone(),
            remote_port,
        ));
    }
}

async fn forward_connection(
    mut socket: TcpStream,
    session: Arc<Handle<TunnelHandler>>,
    remote_address: String,
    remote_port: u16,
) {
    let (origin_address, origin_port) = match socket.peer_addr() {
        Ok(peer) => (peer.ip().to_string(), peer.port()),
        Err(_) => ("127.0.0.1".to_string(), 0),
    };

    let channel = match session
        .channel_open_direct_tcpip(
            remote_address.as_str(),
            u32::from(remote_port),
            origin_address,
            u32::from(origin_port),
        )
        .await
    {
        Ok(channel) => channel,
        Err(e) => {
            tracing::error!(
                "Could not open channel to {}:{}: {}",
                remote_address,
                remote_port,
                e
            );
            return;
        }
    };

    let mut stream = channel.into_stream();
    if let Err(e) = tokio::io::copy_bidirectional(&mut socket, &mut stream).await {
        tracing::debug!("Forwarded connection ended: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SshTunnelParameter {
        SshTunnelParameter {
            address: "club.example.org".to_string(),
            user: "admin".to_string(),
            port: 2222,
            key: None,
            password: None,
            remote_address: "127.0.0.1".to_string(),
            remote_port: 5432,
        }
    }

    #[test]
    fn test_password_credentials() {
        let mut params = params();
        params.password = Some("tunnel-secret".to_string());

        match Credentials::from_params(&params) {
            Ok(Credentials::Password(password)) => assert_eq!(password, "tunnel-secret"),
            _ => panic!("expected password credentials"),
        }
    }

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            Credentials::from_params(&params()),
            Err(TunnelError::MissingCredentials { user, .. }) if user == "admin"
        ));
    }

    #[test]
    fn test_unreadable_key_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut params = params();
        params.key = Some(dir.path().join("id_missing"));
        params.password = Some("ignored".to_string());

        assert!(matches!(
            Credentials::from_params(&params),
            Err(TunnelError::Key { path, .. }) if path.ends_with("id_missing")
        ));
    }

    #[test]
    fn test_open_fails_before_connecting_without_credentials() {
        let result = tokio_test::block_on(SshTunnel::open(&params()));
        assert!(matches!(result, Err(TunnelError::MissingCredentials { .. })));
    }
}
