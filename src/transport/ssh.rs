//! SSH transport implementation using russh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::ChannelMsg;
use secrecy::ExposeSecret;
use tokio::time::timeout;

use super::config::{AuthMethod, SshConfig};
use crate::batch::Connector;
use crate::channel::Channel;
use crate::device::{Credential, DeviceDescriptor};
use crate::error::{ChannelError, Result, TransportError};

/// How long a single poll waits for the server before reporting "no data
/// yet". Pacing between polls belongs to the executor, not the channel.
const POLL_WAIT: Duration = Duration::from_millis(10);

/// SSH transport wrapping a russh client session.
pub struct SshTransport {
    session: Handle<AcceptingHandler>,
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config::default());

        debug!("connecting to {}:{}", config.host, config.port);
        let mut session = timeout(
            config.connect_timeout,
            client::connect(
                ssh_config,
                (config.host.as_str(), config.port),
                AcceptingHandler,
            ),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.connect_timeout))?
        .map_err(TransportError::Ssh)?;

        Self::authenticate(&mut session, &config).await?;
        debug!("authenticated to {} as '{}'", config.host, config.username);

        Ok(Self { session, config })
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<AcceptingHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                // Pick the best RSA hash algorithm the server supports.
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Open a PTY + shell channel and hand the whole connection over to
    /// it. The returned channel owns the session for its lifetime and
    /// disconnects on close.
    pub async fn into_shell_channel(self) -> Result<SshChannel> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                "xterm",
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(SshChannel {
            transport: Some(self),
            channel,
            eof: false,
        })
    }

    /// Disconnect the session.
    pub async fn close(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

/// Host key handler that trusts every key.
///
/// The original operational posture: device inventories are
/// operator-curated and trust is established out of band. Known-hosts
/// persistence is out of scope for the engine.
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An attached interactive shell, adapted to the engine's
/// [`Channel`] contract.
pub struct SshChannel {
    /// Keeps the SSH session alive for exactly the channel's lifetime.
    transport: Option<SshTransport>,
    channel: russh::Channel<Msg>,
    eof: bool,
}

#[async_trait]
impl Channel for SshChannel {
    async fn read_available(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.eof {
            return Err(ChannelError::Closed.into());
        }

        let mut out = Vec::new();
        while out.len() < max {
            match timeout(POLL_WAIT, self.channel.wait()).await {
                // Quiet: nothing more pending right now.
                Err(_) => break,
                Ok(Some(ChannelMsg::Data { data })) => out.extend_from_slice(&data),
                Ok(Some(ChannelMsg::ExtendedData { data, .. })) => out.extend_from_slice(&data),
                Ok(Some(ChannelMsg::Eof | ChannelMsg::Close)) | Ok(None) => {
                    self.eof = true;
                    if out.is_empty() {
                        return Err(ChannelError::Closed.into());
                    }
                    break;
                }
                Ok(Some(_)) => {}
            }
        }
        Ok(out)
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.eof {
            return Err(ChannelError::Closed.into());
        }
        self.channel.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.eof = true;
        if let Err(err) = self.channel.eof().await {
            debug!("channel eof failed: {err}");
        }
        if let Err(err) = self.channel.close().await {
            debug!("channel close failed: {err}");
        }
        if let Some(transport) = self.transport.take() {
            if let Err(err) = transport.close().await {
                debug!("session disconnect failed: {err}");
            }
        }
        Ok(())
    }
}

/// The production [`Connector`]: password authentication with the
/// device's candidate credentials.
#[derive(Debug, Clone)]
pub struct SshConnector {
    connect_timeout: Duration,
}

impl SshConnector {
    /// Create a connector with the default connect timeout.
    pub fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the connect/authentication timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        device: &DeviceDescriptor,
        credential: &Credential,
    ) -> Result<Box<dyn Channel>> {
        let config = SshConfig::new(&device.host, &credential.username)
            .with_port(device.port)
            .with_auth(AuthMethod::Password(credential.password.clone()))
            .with_connect_timeout(self.connect_timeout);

        let transport = SshTransport::connect(config).await?;
        let channel = transport.into_shell_channel().await?;
        Ok(Box::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connector_timeout_is_configurable() {
        let connector = SshConnector::new().with_connect_timeout(Duration::from_secs(3));
        assert_eq!(connector.connect_timeout, Duration::from_secs(3));
    }
}
