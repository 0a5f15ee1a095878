use std::fmt;
use std::path::Path;

use crate::alarm::{AlarmAction, AlarmController};
use crate::assets::AssetStore;
use crate::codec::AudioConverter;
use crate::config::{ConfigError, DeviceConfig};
use crate::control::{CommandError, Dispatcher};
use crate::handshake::transport::{DeviceTransport, HttpsTransport, TransportError};
use crate::handshake::HandshakeError;
use crate::session::Session;
use crate::stream::StreamTarget;
use crate::sync::{SlotSynchronizer, SyncError, SyncReport};

/// Errors emitted by the high-level client.
///
/// Component errors pass through unchanged so callers can still match on
/// device codes and failed upload phases.
#[derive(Debug)]
#[non_exhaustive]
pub enum ClientError {
    /// The supplied configuration was rejected before connecting.
    Config(ConfigError),
    /// The HTTPS client could not be built.
    Transport(TransportError),
    /// Login failed; the session holds no new token.
    Handshake(HandshakeError),
    /// A single command failed locally, on the wire, or on the device.
    Command(CommandError),
    /// Slot synchronization stopped early.
    Sync(SyncError),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Config(err) => write!(f, "config error: {}", err),
            ClientError::Transport(err) => write!(f, "transport error: {}", err),
            ClientError::Handshake(err) => write!(f, "handshake error: {}", err),
            ClientError::Command(err) => write!(f, "command error: {}", err),
            ClientError::Sync(err) => write!(f, "sync error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Config(err) => Some(err),
            ClientError::Transport(err) => Some(err),
            ClientError::Handshake(err) => Some(err),
            ClientError::Command(err) => Some(err),
            ClientError::Sync(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        ClientError::Config(err)
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::Transport(err)
    }
}

impl From<HandshakeError> for ClientError {
    fn from(err: HandshakeError) -> Self {
        ClientError::Handshake(err)
    }
}

impl From<CommandError> for ClientError {
    fn from(err: CommandError) -> Self {
        ClientError::Command(err)
    }
}

impl From<SyncError> for ClientError {
    fn from(err: SyncError) -> Self {
        ClientError::Sync(err)
    }
}

/// Control client for one camera.
///
/// # Guarantees
/// * Every command after login carries the session token; without one it fails
///   before touching the network.
/// * One request is in flight at a time (`&mut self` on every operation).
/// * No call is retried; timeouts come from the configuration.
#[derive(Debug)]
pub struct VigiClient<T = HttpsTransport> {
    dispatcher: Dispatcher<T>,
}

impl VigiClient<HttpsTransport> {
    /// Builds the HTTPS transport and logs in.
    ///
    /// # Errors
    /// `ClientError::Config` for an unusable configuration,
    /// `ClientError::Transport` if the TLS client cannot be built, and
    /// `ClientError::Handshake` if login fails.
    pub async fn connect(config: DeviceConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let transport = HttpsTransport::new(&config)?;
        let mut client = Self::with_transport(config, transport);
        client.authenticate().await?;
        Ok(client)
    }
}

impl<T: DeviceTransport> VigiClient<T> {
    /// Wraps an existing transport without logging in.
    pub fn with_transport(config: DeviceConfig, transport: T) -> Self {
        Self {
            dispatcher: Dispatcher::new(Session::new(config), transport),
        }
    }

    /// Runs the login handshake, replacing any previous token on success.
    pub async fn authenticate(&mut self) -> Result<(), ClientError> {
        self.dispatcher.authenticate().await?;
        Ok(())
    }

    pub fn session(&self) -> &Session {
        self.dispatcher.session()
    }

    pub fn config(&self) -> &DeviceConfig {
        self.dispatcher.session().config()
    }

    pub fn dispatcher(&mut self) -> &mut Dispatcher<T> {
        &mut self.dispatcher
    }

    pub fn alarm(&mut self) -> AlarmController<'_, T> {
        AlarmController::new(&mut self.dispatcher)
    }

    pub fn assets(&mut self) -> AssetStore<'_, T> {
        AssetStore::new(&mut self.dispatcher)
    }

    /// Synchronizer starting at the configured base slot.
    pub fn synchronizer(&mut self) -> SlotSynchronizer<'_, T> {
        let base = self.config().defaults.base_slot;
        SlotSynchronizer::new(&mut self.dispatcher).with_base_slot(base)
    }

    /// Manual alarm with the configured default sound and volume.
    pub async fn trigger_default_alarm(&mut self, action: AlarmAction) -> Result<(), ClientError> {
        let defaults = self.config().defaults.clone();
        self.alarm()
            .trigger_manual_alarm(action, defaults.sound_id, i32::from(defaults.volume))
            .await?;
        Ok(())
    }

    pub async fn sync_audio<P: AsRef<Path>>(
        &mut self,
        candidates: &[P],
    ) -> Result<SyncReport, ClientError> {
        Ok(self.synchronizer().sync(candidates).await?)
    }

    pub async fn sync_converted_audio<C, P>(
        &mut self,
        converter: &C,
        sources: &[P],
    ) -> Result<SyncReport, ClientError>
    where
        C: AudioConverter + ?Sized,
        P: AsRef<Path>,
    {
        Ok(self.synchronizer().sync_converted(converter, sources).await?)
    }

    /// Stream target for a viewer, built from the session credentials.
    pub fn camera_stream(&self, port: u16, stream_path: &str) -> StreamTarget {
        let config = self.config();
        StreamTarget::new(&config.address, &config.username, &config.password)
            .with_port(port)
            .with_stream_path(stream_path)
    }

    pub fn into_parts(self) -> (Session, T) {
        self.dispatcher.into_parts()
    }
}
