use thiserror::Error;
use tracing::{debug, warn};

use crate::handshake::transport::{DeviceTransport, TransportError, UploadFile};
use crate::handshake::{self, HandshakeError};
use crate::messages::{CommandPayload, DeviceResponse};
use crate::session::{Session, SessionToken};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no session token; authenticate first")]
    NotAuthenticated,
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

/// Failure of a single device operation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Rejected locally; nothing was sent.
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Well-formed reply with a non-zero (or missing) `error_code`.
    #[error("device rejected command with error_code {code:?}")]
    Device {
        code: Option<i64>,
        response: DeviceResponse,
    },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub fn device_code(&self) -> Option<i64> {
        match self {
            CommandError::Device { code, .. } => *code,
            _ => None,
        }
    }

    /// Reply body kept for diagnostics when the device refused the command.
    pub fn response(&self) -> Option<&DeviceResponse> {
        match self {
            CommandError::Device { response, .. } => Some(response),
            _ => None,
        }
    }
}

/// Sends commands on the session-scoped endpoint, one at a time.
///
/// This is the only component that builds wire paths. Replies are returned
/// as parsed JSON; the one code it reacts to is the expired-session code,
/// which drops the token.
#[derive(Debug)]
pub struct Dispatcher<T> {
    transport: T,
    session: Session,
}

impl<T> Dispatcher<T> {
    pub fn new(session: Session, transport: T) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_parts(self) -> (Session, T) {
        (self.session, self.transport)
    }

    fn scoped_path(&self, suffix: &str) -> Result<String, DispatchError> {
        let token = self
            .session
            .token()
            .ok_or(DispatchError::NotAuthenticated)?;
        Ok(format!("/stok={}{}", token.as_str(), suffix))
    }

    fn observe(&mut self, response: &DeviceResponse) {
        if response.requires_auth() {
            self.session.invalidate();
        }
    }
}

impl<T: DeviceTransport> Dispatcher<T> {
    pub async fn authenticate(&mut self) -> Result<SessionToken, HandshakeError> {
        handshake::authenticate(&mut self.session, &mut self.transport).await
    }

    pub async fn send(&mut self, payload: &CommandPayload) -> Result<DeviceResponse, DispatchError> {
        let path = self.scoped_path("/ds")?;
        let timeout = self.session.config().control_timeout();
        debug!(method = payload.method().as_str(), "sending command");
        let body = self
            .transport
            .post_json(&path, &payload.to_value(), timeout)
            .await?;
        let response = DeviceResponse::new(body);
        self.observe(&response);
        Ok(response)
    }

    /// Multipart POST to a session-scoped path such as `/admin/system/upload_usr_def_audio`.
    pub async fn send_file(
        &mut self,
        suffix: &str,
        file: UploadFile,
    ) -> Result<DeviceResponse, DispatchError> {
        let path = self.scoped_path(suffix)?;
        let timeout = self.session.config().upload_timeout();
        debug!(file = %file.file_name, bytes = file.bytes.len(), "uploading file");
        let body = self.transport.post_file(&path, file, timeout).await?;
        let response = DeviceResponse::new(body);
        self.observe(&response);
        Ok(response)
    }

    /// `send` plus the `error_code == 0` check every set/do operation shares.
    pub async fn execute(&mut self, payload: &CommandPayload) -> Result<DeviceResponse, CommandError> {
        let response = self.send(payload).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            let code = response.error_code();
            warn!(code = ?code, "device rejected command");
            Err(CommandError::Device { code, response })
        }
    }
}
