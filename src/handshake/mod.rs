//! Two-request login: fetch nonce and RSA key, then submit the sealed credential.

use rand::rngs::OsRng;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::crypto::{credential_digest, decode_public_key, seal_login_blob, CryptoError};
use crate::messages::{CommandPayload, DeviceResponse};
use crate::session::{Session, SessionToken};

pub mod transport;
use transport::{DeviceTransport, TransportError};

/// Unauthenticated endpoint for both handshake requests.
pub const HANDSHAKE_PATH: &str = "/";

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("protocol: {0}")]
    Protocol(String),
    #[error("crypto: {0}")]
    Crypto(#[from] CryptoError),
    #[error("login rejected with error_code {code:?}")]
    Rejected { code: Option<i64> },
    #[error("login reply carried no session token")]
    MissingToken,
}

/// Nonce and public key returned by `get_encrypt_info`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EncryptInfo {
    pub nonce: String,
    pub key: String,
}

impl EncryptInfo {
    pub fn from_response(body: &Value) -> Result<Self, HandshakeError> {
        let data = body
            .get("data")
            .ok_or_else(|| HandshakeError::Protocol("encrypt info reply has no data".into()))?;
        let info: EncryptInfo = serde_json::from_value(data.clone())
            .map_err(|e| HandshakeError::Protocol(format!("encrypt info: {}", e)))?;
        if info.nonce.is_empty() || info.key.is_empty() {
            return Err(HandshakeError::Protocol("encrypt info has empty nonce or key".into()));
        }
        Ok(info)
    }
}

pub fn encrypt_info_request() -> CommandPayload {
    CommandPayload::exec().with("user_management", "get_encrypt_info", Value::Null)
}

pub fn login_request(username: &str, sealed_password: &str) -> CommandPayload {
    CommandPayload::exec().with_module(
        "login",
        json!({
            "username": username,
            "password": sealed_password,
            "passwdType": "md5",
            "encrypt_type": "2",
        }),
    )
}

/// Client side of the login exchange. Performs no retries.
pub struct ClientHandshake<'a> {
    config: &'a DeviceConfig,
}

impl<'a> ClientHandshake<'a> {
    pub fn new(config: &'a DeviceConfig) -> Self {
        Self { config }
    }

    pub async fn run<T>(&self, transport: &mut T) -> Result<SessionToken, HandshakeError>
    where
        T: DeviceTransport + ?Sized,
    {
        let timeout = self.config.control_timeout();
        let challenge = transport
            .post_json(HANDSHAKE_PATH, &encrypt_info_request().to_value(), timeout)
            .await?;
        let info = EncryptInfo::from_response(&challenge)?;
        debug!("received encryption parameters");

        let sealed = {
            let digest = credential_digest(&self.config.password);
            let key = decode_public_key(&info.key)?;
            seal_login_blob(&mut OsRng, &digest, &info.nonce, &key)?
        };

        let reply = transport
            .post_json(
                HANDSHAKE_PATH,
                &login_request(&self.config.username, &sealed).to_value(),
                timeout,
            )
            .await?;
        let reply = DeviceResponse::new(reply);
        match (reply.error_code(), reply.stok()) {
            (Some(0), Some(stok)) => Ok(SessionToken::new(stok)),
            (Some(0), None) => {
                warn!("login accepted without a token");
                Err(HandshakeError::MissingToken)
            }
            (code, _) => {
                warn!(code = ?code, "login rejected");
                Err(HandshakeError::Rejected { code })
            }
        }
    }
}

/// Runs the handshake and installs the token on success. On failure the
/// session is left as it was.
pub async fn authenticate<T>(
    session: &mut Session,
    transport: &mut T,
) -> Result<SessionToken, HandshakeError>
where
    T: DeviceTransport + ?Sized,
{
    let token = ClientHandshake::new(session.config()).run(transport).await?;
    session.install_token(token.clone());
    info!(user = %session.config().username, "authenticated");
    Ok(token)
}
