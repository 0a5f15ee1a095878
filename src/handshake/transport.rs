use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{ring, verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::DeviceConfig;

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
/// Multipart field the upload endpoint reads the file from.
pub const UPLOAD_FIELD: &str = "filename";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("http status {0} with non-json body")]
    Status(u16),
    #[error("decode: {0}")]
    Decode(String),
    #[error("tls: {0}")]
    Tls(String),
    #[error("http: {0}")]
    Http(String),
}

/// File content for the multipart upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Request/response seam between the protocol engine and the wire.
///
/// Paths are absolute (`/`, `/stok=.../ds`). Implementations return the
/// parsed JSON body whatever the device-level `error_code` says.
#[async_trait]
pub trait DeviceTransport: Send {
    async fn post_json(
        &mut self,
        path: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError>;

    async fn post_file(
        &mut self,
        path: &str,
        file: UploadFile,
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// JSON-over-HTTPS transport for the camera's control port.
#[derive(Debug, Clone)]
pub struct HttpsTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpsTransport {
    pub fn new(config: &DeviceConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .use_preconfigured_tls(device_tls_config()?)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json(
        response: reqwest::Response,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| map_reqwest(e, timeout))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            if status.is_success() {
                TransportError::Decode(e.to_string())
            } else {
                TransportError::Status(status.as_u16())
            }
        })
    }
}

#[async_trait]
impl DeviceTransport for HttpsTransport {
    async fn post_json(
        &mut self,
        path: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let payload =
            serde_json::to_vec(body).map_err(|e| TransportError::Decode(e.to_string()))?;
        let response = self
            .http
            .post(self.url(path))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(e, timeout))?;
        debug!(status = response.status().as_u16(), "control reply");
        Self::read_json(response, timeout).await
    }

    async fn post_file(
        &mut self,
        path: &str,
        file: UploadFile,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let size = file.bytes.len();
        let part = Part::bytes(file.bytes)
            .file_name(file.file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::Http(e.to_string()))?;
        let form = Form::new().part(UPLOAD_FIELD, part);
        let response = self
            .http
            .post(self.url(path))
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest(e, timeout))?;
        debug!(status = response.status().as_u16(), bytes = size, "upload reply");
        Self::read_json(response, timeout).await
    }
}

/// Command URLs carry the session token, so the URL is stripped before the
/// error text is kept.
fn map_reqwest(err: reqwest::Error, timeout: Duration) -> TransportError {
    let err = err.without_url();
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Http(err.to_string())
    }
}

/// TLS 1.2 with a single AES-256-GCM suite. The camera presents a
/// self-signed certificate for a raw IP, so chain and name checks are
/// skipped; handshake signatures are still verified.
pub fn device_tls_config() -> Result<ClientConfig, TransportError> {
    let provider = CryptoProvider {
        cipher_suites: vec![ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384],
        ..ring::default_provider()
    };
    let verifier = DeviceCertVerifier {
        algorithms: provider.signature_verification_algorithms,
    };
    let config = ClientConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&[&rustls::version::TLS12])
        .map_err(|e| TransportError::Tls(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(config)
}

#[derive(Debug)]
struct DeviceCertVerifier {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for DeviceCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}
