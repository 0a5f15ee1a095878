//! Credential hashing and login blob sealing for the device handshake.
//!
//! Both functions are pure: the digest depends only on the password, and the
//! sealed blob only on (digest, nonce, public key) plus the padding RNG.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use thiserror::Error;

/// Vendor constant prepended to the password before hashing.
const CREDENTIAL_PREFIX: &str = "TPCQ75NF2Y:";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("public key encoding: {0}")]
    KeyEncoding(String),
    #[error("public key: {0}")]
    InvalidKey(String),
    #[error("encrypt: {0}")]
    Encrypt(String),
}

/// Uppercase hex MD5 of the vendor prefix followed by the raw password.
pub fn credential_digest(password: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(CREDENTIAL_PREFIX.as_bytes());
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{:02X}", byte)).collect()
}

/// Decodes the `key` field of the encryption-info reply.
///
/// The device sends base64 DER, sometimes percent-encoded. SubjectPublicKeyInfo
/// is tried first, then a bare PKCS#1 `RSAPublicKey`.
pub fn decode_public_key(encoded: &str) -> Result<RsaPublicKey, CryptoError> {
    let unquoted =
        urlencoding::decode(encoded).map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
    let der = STANDARD
        .decode(unquoted.trim().as_bytes())
        .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Encrypts `digest:nonce` with PKCS#1 v1.5 padding and returns it base64 encoded.
pub fn seal_login_blob<R>(
    rng: &mut R,
    digest: &str,
    nonce: &str,
    key: &RsaPublicKey,
) -> Result<String, CryptoError>
where
    R: CryptoRng + RngCore,
{
    let plaintext = format!("{}:{}", digest, nonce);
    let sealed = key
        .encrypt(rng, Pkcs1v15Encrypt, plaintext.as_bytes())
        .map_err(|e| CryptoError::Encrypt(e.to_string()))?;
    Ok(STANDARD.encode(sealed))
}
