#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::{json, Value};

use vigi::handshake::transport::{DeviceTransport, TransportError, UploadFile};
use vigi::messages::AUTH_REQUIRED_CODE;
use vigi::DeviceConfig;

pub const NONCE: &str = "5d1f3b7a9c";
pub const TOKEN: &str = "3f8c1d9e0b2a";
pub const PASSWORD: &str = "Cam3ra!";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config() -> DeviceConfig {
    DeviceConfig::new("192.168.0.60", "admin", PASSWORD)
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub body: Option<Value>,
    pub file: Option<UploadFile>,
}

/// In-process camera: answers the handshake with a real RSA key and keeps a
/// custom audio slot table.
pub struct FakeCamera {
    key: RsaPrivateKey,
    pub slots: BTreeMap<u32, String>,
    pub requests: Vec<Recorded>,
    /// Plaintext of the last sealed login blob.
    pub login_plaintext: Option<String>,
    pub reject_login: bool,
    pub omit_token: bool,
    pub session_expired: bool,
    pub fail_transfer: BTreeSet<String>,
    pub fail_assign: BTreeSet<u32>,
    pub fail_command: Option<&'static str>,
    pending: Option<UploadFile>,
}

impl FakeCamera {
    pub fn new() -> Self {
        let key = RsaPrivateKey::from_pkcs8_pem(include_str!("device_key.pem"))
            .expect("test key parses");
        Self {
            key,
            slots: BTreeMap::new(),
            requests: Vec::new(),
            login_plaintext: None,
            reject_login: false,
            omit_token: false,
            session_expired: false,
            fail_transfer: BTreeSet::new(),
            fail_assign: BTreeSet::new(),
            fail_command: None,
            pending: None,
        }
    }

    pub fn with_slots(mut self, slots: &[(u32, &str)]) -> Self {
        for (id, name) in slots {
            self.slots.insert(*id, name.to_string());
        }
        self
    }

    pub fn paths(&self) -> Vec<&str> {
        self.requests.iter().map(|r| r.path.as_str()).collect()
    }

    /// Bodies sent to the command endpoint, in order.
    pub fn commands(&self) -> Vec<&Value> {
        self.requests
            .iter()
            .filter(|r| r.path.ends_with("/ds"))
            .filter_map(|r| r.body.as_ref())
            .collect()
    }

    pub fn uploads(&self) -> Vec<&UploadFile> {
        self.requests.iter().filter_map(|r| r.file.as_ref()).collect()
    }

    fn public_key_field(&self) -> String {
        let der = self
            .key
            .to_public_key()
            .to_public_key_der()
            .expect("public key encodes");
        urlencoding::encode(&STANDARD.encode(der.as_bytes())).into_owned()
    }

    fn handshake(&mut self, body: &Value) -> Value {
        if body.get("user_management").is_some() {
            return json!({
                "error_code": 0,
                "data": {"nonce": NONCE, "key": self.public_key_field()}
            });
        }
        let sealed = body["login"]["password"].as_str().unwrap_or_default();
        let plaintext = STANDARD
            .decode(sealed)
            .ok()
            .and_then(|blob| self.key.decrypt(Pkcs1v15Encrypt, &blob).ok())
            .and_then(|plain| String::from_utf8(plain).ok());
        self.login_plaintext = plaintext.clone();

        let expected = format!("{}:{}", vigi::crypto::credential_digest(PASSWORD), NONCE);
        if self.reject_login || plaintext.as_deref() != Some(expected.as_str()) {
            return json!({"error_code": -40210});
        }
        if self.omit_token {
            return json!({"error_code": 0});
        }
        self.session_expired = false;
        json!({"error_code": 0, "stok": TOKEN})
    }

    fn command(&mut self, body: &Value) -> Value {
        if let Some(module) = self.fail_command {
            if body.get(module).is_some() {
                return json!({"error_code": -40101});
            }
        }
        if let Some(assign) = body.pointer("/system/upload_usr_def_audio") {
            let id = assign["id"].as_u64().unwrap_or_default() as u32;
            if self.fail_assign.contains(&id) || self.pending.take().is_none() {
                return json!({"error_code": -72101});
            }
            let name = assign["name"].as_str().unwrap_or_default().to_string();
            self.slots.insert(id, name);
            return json!({"error_code": 0});
        }
        if let Some(module) = body.get("usr_def_audio_alarm") {
            if module.get("table").is_some() {
                let entries: Vec<Value> = self
                    .slots
                    .iter()
                    .enumerate()
                    .map(|(i, (id, name))| {
                        let mut entry = serde_json::Map::new();
                        entry.insert(
                            format!("usr_def_audio_{}", i + 1),
                            json!({"id": id.to_string(), "name": urlencoding::encode(name)}),
                        );
                        Value::Object(entry)
                    })
                    .collect();
                return json!({
                    "error_code": 0,
                    "usr_def_audio_alarm": {"usr_def_audio": entries}
                });
            }
            if let Some(delete) = module.get("delete_audio") {
                for id in delete["id"].as_array().into_iter().flatten() {
                    if let Some(id) = id.as_u64() {
                        self.slots.remove(&(id as u32));
                    }
                }
                return json!({"error_code": 0});
            }
            if let Some(modify) = module.get("modify_audio") {
                let id = modify["id"][0].as_u64().unwrap_or_default() as u32;
                let name = modify["name"][0].as_str().unwrap_or_default().to_string();
                return match self.slots.get_mut(&id) {
                    Some(slot) => {
                        *slot = name;
                        json!({"error_code": 0})
                    }
                    None => json!({"error_code": -72102}),
                };
            }
        }
        json!({"error_code": 0})
    }

    fn authorized(&self, path: &str) -> bool {
        !self.session_expired && path.starts_with(&format!("/stok={}/", TOKEN))
    }
}

#[async_trait]
impl DeviceTransport for FakeCamera {
    async fn post_json(
        &mut self,
        path: &str,
        body: &Value,
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.requests.push(Recorded {
            path: path.to_string(),
            body: Some(body.clone()),
            file: None,
        });
        if path == "/" {
            return Ok(self.handshake(body));
        }
        if !self.authorized(path) {
            return Ok(json!({ "error_code": AUTH_REQUIRED_CODE }));
        }
        Ok(self.command(body))
    }

    async fn post_file(
        &mut self,
        path: &str,
        file: UploadFile,
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.requests.push(Recorded {
            path: path.to_string(),
            body: None,
            file: Some(file.clone()),
        });
        if !self.authorized(path) {
            return Ok(json!({ "error_code": AUTH_REQUIRED_CODE }));
        }
        if self.fail_transfer.contains(&file.file_name) {
            return Ok(json!({"error_code": -72100}));
        }
        self.pending = Some(file);
        Ok(json!({"error_code": 0}))
    }
}

/// Replays canned replies in order and records what was sent.
pub struct ScriptedTransport {
    replies: VecDeque<Result<Value, TransportError>>,
    pub sent: Vec<(String, Value)>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<Value, TransportError>>) -> Self {
        Self {
            replies: replies.into(),
            sent: Vec::new(),
        }
    }

    fn next(&mut self) -> Result<Value, TransportError> {
        self.replies
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("script exhausted".into())))
    }
}

#[async_trait]
impl DeviceTransport for ScriptedTransport {
    async fn post_json(
        &mut self,
        path: &str,
        body: &Value,
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.sent.push((path.to_string(), body.clone()));
        self.next()
    }

    async fn post_file(
        &mut self,
        path: &str,
        file: UploadFile,
        _timeout: Duration,
    ) -> Result<Value, TransportError> {
        self.sent.push((path.to_string(), json!({ "file": file.file_name })));
        self.next()
    }
}
