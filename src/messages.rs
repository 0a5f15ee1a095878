//! JSON command envelope and response wrapper.
//!
//! Requests look like `{"<module>": {"<action>": params}, "method": "get"|"set"|"do"}`;
//! responses carry an `error_code` plus whatever modules the command returned.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Device-side code for an expired or unknown session token.
pub const AUTH_REQUIRED_CODE: i64 = -40401;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Set,
    Do,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Set => "set",
            Method::Do => "do",
        }
    }
}

/// One device operation, built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPayload {
    method: Method,
    modules: Map<String, Value>,
}

impl CommandPayload {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            modules: Map::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::Get)
    }

    pub fn set() -> Self {
        Self::new(Method::Set)
    }

    pub fn exec() -> Self {
        Self::new(Method::Do)
    }

    /// Adds `params` under `module.action`, merging with earlier actions on the same module.
    pub fn with(mut self, module: &str, action: &str, params: Value) -> Self {
        let entry = self
            .modules
            .entry(module.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(actions) = entry {
            actions.insert(action.to_string(), params);
        } else {
            let mut actions = Map::new();
            actions.insert(action.to_string(), params);
            *entry = Value::Object(actions);
        }
        self
    }

    /// Sets a module's whole body, for commands without an action level (`login`).
    pub fn with_module(mut self, module: &str, body: Value) -> Self {
        self.modules.insert(module.to_string(), body);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn module(&self, name: &str) -> Option<&Value> {
        self.modules.get(name)
    }

    pub fn to_value(&self) -> Value {
        let mut body = self.modules.clone();
        body.insert("method".into(), Value::String(self.method.as_str().into()));
        Value::Object(body)
    }
}

impl Serialize for CommandPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Parsed response body. The dispatcher hands it back untouched; callers
/// decide what a given `error_code` means.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceResponse {
    body: Value,
}

impl DeviceResponse {
    pub fn new(body: Value) -> Self {
        Self { body }
    }

    /// The device sends the code as a number or a numeric string.
    pub fn error_code(&self) -> Option<i64> {
        match self.body.get("error_code")? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error_code() == Some(0)
    }

    pub fn requires_auth(&self) -> bool {
        self.error_code() == Some(AUTH_REQUIRED_CODE)
    }

    /// Non-empty `stok` field of a login reply.
    pub fn stok(&self) -> Option<&str> {
        self.body
            .get("stok")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn module(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }
}
