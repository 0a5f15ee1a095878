//! Custom audio resources stored in numbered device slots.
//!
//! Uploads happen in two phases: the raw file goes to a temporary area on
//! the device (`PendingUpload`), then a confirm command assigns it to a slot
//! and name (`AssignedAudio`). Either phase can fail on its own.

use std::path::Path;

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::control::{CommandError, Dispatcher};
use crate::handshake::transport::{DeviceTransport, UploadFile};
use crate::messages::{CommandPayload, DeviceResponse};

pub type SlotId = u32;

/// Session-scoped path of the raw transfer endpoint.
pub const UPLOAD_PATH: &str = "/admin/system/upload_usr_def_audio";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioRecord {
    pub id: SlotId,
    pub name: String,
}

/// Unwraps `usr_def_audio_alarm.usr_def_audio`, a list of single-key objects
/// (`{"file_1": {...}}`) whose keys carry no meaning.
///
/// A missing or malformed list decodes to nothing; entries without a usable
/// id are skipped.
pub fn decode_audio_table(body: &Value) -> Vec<AudioRecord> {
    body.get("usr_def_audio_alarm")
        .and_then(|module| module.get("usr_def_audio"))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(unwrap_record).collect())
        .unwrap_or_default()
}

fn unwrap_record(entry: &Value) -> Option<AudioRecord> {
    let inner = entry.as_object()?.values().next()?;
    let id = match inner.get("id")? {
        Value::Number(n) => n.as_u64().and_then(|id| SlotId::try_from(id).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    let raw_name = inner.get("name").and_then(Value::as_str).unwrap_or_default();
    let name = urlencoding::decode(raw_name)
        .map(|name| name.into_owned())
        .unwrap_or_else(|_| raw_name.to_string());
    Some(AudioRecord { id, name })
}

pub fn list_command() -> CommandPayload {
    CommandPayload::get().with_module("usr_def_audio_alarm", json!({ "table": ["usr_def_audio"] }))
}

pub fn assign_command(slot: SlotId, name: &str) -> CommandPayload {
    CommandPayload::exec().with(
        "system",
        "upload_usr_def_audio",
        json!({ "id": slot, "name": name }),
    )
}

pub fn delete_command(slots: &[SlotId]) -> CommandPayload {
    CommandPayload::exec().with("usr_def_audio_alarm", "delete_audio", json!({ "id": slots }))
}

/// The device wants both fields as arrays even for one entry.
pub fn rename_command(slot: SlotId, name: &str) -> CommandPayload {
    CommandPayload::exec().with(
        "usr_def_audio_alarm",
        "modify_audio",
        json!({ "id": [slot], "name": [name] }),
    )
}

/// Display name for an upload: the file name without its extension.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("transferring {file} failed: {source}")]
    Transfer {
        file: String,
        #[source]
        source: CommandError,
    },
    #[error("assigning upload to slot {slot} failed: {source}")]
    Assign {
        slot: SlotId,
        #[source]
        source: CommandError,
    },
}

impl UploadError {
    pub fn command_error(&self) -> &CommandError {
        match self {
            UploadError::Transfer { source, .. } | UploadError::Assign { source, .. } => source,
        }
    }
}

/// File accepted by the transfer endpoint but not yet bound to a slot.
#[derive(Debug)]
#[must_use = "a pending upload is discarded by the device unless assigned"]
pub struct PendingUpload {
    slot: SlotId,
    name: String,
    file_name: String,
    transfer: DeviceResponse,
}

impl PendingUpload {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn transfer_response(&self) -> &DeviceResponse {
        &self.transfer
    }

    pub async fn assign<T: DeviceTransport>(
        self,
        dispatcher: &mut Dispatcher<T>,
    ) -> Result<AssignedAudio, UploadError> {
        dispatcher
            .execute(&assign_command(self.slot, &self.name))
            .await
            .map_err(|source| UploadError::Assign {
                slot: self.slot,
                source,
            })?;
        info!(slot = self.slot, name = %self.name, "audio assigned");
        Ok(AssignedAudio {
            slot: self.slot,
            name: self.name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedAudio {
    pub slot: SlotId,
    pub name: String,
}

pub struct AssetStore<'a, T> {
    dispatcher: &'a mut Dispatcher<T>,
}

impl<'a, T: DeviceTransport> AssetStore<'a, T> {
    pub fn new(dispatcher: &'a mut Dispatcher<T>) -> Self {
        Self { dispatcher }
    }

    /// Fetches the authoritative slot table. Nothing is cached.
    pub async fn list(&mut self) -> Result<Vec<AudioRecord>, CommandError> {
        let response = self.dispatcher.execute(&list_command()).await?;
        let records = decode_audio_table(response.body());
        debug!(count = records.len(), "custom audio listed");
        Ok(records)
    }

    /// Phase one: reads `path` and posts it to the transfer endpoint.
    pub async fn transfer(
        &mut self,
        path: &Path,
        slot: SlotId,
        name: Option<&str>,
    ) -> Result<PendingUpload, UploadError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let transfer_err = |source: CommandError| UploadError::Transfer {
            file: file_name.clone(),
            source,
        };

        if self.dispatcher.session().token().is_none() {
            return Err(transfer_err(
                crate::control::DispatchError::NotAuthenticated.into(),
            ));
        }
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| transfer_err(e.into()))?;
        let name = name.map(str::to_string).unwrap_or_else(|| display_name(path));

        let response = self
            .dispatcher
            .send_file(
                UPLOAD_PATH,
                UploadFile {
                    file_name: file_name.clone(),
                    bytes,
                },
            )
            .await
            .map_err(|e| transfer_err(e.into()))?;
        if !response.is_ok() {
            let code = response.error_code();
            return Err(transfer_err(CommandError::Device { code, response }));
        }
        debug!(slot, file = %file_name, "file transferred");
        Ok(PendingUpload {
            slot,
            name,
            file_name,
            transfer: response,
        })
    }

    /// Both phases; the name defaults to the file stem.
    pub async fn upload(
        &mut self,
        path: &Path,
        slot: SlotId,
        name: Option<&str>,
    ) -> Result<AssignedAudio, UploadError> {
        let pending = self.transfer(path, slot, name).await?;
        pending.assign(&mut *self.dispatcher).await
    }

    /// Deleting nothing succeeds without contacting the device.
    pub async fn delete(&mut self, slots: &[SlotId]) -> Result<(), CommandError> {
        if slots.is_empty() {
            debug!("no slots to delete");
            return Ok(());
        }
        self.dispatcher.execute(&delete_command(slots)).await?;
        info!(?slots, "custom audio deleted");
        Ok(())
    }

    pub async fn rename(&mut self, slot: SlotId, new_name: &str) -> Result<(), CommandError> {
        if new_name.is_empty() {
            return Err(CommandError::Precondition("new name is empty".into()));
        }
        self.dispatcher.execute(&rename_command(slot, new_name)).await?;
        info!(slot, name = new_name, "custom audio renamed");
        Ok(())
    }
}
