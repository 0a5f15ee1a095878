//! Session-authenticated control client for VIGI IP cameras.
//!
//! Covers the RSA-sealed login handshake, the token-scoped JSON command
//! dispatcher, alarm and speaker control, and custom audio management
//! (two-phase upload, list, delete, rename, and idempotent slot sync).
//! Video viewing and audio transcoding stay outside and are reached through
//! the `VideoStream` and `AudioConverter` traits.

pub mod alarm;
pub mod assets;
pub mod codec;
pub mod config;
pub mod control;
pub mod crypto;
pub mod handshake;
pub mod messages;
pub mod sdk;
pub mod session;
pub mod stream;
pub mod sync;

pub use alarm::{AlarmAction, AlarmBaseline, AlarmController};
pub use assets::{AssetStore, AssignedAudio, AudioRecord, PendingUpload, SlotId, UploadError};
pub use codec::{AudioConverter, ConvertError, FfmpegConverter};
pub use config::{AlarmDefaults, ConfigError, DeviceConfig};
pub use control::{CommandError, DispatchError, Dispatcher};
pub use handshake::transport::{DeviceTransport, HttpsTransport, TransportError, UploadFile};
pub use handshake::{ClientHandshake, HandshakeError};
pub use messages::{CommandPayload, DeviceResponse, Method};
pub use sdk::{ClientError, VigiClient};
pub use session::state::SessionState;
pub use session::{Session, SessionToken};
pub use stream::{StreamTarget, VideoStream};
pub use sync::{SlotSynchronizer, SyncError, SyncReport};
