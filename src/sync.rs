//! Fills empty audio slots from an ordered list of candidate files.
//!
//! Candidate `i` targets slot `base + i`. Occupied slots are never written,
//! so running a sync twice changes nothing the second time. The first failed
//! upload stops the run; slots filled before it stay filled.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::assets::{display_name, AssetStore, AssignedAudio, SlotId, UploadError};
use crate::codec::{AudioConverter, ConvertError};
use crate::control::{CommandError, Dispatcher};
use crate::handshake::transport::DeviceTransport;

pub const DEFAULT_BASE_SLOT: SlotId = 101;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Slots present on the device before the run.
    pub occupied: BTreeSet<SlotId>,
    pub uploaded: Vec<AssignedAudio>,
    pub skipped: Vec<SlotId>,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("listing existing audio failed: {0}")]
    Listing(#[source] CommandError),
    #[error("candidate {index} has no slot above {base}")]
    SlotOverflow { base: SlotId, index: usize },
    #[error("upload to slot {slot} failed; remaining candidates not attempted")]
    Upload {
        slot: SlotId,
        report: SyncReport,
        #[source]
        source: UploadError,
    },
    #[error("converting {path} failed: {source}")]
    Convert {
        path: PathBuf,
        #[source]
        source: ConvertError,
    },
}

pub struct SlotSynchronizer<'a, T> {
    dispatcher: &'a mut Dispatcher<T>,
    base_slot: SlotId,
}

impl<'a, T: DeviceTransport> SlotSynchronizer<'a, T> {
    pub fn new(dispatcher: &'a mut Dispatcher<T>) -> Self {
        Self {
            dispatcher,
            base_slot: DEFAULT_BASE_SLOT,
        }
    }

    pub fn with_base_slot(mut self, base_slot: SlotId) -> Self {
        self.base_slot = base_slot;
        self
    }

    pub async fn sync<P: AsRef<Path>>(&mut self, candidates: &[P]) -> Result<SyncReport, SyncError> {
        let mut store = AssetStore::new(&mut *self.dispatcher);
        let occupied: BTreeSet<SlotId> = store
            .list()
            .await
            .map_err(SyncError::Listing)?
            .into_iter()
            .map(|record| record.id)
            .collect();
        info!(?occupied, candidates = candidates.len(), "starting slot sync");

        let mut report = SyncReport {
            occupied,
            ..SyncReport::default()
        };
        for (index, candidate) in candidates.iter().enumerate() {
            let slot = u32::try_from(index)
                .ok()
                .and_then(|offset| self.base_slot.checked_add(offset))
                .ok_or(SyncError::SlotOverflow {
                    base: self.base_slot,
                    index,
                })?;
            if report.occupied.contains(&slot) {
                report.skipped.push(slot);
                continue;
            }

            let path = candidate.as_ref();
            let name = display_name(path);
            match store.upload(path, slot, Some(&name)).await {
                Ok(assigned) => report.uploaded.push(assigned),
                Err(source) => {
                    warn!(slot, error = %source, "slot sync stopped");
                    return Err(SyncError::Upload {
                        slot,
                        report,
                        source,
                    });
                }
            }
        }
        info!(
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            "slot sync complete"
        );
        Ok(report)
    }

    /// Converts every source first, then syncs the converted files. A
    /// conversion failure aborts before anything is uploaded.
    pub async fn sync_converted<C, P>(
        &mut self,
        converter: &C,
        sources: &[P],
    ) -> Result<SyncReport, SyncError>
    where
        C: AudioConverter + ?Sized,
        P: AsRef<Path>,
    {
        let mut converted = Vec::with_capacity(sources.len());
        for source in sources {
            let path = source.as_ref();
            let output = converter
                .convert(path)
                .await
                .map_err(|source| SyncError::Convert {
                    path: path.to_path_buf(),
                    source,
                })?;
            converted.push(output);
        }
        self.sync(converted.as_slice()).await
    }
}
