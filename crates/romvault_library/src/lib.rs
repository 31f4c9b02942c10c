//! Storage-facing services for a ROM library.
//!
//! Every manager is generic over a [`StorageBackend`] and a [`RecordStore`]
//! and holds its own clone of each, so a [`Library`] can be built once at
//! startup and shared across request handlers.

mod cleanup;
mod download;
mod duplicates;
mod lifecycle;
mod records;
mod saves;
mod versions;

pub use download::{AssetDownload, DownloadReference};
pub use duplicates::{DuplicateDetector, DuplicateGroup, TitleMatch};
pub use lifecycle::{AssetLifecycle, BiosFileStatus, BiosStatus, BiosUpload, RomUpload};
pub use records::AssetRecords;
pub use saves::{SaveRequest, SaveSlots};
pub use versions::{ServedRom, VersionSelector, VersionUpload};

use romvault_core::prelude::*;

#[derive(Clone)]
pub struct Library<S: StorageBackend, R: RecordStore> {
    pub assets: AssetLifecycle<S, R>,
    pub versions: VersionSelector<S, R>,
    pub saves: SaveSlots<S, R>,
    pub duplicates: DuplicateDetector<R>,
}

impl<S: StorageBackend, R: RecordStore> Library<S, R> {
    pub fn new(storage: S, records: R, config: &LibraryConfig) -> Self {
        Self {
            assets: AssetLifecycle::new(storage.clone(), records.clone(), config),
            versions: VersionSelector::new(storage.clone(), records.clone(), config),
            saves: SaveSlots::new(storage, records.clone()),
            duplicates: DuplicateDetector::new(records),
        }
    }

    pub fn with_title_match(mut self, mode: TitleMatch) -> Self {
        self.duplicates = self.duplicates.with_mode(mode);
        self
    }
}
