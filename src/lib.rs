pub use romvault_core::*;

pub mod library {
    pub use romvault_library::*;
}

#[cfg(feature = "server")]
pub mod server {
    pub use romvault_server::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use romvault_client::*;
}

#[cfg(feature = "fs")]
pub mod fs {
    pub use romvault_fs::*;
}

#[cfg(feature = "memory")]
pub mod memory {
    pub use romvault_memory::*;
}

#[cfg(feature = "mock_auth")]
pub mod auth_mock {
    pub use romvault_auth_mock::*;
}

#[cfg(feature = "s3")]
pub mod s3 {
    pub use romvault_s3::*;
}

#[cfg(feature = "opendal")]
pub mod opendal {
    pub use romvault_opendal::*;
}

pub mod prelude {
    pub use romvault_core::prelude::*;
    pub use romvault_library::{
        AssetLifecycle, DownloadReference, DuplicateDetector, Library, SaveSlots, TitleMatch,
        VersionSelector,
    };

    #[cfg(feature = "server")]
    pub use romvault_server::prelude::*;

    #[cfg(feature = "client")]
    pub use romvault_client::{RomMeta, RomvaultClient};

    #[cfg(feature = "fs")]
    pub use romvault_fs::FileSystemStorage;

    #[cfg(feature = "memory")]
    pub use romvault_memory::{MemoryRecords, MemoryStorage};

    #[cfg(feature = "mock_auth")]
    pub use romvault_auth_mock::AllowAllAuth;

    #[cfg(feature = "s3")]
    pub use romvault_s3::S3Storage;

    #[cfg(feature = "opendal")]
    pub use romvault_opendal::OpendalStorage;
}
