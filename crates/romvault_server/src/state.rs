use romvault_core::traits::{AuthProvider, RecordStore, StorageBackend};
use romvault_library::Library;

#[derive(Clone)]
pub struct AppState<S: StorageBackend, R: RecordStore, A: AuthProvider> {
    pub library: Library<S, R>,
    pub auth: A,
}
