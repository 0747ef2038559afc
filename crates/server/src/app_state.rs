use crate::api::ApiContext;
use storage::Storage;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    /// Kept alongside the store for liveness probes.
    pub(crate) storage: Storage,
}
