use crate::store::CastingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: CastingStore,
}
