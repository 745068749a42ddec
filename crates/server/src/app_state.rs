use server_api::ApiContext;
use storage::Storage;

use crate::templates::Templates;

pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) storage: Storage,
    pub(crate) templates: Templates,
}
