mod load;
mod save;

pub(crate) use load::{apply_persisted_session, parse_persisted_session};
pub(crate) use save::to_persisted_session;
