// Adapters layer: concrete implementations of the domain ports (store, storage, archive, notification).

pub mod archive;
pub mod notify;
pub mod sqlite;
pub mod storage;
