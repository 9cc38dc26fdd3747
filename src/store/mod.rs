pub mod storage;

pub use storage::{AssetStore, StoredFile};
