pub mod error;
pub mod news_cache;
pub mod sqlite;

pub use error::StoreError;
pub use news_cache::NewsCache;
pub use sqlite::Store;
