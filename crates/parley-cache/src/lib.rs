pub mod cache;
pub mod record;

pub use cache::{CacheEvent, NormalizedCache};
pub use record::{EntityKey, EntityKind, Record};
