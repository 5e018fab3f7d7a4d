pub mod category;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod item;

pub use category::Category;
pub use error::ItemError;
pub use fingerprint::{content_digest, fingerprint};
pub use hash::{Hash32, ItemFingerprint};
pub use item::NewsItem;
