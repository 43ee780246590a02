pub mod blob_key;
pub mod content_hash;
pub mod error;
pub mod location;
