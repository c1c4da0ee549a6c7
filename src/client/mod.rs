//! Backing store implementations over HTTP
//!
//! Only compiled with the `http` feature.

mod http_store;

pub use http_store::{HttpBackingStore, HttpStoreConfig};
