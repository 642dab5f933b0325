//! Adapters - ports の具体実装
//!
//! - [`InMemoryObjectStore`]: tests and single-process development
//! - [`LocalObjectStore`]: a directory on disk
//! - [`UnoserverConverter`]: the Unoserver HTTP endpoint
//! - [`UrlSigner`]: signed retrieval URLs shared by the stores

mod local_store;
mod memory_store;
mod signer;
mod unoserver;

pub use local_store::LocalObjectStore;
pub use memory_store::InMemoryObjectStore;
pub use signer::UrlSigner;
pub use unoserver::UnoserverConverter;
