//! Testing utilities and fake implementations of the ports.
//!
//! Everything here runs in-process, so unit and integration tests can drive
//! the whole job lifecycle without an object store or a conversion service.
//!
//! # Example
//!
//! ```rust,ignore
//! use docshift_core::testing::{MockConverter, fixtures};
//!
//! let converter = MockConverter::echoing();
//! let input = fixtures::pptx_bytes("deck-1");
//! ```

mod failing_store;
mod mock_converter;

pub use failing_store::{FailingStore, StoreOp};
pub use mock_converter::{ECHO_PREFIX, MockConverter};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// Fake presentation payload: a zip magic number followed by `label`,
    /// so each test input is distinguishable.
    pub fn pptx_bytes(label: &str) -> Vec<u8> {
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend_from_slice(label.as_bytes());
        bytes
    }
}
