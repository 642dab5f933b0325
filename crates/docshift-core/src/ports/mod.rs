//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」を定義します。
//! The object store and the conversion service are external collaborators;
//! the core only talks to them through these traits, so tests swap in fakes.

pub mod clock;
pub mod converter;
pub mod key_generator;
pub mod object_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::converter::{ConversionError, Converter};
pub use self::key_generator::{KeyGenerator, UlidKeyGenerator, sanitize_base_name};
pub use self::object_store::{
    ObjectEntry, ObjectStore, StoreError, attachment_disposition, validate_key,
};
