//! Entity descriptors: declarative definitions resolved into immutable
//! per-type metadata at registration time.

pub mod resolved;
pub mod types;

pub use resolved::*;
pub use types::*;
