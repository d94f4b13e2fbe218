//! Safe SQL builder: identifiers come from validated descriptors only,
//! values are always bound as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
