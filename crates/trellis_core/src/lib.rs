//! # trellis_core - Trellis Core
//!
//! Tree-independent primitives shared by the component crates:
//! - **Handles**: generational indices addressing arena-owned nodes
//! - **Errors**: the single error taxonomy every operation reports through
//! - **Identifiers**: id syntax validation and unique id generation
//! - **Values**: the dynamic value type used for attributes and saved state

pub mod error;
pub mod handle;
pub mod id;
pub mod value;

pub use error::*;
pub use handle::*;
pub use id::*;
pub use value::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::handle::{Handle, HandleMap};
    pub use crate::id::{validate_id, UniqueIdGenerator};
    pub use crate::value::Value;
}
