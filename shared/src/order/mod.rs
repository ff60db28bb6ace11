//! Delivery order types
//!
//! - [`status`]: canonical status taxonomy and provider alias table
//! - [`number`]: origin-tagged order numbers
//! - [`types`]: the persisted order model and request/view types

pub mod number;
pub mod status;
pub mod types;

// Re-exports
pub use status::OrderStatus;
pub use types::*;
