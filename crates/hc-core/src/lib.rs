//! hc-core: shared foundation for hybridctl.
//!
//! Contains:
//! - response (response-type enum + per-type size vectors)
//! - ids (integer tags for control points, filters and controls)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod response;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use ids::*;
pub use numeric::*;
pub use response::{ResponseSizes, ResponseType};
