//! Engine context: the public [`Kpm`] entry point, its per-operator session and reports.
//!
//! Modules:
//! - [`kpm_context`]: the `Kpm` engine and its single, deferred and batched entry points.
//! - [`session`]: bounds, rescaling and adapter cache for one operator.
//! - [`report`]: statistics of a finished computation.

pub mod kpm_context;
pub use kpm_context::{Kpm, SiteQuery};
pub mod report;
pub use report::{Computation, KpmReport};
pub mod session;
pub use session::Session;
