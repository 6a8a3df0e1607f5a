//! Matrix module: sparse storage formats and the rescaled operator adapter.

pub mod sparse;
pub use sparse::CsrMatrix;
pub mod ellpack;
pub use ellpack::EllMatrix;
pub mod adapter;
pub use adapter::OperatorAdapter;
