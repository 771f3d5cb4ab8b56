pub mod evaluator;
pub mod metrics;
pub mod set;
pub mod snapshot;
pub mod types;

pub use evaluator::*;
pub use metrics::*;
pub use set::*;
pub use snapshot::*;
pub use types::*;
