pub mod aggregator;
pub mod route;

mod queue;

pub use aggregator::{Aggregator, BatchError, Pending};
pub use route::RouteKey;
