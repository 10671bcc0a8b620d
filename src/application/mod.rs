pub mod filters;
pub mod matches;

pub use filters::*;
pub use matches::*;
