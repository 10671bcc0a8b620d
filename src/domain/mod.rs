pub mod filters;
pub mod matching;
pub mod profile;
pub mod tier;

pub use filters::*;
pub use matching::*;
pub use profile::*;
pub use tier::*;
