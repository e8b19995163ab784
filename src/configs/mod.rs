pub mod base;
pub mod logging;
pub mod mixer;

pub use base::*;
pub use logging::*;
pub use mixer::*;
