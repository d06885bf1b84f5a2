pub mod actor;
pub mod handle;

pub use actor::*;
pub use handle::*;
