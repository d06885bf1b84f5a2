pub mod backoff;
pub mod circular_buffer;
pub mod config;
pub mod health;
pub mod percentile;
pub mod types;

pub use backoff::*;
pub use circular_buffer::*;
pub use config::*;
pub use health::*;
pub use percentile::*;
pub use types::*;
