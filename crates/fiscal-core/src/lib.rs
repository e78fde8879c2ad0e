pub mod error;
pub mod period;
pub mod types;

pub use error::*;
pub use period::*;
pub use types::*;
