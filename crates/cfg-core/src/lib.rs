pub mod error;
pub mod problem;
pub mod value;

pub use error::CfgError;
pub use problem::*;
pub use value::*;
