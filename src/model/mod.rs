pub mod config;
pub mod filter;
pub mod section;
pub mod task;
pub mod user;

pub use config::*;
pub use filter::*;
pub use section::*;
pub use task::*;
pub use user::*;
