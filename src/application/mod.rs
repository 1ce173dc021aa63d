pub mod catalog;
mod dependencies;
mod errors;
pub mod loan;
pub mod member;
pub mod shelf;

pub use dependencies::ServiceDependencies;
pub use errors::{LendingError, Result};
