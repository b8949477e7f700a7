#[allow(clippy::module_inception)]
pub mod error;
pub mod manager;

pub use error::CliError;
pub use manager::ManagerError;
