use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("slide not found: {0}")]
    SlideNotFound(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}
