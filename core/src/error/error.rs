use thiserror::Error;

use super::manager::ManagerError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid document: {0}")]
    Document(#[from] serde_json::Error),
    #[error("manager error: {0}")]
    Manager(#[from] ManagerError),
    #[error("{failed} of {total} image(s) failed to generate")]
    Generation { failed: usize, total: usize },
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
