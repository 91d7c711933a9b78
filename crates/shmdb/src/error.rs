//! Facade error type.

use shmdb_client::ClientError;
use shmdb_config::ConfigError;
use shmdb_server::ServerError;
use shmdb_shm::ShmError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShmdbError>;

#[derive(Debug, Error)]
pub enum ShmdbError {
    #[error(transparent)]
    Server(#[from] ServerError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Region(#[from] ShmError),
}
