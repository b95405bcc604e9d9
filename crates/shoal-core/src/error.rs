use crate::{command::CommandError, config::ConfigError, store::StoreError};
use shoal_marshal::MarshalError;
use thiserror::Error as ThisError;

///
/// Error
///
/// Crate-wide error envelope. Module errors convert transparently so call
/// sites can bubble them up with `?` and match on the class when they need
/// to.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
