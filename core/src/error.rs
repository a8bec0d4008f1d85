use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Playing field must contain at least one cell")]
    EmptyField,
    #[error("Fail limit must be at least one")]
    ZeroFailLimit,
}

pub type Result<T> = core::result::Result<T, GameError>;
