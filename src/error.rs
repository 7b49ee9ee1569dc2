use std::fmt::{Display, Formatter};
use std::sync::PoisonError;

use config::ConfigError;
use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

// All except Internal are considered user-facing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Error {
    Internal(String),
    /// The buffer pool has no free frame and no evictable victim.
    /// Callers may retry after unpinning pages.
    PoolExhausted,
    /// A hash bucket is full of entries whose hashes agree on every bit,
    /// so no amount of splitting can make room for the insert.
    BucketExhausted,
}

impl Error {
    pub fn internal<E: ToString>(msg: E) -> Error {
        Error::Internal(msg.to_string())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Internal(s) => write!(f, "{}", s),
            Error::PoolExhausted => write!(f, "all frames are in use and not evictable"),
            Error::BucketExhausted => write!(f, "bucket cannot be split any further"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::internal(err)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::internal(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::internal(err)
    }
}
