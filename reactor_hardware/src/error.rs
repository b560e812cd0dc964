use reactor_traits::Pump;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("scale timeout")]
    Timeout,
    #[error("{pump} transfer did not finish within {ms} ms")]
    TransferTimeout { pump: Pump, ms: u64 },
    #[error("scale read failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
    #[error("malformed scale response: {0:?}")]
    Parse(String),
    #[error("pump {0}: {1}")]
    Pump(Pump, String),
    #[error("invalid dose request: {0}")]
    InvalidRequest(String),
    #[error("stop requested")]
    Cancelled,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
