use crate::shadow::FifoStatus;
use thiserror::Error;

pub type TbResult<T> = Result<T, TbError>;

#[derive(Error, Debug)]
pub enum TbError {
    #[error("signal `{0}` not found")]
    SignalNotFound(String),
    #[error("signal `{0}` registered twice")]
    DuplicateSignal(String),
    #[error("invalid signal handle {0}")]
    InvalidHandle(usize),
    #[error("unknown time unit `{0}`")]
    TimeUnit(String),
    #[error("can't convert {time} {unit} to sim steps without rounding (sim precision: 1e{precision} s)")]
    TimeConversion { time: u64, unit: String, precision: i8 },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("task `{0}` was cancelled")]
    Cancelled(String),
    #[error("simulation stalled at step {0}: no pending events")]
    Stalled(u64),
    #[error("watchdog expired at step {0}")]
    Timeout(u64),
    #[error("delta cycle limit exceeded at step {0}")]
    DeltaOverflow(u64),
    #[error("{check}: {status}")]
    CheckFailed { check: String, status: FifoStatus },
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error("report: {0}")]
    Report(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
