pub use crate::config::{FlagSeverity, TbConfig};
pub use crate::error::{TbError, TbResult};
pub use crate::executor::{JoinHandle, Task, TaskResult};
pub use crate::fifo_tb::FifoTb;
pub use crate::shadow::{FifoShadow, FifoStatus};
pub use crate::signal::SimObject;
pub use crate::sim::Simulator;
pub use crate::sim_if::SimIf;
pub use crate::trigger::Trigger;
pub use crate::utils::clock_cycles;
pub use crate::value::Val;
pub use futures::future::FutureExt;
