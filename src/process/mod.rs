// Process module - launching and handling the supervised child

mod handle;
mod monitor;
pub mod spawner;
mod types;

pub use handle::{ChildProcess, ProcessHandle};
pub use monitor::{ResourceSampler, ResourceUsage};
pub use spawner::{launch, LaunchSpec};
pub use types::{ExitStatus, LifecycleState, SupervisedProcess};
