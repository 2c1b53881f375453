use sysinfo::{Pid, ProcessRefreshKind, System};

/// CPU and memory usage of a process at one point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    /// CPU usage in percent since the previous sample
    pub cpu_usage: f32,
    /// Resident memory in bytes
    pub memory: u64,
}

/// Samples resource usage of the supervised child
pub struct ResourceSampler {
    system: System,
}

impl ResourceSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Sample a single process
    ///
    /// Returns `None` when the process no longer exists. CPU usage is only
    /// meaningful from the second sample on.
    pub fn sample(&mut self, pid: u32) -> Option<ResourceUsage> {
        let sys_pid = Pid::from_u32(pid);
        self.system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::Some(&[sys_pid]),
            true,
            ProcessRefreshKind::new().with_cpu().with_memory(),
        );

        self.system.process(sys_pid).map(|process| ResourceUsage {
            cpu_usage: process.cpu_usage(),
            memory: process.memory(),
        })
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}
