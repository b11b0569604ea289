use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub rss_bytes: u64,
}

/// Per-process CPU/RSS sampling, attached once when a session opens.
pub struct ResourceMonitor {
    system: System,
    pid: Pid,
    refresh: ProcessRefreshKind,
}

impl ResourceMonitor {
    /// `None` when the platform has no process introspection or the process is not visible
    pub fn attach(pid: u32) -> Option<Self> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return None;
        }

        let pid = Pid::from_u32(pid);
        let refresh = ProcessRefreshKind::nothing().with_cpu().with_memory();
        let mut system = System::new_with_specifics(RefreshKind::nothing().with_processes(refresh));
        system.refresh_processes_specifics(ProcessesToUpdate::Some(&[pid]), true, refresh);
        system.process(pid)?;

        Some(Self {
            system,
            pid,
            refresh,
        })
    }

    /// CPU usage since the previous refresh and current resident memory
    pub fn snapshot(&mut self) -> Option<ResourceSnapshot> {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[self.pid]), true, self.refresh);
        let process = self.system.process(self.pid)?;
        Some(ResourceSnapshot {
            cpu_percent: process.cpu_usage(),
            rss_bytes: process.memory(),
        })
    }
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor").field("pid", &self.pid).finish()
    }
}
