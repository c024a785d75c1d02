use crate::cgroup::cgroup_memory_limit_bytes;
use sysinfo::System;

/// Physical memory installed on the host, in bytes.
pub fn total_memory_bytes() -> Option<u64> {
    let mut system = System::new();
    system.refresh_memory();
    match system.total_memory() {
        0 => {
            tracing::debug!(
                target: "mapi.memory",
                "operating system reported zero total memory"
            );
            None
        }
        bytes => Some(bytes),
    }
}

/// Memory the process may actually use: physical memory clamped to the cgroup limit.
pub fn effective_memory_bytes() -> Option<u64> {
    let physical = total_memory_bytes();
    let limit = cgroup_memory_limit_bytes();
    let effective = match (physical, limit) {
        (Some(physical), Some(limit)) => Some(physical.min(limit)),
        (physical, limit) => physical.or(limit),
    };
    tracing::debug!(
        target: "mapi.memory",
        physical_bytes = ?physical,
        cgroup_limit_bytes = ?limit,
        effective_bytes = ?effective,
        "probed system memory"
    );
    effective
}
