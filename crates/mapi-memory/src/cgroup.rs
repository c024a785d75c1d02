#[cfg(target_os = "linux")]
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Memory-relevant entries of `/proc/self/cgroup`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcSelfCgroup {
    /// Unified (v2) hierarchy path, from a `0::/path` line.
    pub v2_path: Option<String>,
    /// Path of the v1 `memory` controller, from a `N:memory:/path` line.
    pub v1_memory_path: Option<String>,
}

/// Extract the cgroup paths that can carry a memory limit.
pub fn parse_proc_self_cgroup(contents: &str) -> ProcSelfCgroup {
    let mut parsed = ProcSelfCgroup::default();

    for line in contents.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut parts = line.splitn(3, ':');
        let (Some(hierarchy), Some(controllers), Some(path)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let path = path.trim();

        if parsed.v2_path.is_none()
            && hierarchy == "0"
            && controllers.is_empty()
            && !path.is_empty()
        {
            parsed.v2_path = Some(path.to_string());
        }
        if parsed.v1_memory_path.is_none()
            && controllers.split(',').any(|name| name.trim() == "memory")
        {
            parsed.v1_memory_path = Some(path.to_string());
        }
    }

    parsed
}

// Limits at or above 1 EiB are how v1 spells "unlimited".
const UNLIMITED_THRESHOLD_BYTES: u64 = 1 << 60;

/// Parse `memory.max` (v2, `max` or bytes) or `memory.limit_in_bytes` (v1).
///
/// Returns `None` when the cgroup is unlimited or the value is unreadable.
pub fn parse_cgroup_memory_limit_bytes(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || raw == "max" {
        return None;
    }

    match raw.parse::<u64>() {
        Ok(value) if value >= UNLIMITED_THRESHOLD_BYTES => None,
        Ok(value) => Some(value),
        Err(err) => {
            static REPORTED: OnceLock<()> = OnceLock::new();
            if REPORTED.set(()).is_ok() {
                tracing::debug!(
                    target: "mapi.memory",
                    raw,
                    error = %err,
                    "failed to parse cgroup memory limit"
                );
            }
            None
        }
    }
}

/// Tightest memory limit along the process's cgroup ancestry, if any.
#[cfg(target_os = "linux")]
pub(crate) fn cgroup_memory_limit_bytes() -> Option<u64> {
    let contents = match std::fs::read_to_string("/proc/self/cgroup") {
        Ok(contents) => contents,
        Err(err) => {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(
                    target: "mapi.memory",
                    error = %err,
                    "failed to read /proc/self/cgroup"
                );
            }
            return None;
        }
    };
    let parsed = parse_proc_self_cgroup(&contents);

    parsed
        .v2_path
        .as_deref()
        .and_then(|path| tightest_limit(Path::new("/sys/fs/cgroup"), path, "memory.max"))
        .or_else(|| {
            parsed.v1_memory_path.as_deref().and_then(|path| {
                tightest_limit(
                    Path::new("/sys/fs/cgroup/memory"),
                    path,
                    "memory.limit_in_bytes",
                )
            })
        })
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn cgroup_memory_limit_bytes() -> Option<u64> {
    None
}

#[cfg(target_os = "linux")]
fn tightest_limit(mount: &Path, cgroup_path: &str, file_name: &str) -> Option<u64> {
    let mut rel = PathBuf::from(cgroup_path.trim_start_matches('/'));
    let mut best: Option<u64> = None;

    loop {
        let candidate = mount.join(&rel).join(file_name);
        if let Ok(raw) = std::fs::read_to_string(&candidate) {
            if let Some(limit) = parse_cgroup_memory_limit_bytes(&raw) {
                best = Some(best.map_or(limit, |best| best.min(limit)));
            }
        }
        if !rel.pop() {
            break;
        }
    }

    best
}
