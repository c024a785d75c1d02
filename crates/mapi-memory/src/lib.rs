//! Host memory probing and byte-size helpers.
//!
//! The cache layer sizes its largest cache as a fraction of the memory available to the process.
//! "Available" is best-effort: physical memory as reported by the OS, clamped to the cgroup
//! memory limit when the server runs inside a container.

mod cgroup;
mod size;
mod system;

pub use cgroup::{parse_cgroup_memory_limit_bytes, parse_proc_self_cgroup, ProcSelfCgroup};
pub use size::{format_byte_size, parse_byte_size, ByteSizeParseError, GB, KB, MB};
pub use system::{effective_memory_bytes, total_memory_bytes};
