/// Resource ceilings applied to the child between fork and exec
///
/// Each configured ceiling becomes a [`PlannedLimit`] carrying an ordered list
/// of limit categories to try. The first category the platform accepts wins;
/// when none does, the failure is reported and the child carries on without
/// that ceiling. The wall-clock deadline is still enforced by the parent.
///
/// Everything that runs in the child ([`LimitPlan::apply`] with
/// [`SystemLimits`] and [`report_to_stderr`]) avoids allocation and locking,
/// so it stays safe to call after `fork` in a multi-threaded parent.
use crate::config::types::ResourceCeilings;
use nix::errno::Errno;
use nix::sys::resource::{setrlimit, Resource};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimitCategory {
    ProcessCount,
    StackSize,
    VirtualMemory,
    AddressSpace,
}

impl LimitCategory {
    pub fn rlimit_name(self) -> &'static str {
        match self {
            Self::ProcessCount => "RLIMIT_NPROC",
            Self::StackSize => "RLIMIT_STACK",
            Self::VirtualMemory => "RLIMIT_VMEM",
            Self::AddressSpace => "RLIMIT_AS",
        }
    }

    /// The platform resource backing this category, if the platform has one
    pub fn resource(self) -> Option<Resource> {
        match self {
            Self::ProcessCount => Some(Resource::RLIMIT_NPROC),
            Self::StackSize => Some(Resource::RLIMIT_STACK),
            Self::AddressSpace => Some(Resource::RLIMIT_AS),
            Self::VirtualMemory => virtual_memory_resource(),
        }
    }
}

#[cfg(target_os = "freebsd")]
fn virtual_memory_resource() -> Option<Resource> {
    Some(Resource::RLIMIT_VMEM)
}

// Linux and macOS only expose the virtual memory ceiling as RLIMIT_AS.
#[cfg(not(target_os = "freebsd"))]
fn virtual_memory_resource() -> Option<Resource> {
    None
}

/// Sets one resource limit on the calling process.
pub trait LimitSetter {
    fn set_limit(&self, category: LimitCategory, value: u64) -> Result<(), Errno>;
}

/// `setrlimit(2)` with soft = hard = value.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemLimits;

impl LimitSetter for SystemLimits {
    fn set_limit(&self, category: LimitCategory, value: u64) -> Result<(), Errno> {
        let resource = category.resource().ok_or(Errno::EINVAL)?;
        let value = value as libc::rlim_t;
        setrlimit(resource, value, value)
    }
}

/// The ceiling a planned limit came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ceiling {
    MaxNumProcesses,
    MaxStackSize,
    MaxVirtualMemory,
}

impl Ceiling {
    fn candidates(self) -> &'static [LimitCategory] {
        match self {
            Self::MaxNumProcesses => &[LimitCategory::ProcessCount],
            Self::MaxStackSize => &[LimitCategory::StackSize],
            Self::MaxVirtualMemory => &[LimitCategory::VirtualMemory, LimitCategory::AddressSpace],
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::MaxNumProcesses => "max_num_processes",
            Self::MaxStackSize => "max_stack_size",
            Self::MaxVirtualMemory => "max_virtual_memory",
        }
    }
}

#[derive(Clone, Debug)]
pub struct PlannedLimit {
    pub ceiling: Ceiling,
    pub value: u64,
    pub candidates: &'static [LimitCategory],
    /// Preformatted diagnostic prefix, built in the parent
    message: Vec<u8>,
}

impl PlannedLimit {
    fn new(ceiling: Ceiling, value: u64) -> Self {
        let candidates = ceiling.candidates();
        let names: Vec<&str> = candidates.iter().map(|c| c.rlimit_name()).collect();
        let message = format!(
            "runlimit: could not apply {}={} (tried {}): ",
            ceiling.describe(),
            value,
            names.join(", ")
        )
        .into_bytes();

        Self {
            ceiling,
            value,
            candidates,
            message,
        }
    }

    pub fn message_prefix(&self) -> &[u8] {
        &self.message
    }
}

/// A ceiling none of whose categories could be applied
#[derive(Debug)]
pub struct LimitFailure<'a> {
    pub limit: &'a PlannedLimit,
    /// Error from the last category tried
    pub errno: Errno,
}

#[derive(Clone, Debug, Default)]
pub struct LimitPlan {
    limits: Vec<PlannedLimit>,
}

impl LimitPlan {
    pub fn from_ceilings(ceilings: &ResourceCeilings) -> Self {
        let limits = [
            (Ceiling::MaxNumProcesses, ceilings.max_num_processes),
            (Ceiling::MaxStackSize, ceilings.max_stack_size),
            (Ceiling::MaxVirtualMemory, ceilings.max_virtual_memory),
        ]
        .into_iter()
        .filter_map(|(ceiling, value)| value.map(|v| PlannedLimit::new(ceiling, v)))
        .collect();

        Self { limits }
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub fn limits(&self) -> &[PlannedLimit] {
        &self.limits
    }

    /// Apply every planned limit, reporting the ones that could not be set.
    ///
    /// Never fails: a ceiling that cannot be applied is passed to
    /// `on_failure` and skipped. Returns the number of ceilings applied.
    pub fn apply<S, F>(&self, setter: &S, mut on_failure: F) -> usize
    where
        S: LimitSetter + ?Sized,
        F: FnMut(&LimitFailure<'_>),
    {
        let mut applied = 0;
        for limit in &self.limits {
            match apply_one(setter, limit) {
                Ok(_) => applied += 1,
                Err(errno) => on_failure(&LimitFailure { limit, errno }),
            }
        }
        applied
    }
}

/// Try each candidate category in order; the first success wins.
fn apply_one<S: LimitSetter + ?Sized>(
    setter: &S,
    limit: &PlannedLimit,
) -> Result<LimitCategory, Errno> {
    let mut last_err = Errno::EINVAL;
    for &category in limit.candidates {
        match setter.set_limit(category, limit.value) {
            Ok(()) => return Ok(category),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Child-side failure reporter: raw writes to stderr, no allocation.
pub fn report_to_stderr(failure: &LimitFailure<'_>) {
    write_stderr(failure.limit.message_prefix());
    write_stderr(failure.errno.desc().as_bytes());
    write_stderr(b"\n");
}

fn write_stderr(buf: &[u8]) {
    // ASYNC-SIGNAL SAFETY: write(2) only; short writes and errors are ignored.
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
        );
    }
}
