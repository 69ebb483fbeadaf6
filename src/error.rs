//! Error taxonomy for the driver-loading pipeline.
//!
//! Privilege and registry failures carry the raw Win32 error code so the
//! agent log shows the same numbers the OS reported.  Native load/unload
//! outcomes stay plain `NtStatus` values and are not wrapped here.

use thiserror::Error;

/// Failure while enabling `SeLoadDriverPrivilege` on the process token.
#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[error("LookupPrivilegeValue failed, code 0x{0:x}")]
    Lookup(u32),
    #[error("OpenProcessToken failed, code 0x{0:x}")]
    OpenToken(u32),
    #[error("AdjustTokenPrivileges failed, code 0x{0:x}")]
    Adjust(u32),
}

/// Failure while writing or removing a driver's service registry entry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Mutating operations refuse to run before both descriptor fields are
    /// populated.
    #[error("driver descriptor is not ready (missing name or image path)")]
    NotReady,

    /// A registry call failed with a Win32 error code.
    #[error("{op} failed for {key}, code 0x{code:x}")]
    Os {
        op: &'static str,
        key: String,
        code: u32,
    },
}
