//! Process-token privilege elevation.
//!
//! `NtLoadDriver` checks for `SeLoadDriverPrivilege` on the calling token;
//! the agent enables it once at startup, before the first load attempt.  The
//! adjustment itself is a single-privilege `AdjustTokenPrivileges` call,
//! which the OS applies atomically.

use std::mem;
use std::ptr;

use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE, LUID};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LUID_AND_ATTRIBUTES, LookupPrivilegeValueW, SE_PRIVILEGE_ENABLED,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

use crate::error::PrivilegeError;
use crate::paths::wide_nul;

/// Privilege the kernel enforces inside `NtLoadDriver`/`NtUnloadDriver`.
pub const LOAD_DRIVER_PRIVILEGE: &str = "SeLoadDriverPrivilege";

/// Add the load-driver privilege, enabled, to the current process token.
///
/// The first failing step aborts with the captured OS error code; no retry.
/// The token handle is closed on every path that opened it.
pub fn enable_load_driver_privilege() -> Result<(), PrivilegeError> {
    let name = wide_nul(LOAD_DRIVER_PRIVILEGE);
    let mut privilege = TOKEN_PRIVILEGES {
        PrivilegeCount: 1,
        Privileges: [LUID_AND_ATTRIBUTES {
            Luid: LUID {
                LowPart: 0,
                HighPart: 0,
            },
            Attributes: SE_PRIVILEGE_ENABLED,
        }],
    };

    unsafe {
        if LookupPrivilegeValueW(ptr::null(), name.as_ptr(), &mut privilege.Privileges[0].Luid)
            == 0
        {
            return Err(PrivilegeError::Lookup(GetLastError()));
        }

        let mut token: HANDLE = ptr::null_mut();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES, &mut token) == 0 {
            return Err(PrivilegeError::OpenToken(GetLastError()));
        }

        let adjusted = AdjustTokenPrivileges(
            token,
            0,
            &privilege,
            mem::size_of::<TOKEN_PRIVILEGES>() as u32,
            ptr::null_mut(),
            ptr::null_mut(),
        );
        // Capture before CloseHandle can overwrite the thread error slot.
        let code = GetLastError();
        CloseHandle(token);
        if adjusted == 0 {
            return Err(PrivilegeError::Adjust(code));
        }
    }

    Ok(())
}
