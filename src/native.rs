//! Native driver load/unload surface.
//!
//! `NtLoadDriver` and `NtUnloadDriver` identify their target purely by the
//! service's registry path: the kernel re-reads `ImagePath` from the entry at
//! call time.  The service entry therefore has to be populated before load
//! and must not be deleted between a load and a later unload of the same
//! session.
//!
//! The calls are reached through the [`DriverControl`] trait so tests can
//! script outcomes without touching a live kernel; [`NtDriverControl`] is the
//! ntdll-backed implementation.

/// Raw NT status code.  Negative values are failures.
pub type NtStatus = i32;

/// Mirror of the `NT_SUCCESS` convention.
pub const fn nt_success(status: NtStatus) -> bool {
    status >= 0
}

/// The privileged load/unload primitive, injectable per the OS-state
/// substitution strategy used across the toolkit.
pub trait DriverControl {
    /// Issue the native load call for the given service identity.
    fn load_driver(&mut self, service_identity: &str) -> NtStatus;

    /// Issue the matching unload call.
    fn unload_driver(&mut self, service_identity: &str) -> NtStatus;
}

#[cfg(windows)]
pub use self::windows::NtDriverControl;

#[cfg(windows)]
mod windows {
    use windows_sys::Win32::Foundation::UNICODE_STRING;

    use super::{DriverControl, NtStatus};
    use crate::paths::wide_nul;

    #[link(name = "ntdll")]
    unsafe extern "system" {
        fn NtLoadDriver(driver_service_name: *const UNICODE_STRING) -> NtStatus;
        fn NtUnloadDriver(driver_service_name: *const UNICODE_STRING) -> NtStatus;
    }

    /// Length-prefixed wide view over `buf`.
    ///
    /// `buf` must end with a NUL and outlive the returned struct; `Length`
    /// counts bytes without the terminator, `MaximumLength` with it.
    fn as_unicode_string(buf: &[u16]) -> UNICODE_STRING {
        UNICODE_STRING {
            Length: ((buf.len() - 1) * 2) as u16,
            MaximumLength: (buf.len() * 2) as u16,
            Buffer: buf.as_ptr() as *mut u16,
        }
    }

    /// `DriverControl` over the real ntdll entry points.
    pub struct NtDriverControl;

    impl DriverControl for NtDriverControl {
        fn load_driver(&mut self, service_identity: &str) -> NtStatus {
            let wide = wide_nul(service_identity);
            let name = as_unicode_string(&wide);
            unsafe { NtLoadDriver(&name) }
        }

        fn unload_driver(&mut self, service_identity: &str) -> NtStatus {
            let wide = wide_nul(service_identity);
            let name = as_unicode_string(&wide);
            unsafe { NtUnloadDriver(&name) }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_convention_is_signed() {
        assert!(nt_success(0));
        assert!(nt_success(0x0000_0001));
        // STATUS_ACCESS_DENIED
        assert!(!nt_success(0xC000_0022_u32 as i32));
    }
}
