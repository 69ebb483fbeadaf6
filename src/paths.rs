//! Registry-path and service-identity builders.
//!
//! The same driver is addressed three different ways during its lifecycle:
//! an HKLM-relative key path for the registry writer, a `\??\` device path
//! for the `ImagePath` value, and a fully-qualified `\Registry\Machine\...`
//! identity for the native load/unload calls.  Each spelling is produced by
//! one pure function here instead of ad-hoc concatenation at the call sites.

use std::path::Path;

/// HKLM-relative branch holding kernel service definitions.
pub const SERVICES_KEY_PREFIX: &str = "System\\CurrentControlSet\\Services\\";

/// Prefix turning a user-mode drive-letter path into a device-namespace path.
pub const NATIVE_IMAGE_PREFIX: &str = "\\??\\";

/// Registry identity prefix understood by `NtLoadDriver`/`NtUnloadDriver`.
pub const SERVICE_IDENTITY_PREFIX: &str =
    "\\Registry\\Machine\\System\\CurrentControlSet\\Services\\";

/// Key path of the service entry for `name`, relative to HKLM.
pub fn service_key_path(name: &str) -> String {
    format!("{}{}", SERVICES_KEY_PREFIX, name)
}

/// `ImagePath` spelling of a driver binary: the user path behind `\??\`.
pub fn to_native_image_path(path: &Path) -> String {
    format!("{}{}", NATIVE_IMAGE_PREFIX, path.display())
}

/// Fully-qualified service identity handed to the native load/unload calls.
pub fn to_service_identity(name: &str) -> String {
    format!("{}{}", SERVICE_IDENTITY_PREFIX, name)
}

/// UTF-16 with a trailing NUL, as the wide Win32 entry points expect.
pub fn wide_nul(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}
