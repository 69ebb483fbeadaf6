//! Service registry entries for kernel drivers.
//!
//! A driver becomes loadable once `System\CurrentControlSet\Services\<name>`
//! under HKLM describes it: `ImagePath` (expandable string, device path),
//! `Type` = kernel driver, `ErrorControl` = normal, `Start` = on demand.
//! This module owns that entry's write and delete policy:
//!
//! - A pre-existing key is authoritative and is never overwritten.
//! - A write failure after key creation leaves the partial key in place;
//!   cleanup happens only through an explicit [`delete_service_entry`].
//!
//! The machine registry itself sits behind the [`RegistryStore`] trait, with
//! [`WindowsRegistry`] talking to the live HKLM hive and [`MemoryRegistry`]
//! backing the test suites.

use std::collections::BTreeMap;

use crate::error::RegistryError;
use crate::loader::DriverDescriptor;
use crate::paths;

/// `Type` value for a kernel-mode driver service.
const SERVICE_TYPE_KERNEL_DRIVER: u32 = 1;
/// `ErrorControl` value: log the failure and continue booting.
const SERVICE_ERROR_NORMAL: u32 = 1;
/// `Start` value: load on demand only.
const SERVICE_START_DEMAND: u32 = 3;

/// Whether `create_key` made a fresh key or found one already there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Created,
    Existing,
}

/// A registry value as persisted for a service entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryValue {
    /// `REG_EXPAND_SZ`
    ExpandString(String),
    /// `REG_DWORD`
    Dword(u32),
}

/// Minimal machine-registry surface the entry writer needs.
///
/// Key paths are relative to HKLM.  `delete_tree` treats an absent key as a
/// successful no-op.
pub trait RegistryStore {
    fn create_key(&mut self, key: &str) -> Result<KeyDisposition, RegistryError>;
    fn set_expand_string(&mut self, key: &str, value: &str, data: &str)
    -> Result<(), RegistryError>;
    fn set_dword(&mut self, key: &str, value: &str, data: u32) -> Result<(), RegistryError>;
    fn delete_tree(&mut self, key: &str) -> Result<(), RegistryError>;
}

/// Write the service entry for `descriptor` unless one already exists.
///
/// Refuses to touch the store while the descriptor is not ready.  When the
/// key pre-exists the call reports success and leaves every field as found.
/// All four value writes are checked; a failure part-way through leaves the
/// partial key behind for a later explicit delete.
pub fn create_service_entry<R: RegistryStore>(
    store: &mut R,
    descriptor: &DriverDescriptor,
) -> Result<(), RegistryError> {
    if !descriptor.is_ready() {
        return Err(RegistryError::NotReady);
    }

    let key = paths::service_key_path(descriptor.name());
    let image_path = paths::to_native_image_path(descriptor.image_path());

    if store.create_key(&key)? == KeyDisposition::Existing {
        log::debug!("service key {} already present, keeping it", key);
        return Ok(());
    }

    store.set_expand_string(&key, "ImagePath", &image_path)?;
    store.set_dword(&key, "Type", SERVICE_TYPE_KERNEL_DRIVER)?;
    store.set_dword(&key, "ErrorControl", SERVICE_ERROR_NORMAL)?;
    store.set_dword(&key, "Start", SERVICE_START_DEMAND)?;
    Ok(())
}

/// Remove the service subtree for `descriptor`.
///
/// A missing entry and a not-ready descriptor are both quiet no-ops; a
/// failing delete is logged and swallowed.
pub fn delete_service_entry<R: RegistryStore>(store: &mut R, descriptor: &DriverDescriptor) {
    if !descriptor.is_ready() {
        return;
    }

    let key = paths::service_key_path(descriptor.name());
    if let Err(err) = store.delete_tree(&key) {
        log::warn!("could not delete service key {}: {}", key, err);
    }
}

/// In-memory [`RegistryStore`].
///
/// Keys and values mirror the layout the Windows implementation produces, so
/// tests can assert on the exact persisted fields.  Individual value writes
/// can be scripted to fail.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    keys: BTreeMap<String, BTreeMap<String, RegistryValue>>,
    fail_value_writes: Option<String>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to the named value fail with a scripted access error.
    pub fn fail_writes_to(&mut self, value: &str) {
        self.fail_value_writes = Some(value.to_string());
    }

    /// Values stored under `key`, if the key exists.
    pub fn key(&self, key: &str) -> Option<&BTreeMap<String, RegistryValue>> {
        self.keys.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Seed a key with a value, as if some earlier installer had written it.
    pub fn insert_value(&mut self, key: &str, value: &str, data: RegistryValue) {
        self.keys
            .entry(key.to_string())
            .or_default()
            .insert(value.to_string(), data);
    }

    fn set(&mut self, key: &str, value: &str, data: RegistryValue) -> Result<(), RegistryError> {
        if self.fail_value_writes.as_deref() == Some(value) {
            return Err(RegistryError::Os {
                op: "set value",
                key: key.to_string(),
                code: 5, // ERROR_ACCESS_DENIED
            });
        }
        match self.keys.get_mut(key) {
            Some(values) => {
                values.insert(value.to_string(), data);
                Ok(())
            }
            None => Err(RegistryError::Os {
                op: "set value",
                key: key.to_string(),
                code: 2, // ERROR_FILE_NOT_FOUND
            }),
        }
    }
}

impl RegistryStore for MemoryRegistry {
    fn create_key(&mut self, key: &str) -> Result<KeyDisposition, RegistryError> {
        if self.keys.contains_key(key) {
            return Ok(KeyDisposition::Existing);
        }
        self.keys.insert(key.to_string(), BTreeMap::new());
        Ok(KeyDisposition::Created)
    }

    fn set_expand_string(
        &mut self,
        key: &str,
        value: &str,
        data: &str,
    ) -> Result<(), RegistryError> {
        self.set(key, value, RegistryValue::ExpandString(data.to_string()))
    }

    fn set_dword(&mut self, key: &str, value: &str, data: u32) -> Result<(), RegistryError> {
        self.set(key, value, RegistryValue::Dword(data))
    }

    fn delete_tree(&mut self, key: &str) -> Result<(), RegistryError> {
        self.keys.remove(key);
        Ok(())
    }
}

#[cfg(windows)]
pub use self::windows::WindowsRegistry;

#[cfg(windows)]
mod windows {
    use std::ptr;
    use std::slice;

    use windows_sys::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_SUCCESS};
    use windows_sys::Win32::System::Registry::{
        HKEY, HKEY_LOCAL_MACHINE, KEY_ALL_ACCESS, KEY_SET_VALUE, REG_CREATED_NEW_KEY, REG_DWORD,
        REG_EXPAND_SZ, REG_OPTION_NON_VOLATILE, RegCloseKey, RegCreateKeyExW, RegDeleteTreeW,
        RegOpenKeyExW, RegSetValueExW,
    };

    use super::{KeyDisposition, RegistryStore};
    use crate::error::RegistryError;
    use crate::paths::wide_nul;

    /// [`RegistryStore`] over the live HKLM hive.
    pub struct WindowsRegistry;

    impl WindowsRegistry {
        fn set_value(
            &self,
            key: &str,
            value: &str,
            kind: u32,
            data: &[u8],
        ) -> Result<(), RegistryError> {
            let key_w = wide_nul(key);
            let mut handle: HKEY = ptr::null_mut();
            let code = unsafe {
                RegOpenKeyExW(
                    HKEY_LOCAL_MACHINE,
                    key_w.as_ptr(),
                    0,
                    KEY_SET_VALUE,
                    &mut handle,
                )
            };
            if code != ERROR_SUCCESS {
                return Err(RegistryError::Os {
                    op: "RegOpenKeyEx",
                    key: key.to_string(),
                    code,
                });
            }

            let value_w = wide_nul(value);
            let code = unsafe {
                RegSetValueExW(
                    handle,
                    value_w.as_ptr(),
                    0,
                    kind,
                    data.as_ptr(),
                    data.len() as u32,
                )
            };
            unsafe { RegCloseKey(handle) };
            if code != ERROR_SUCCESS {
                return Err(RegistryError::Os {
                    op: "RegSetValueEx",
                    key: key.to_string(),
                    code,
                });
            }
            Ok(())
        }
    }

    impl RegistryStore for WindowsRegistry {
        fn create_key(&mut self, key: &str) -> Result<KeyDisposition, RegistryError> {
            let key_w = wide_nul(key);
            let mut handle: HKEY = ptr::null_mut();
            let mut disposition = 0u32;
            let code = unsafe {
                RegCreateKeyExW(
                    HKEY_LOCAL_MACHINE,
                    key_w.as_ptr(),
                    0,
                    ptr::null(),
                    REG_OPTION_NON_VOLATILE,
                    KEY_ALL_ACCESS,
                    ptr::null(),
                    &mut handle,
                    &mut disposition,
                )
            };
            if code != ERROR_SUCCESS {
                return Err(RegistryError::Os {
                    op: "RegCreateKeyEx",
                    key: key.to_string(),
                    code,
                });
            }
            unsafe { RegCloseKey(handle) };

            Ok(if disposition == REG_CREATED_NEW_KEY {
                KeyDisposition::Created
            } else {
                KeyDisposition::Existing
            })
        }

        fn set_expand_string(
            &mut self,
            key: &str,
            value: &str,
            data: &str,
        ) -> Result<(), RegistryError> {
            // REG_EXPAND_SZ payload is the wide string including its NUL.
            let data_w = wide_nul(data);
            let bytes =
                unsafe { slice::from_raw_parts(data_w.as_ptr() as *const u8, data_w.len() * 2) };
            self.set_value(key, value, REG_EXPAND_SZ, bytes)
        }

        fn set_dword(&mut self, key: &str, value: &str, data: u32) -> Result<(), RegistryError> {
            self.set_value(key, value, REG_DWORD, &data.to_le_bytes())
        }

        fn delete_tree(&mut self, key: &str) -> Result<(), RegistryError> {
            let key_w = wide_nul(key);
            let code = unsafe { RegDeleteTreeW(HKEY_LOCAL_MACHINE, key_w.as_ptr()) };
            if code != ERROR_SUCCESS && code != ERROR_FILE_NOT_FOUND {
                return Err(RegistryError::Os {
                    op: "RegDeleteTree",
                    key: key.to_string(),
                    code,
                });
            }
            Ok(())
        }
    }
}
