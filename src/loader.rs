//! Driver lifecycle controller.
//!
//! [`DrvLoader`] owns the descriptor for one driver instance and drives the
//! two transitions that matter: load (ensure the service entry exists, then
//! issue the native load call) and unload.  The OS service state is the
//! source of truth for whether the driver is active; the controller keeps no
//! flag of its own and is stateless between calls.
//!
//! The caller-facing operations return `bool` and log their failure cause,
//! matching the contract the rest of the toolkit programs against.

use std::path::{Path, PathBuf};

use crate::native::{DriverControl, nt_success};
use crate::paths;
use crate::registry::{self, RegistryStore};

/// Name plus on-disk image of one kernel driver.
///
/// Both fields are set together by a successful [`DrvLoader::init`] and never
/// mutated individually afterwards; re-initialization replaces the whole
/// descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverDescriptor {
    name: String,
    image_path: PathBuf,
}

impl DriverDescriptor {
    pub fn new(name: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            image_path: image_path.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    /// Both fields populated?
    pub fn is_ready(&self) -> bool {
        !self.name.is_empty() && !self.image_path.as_os_str().is_empty()
    }
}

/// Brings one kernel driver online and takes it back offline.
///
/// Generic over the registry and native-call backends so the whole lifecycle
/// can run against in-memory substitutes in tests.
pub struct DrvLoader<R, C> {
    descriptor: DriverDescriptor,
    registry: R,
    control: C,
}

#[cfg(windows)]
impl DrvLoader<crate::registry::WindowsRegistry, crate::native::NtDriverControl> {
    /// Controller wired to the live OS backends.
    pub fn new() -> Self {
        Self::with_backends(
            crate::registry::WindowsRegistry,
            crate::native::NtDriverControl,
        )
    }
}

#[cfg(windows)]
impl Default for DrvLoader<crate::registry::WindowsRegistry, crate::native::NtDriverControl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RegistryStore, C: DriverControl> DrvLoader<R, C> {
    /// Controller over explicit backends.
    pub fn with_backends(registry: R, control: C) -> Self {
        Self {
            descriptor: DriverDescriptor::default(),
            registry,
            control,
        }
    }

    /// Record the driver name and image path.
    ///
    /// Fails, leaving the descriptor untouched, when the image file does not
    /// exist on disk.
    pub fn init(&mut self, name: &str, image_path: &Path) -> bool {
        if !image_path.exists() {
            log::warn!("driver file {} does not exist", image_path.display());
            return false;
        }
        self.descriptor = DriverDescriptor::new(name, image_path);
        true
    }

    /// True once a descriptor with both fields has been accepted.
    pub fn is_ready(&self) -> bool {
        self.descriptor.is_ready()
    }

    pub fn descriptor(&self) -> &DriverDescriptor {
        &self.descriptor
    }

    /// The registry backend, for callers that inspect or seed entries.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Enable `SeLoadDriverPrivilege` on the calling process token.
    #[cfg(windows)]
    pub fn enable_privilege(&self) -> bool {
        match crate::privilege::enable_load_driver_privilege() {
            Ok(()) => true,
            Err(err) => {
                log::error!("{}", err);
                false
            }
        }
    }

    /// Ensure the service entry exists, then ask the kernel to load the
    /// driver image it describes.
    pub fn load(&mut self) -> bool {
        if let Err(err) = registry::create_service_entry(&mut self.registry, &self.descriptor) {
            log::error!(
                "service entry for {} not written: {}",
                self.descriptor.name(),
                err
            );
            return false;
        }

        let identity = paths::to_service_identity(self.descriptor.name());
        let status = self.control.load_driver(&identity);
        if !nt_success(status) {
            // The entry stays behind so a later retry can reuse it.
            log::error!("NtLoadDriver failed, status 0x{:x}", status);
            return false;
        }
        log::info!("driver {} loaded", self.descriptor.name());
        true
    }

    /// Ask the kernel to unload the driver registered under this name.
    pub fn unload(&mut self) -> bool {
        let identity = paths::to_service_identity(self.descriptor.name());
        let status = self.control.unload_driver(&identity);
        if !nt_success(status) {
            log::error!("NtUnloadDriver failed, status 0x{:x}", status);
            return false;
        }
        log::info!("driver {} unloaded", self.descriptor.name());
        true
    }

    /// Remove this driver's service entry, e.g. on uninstall.
    pub fn delete_service_entry(&mut self) {
        registry::delete_service_entry(&mut self.registry, &self.descriptor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NtStatus;
    use crate::registry::{MemoryRegistry, RegistryValue};

    // STATUS_ACCESS_DENIED
    const ACCESS_DENIED: NtStatus = 0xC000_0022_u32 as i32;

    /// Scripted native backend recording every identity it was handed.
    struct ScriptedControl {
        load_status: NtStatus,
        unload_status: NtStatus,
        load_calls: Vec<String>,
        unload_calls: Vec<String>,
    }

    impl ScriptedControl {
        fn succeeding() -> Self {
            Self {
                load_status: 0,
                unload_status: 0,
                load_calls: Vec::new(),
                unload_calls: Vec::new(),
            }
        }

        fn failing_load(status: NtStatus) -> Self {
            Self {
                load_status: status,
                ..Self::succeeding()
            }
        }
    }

    impl DriverControl for ScriptedControl {
        fn load_driver(&mut self, service_identity: &str) -> NtStatus {
            self.load_calls.push(service_identity.to_string());
            self.load_status
        }

        fn unload_driver(&mut self, service_identity: &str) -> NtStatus {
            self.unload_calls.push(service_identity.to_string());
            self.unload_status
        }
    }

    fn loader_with(control: ScriptedControl) -> DrvLoader<MemoryRegistry, ScriptedControl> {
        DrvLoader::with_backends(MemoryRegistry::new(), control)
    }

    #[test]
    fn default_controller_is_not_ready() {
        let loader = loader_with(ScriptedControl::succeeding());
        assert!(!loader.is_ready());
    }

    #[test]
    fn init_rejects_missing_file_and_keeps_descriptor_unset() {
        let mut loader = loader_with(ScriptedControl::succeeding());
        assert!(!loader.init("mydrv", Path::new("/no/such/mydrv.sys")));
        assert!(!loader.is_ready());
        assert_eq!(loader.descriptor(), &DriverDescriptor::default());
    }

    #[test]
    fn init_accepts_existing_file() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let mut loader = loader_with(ScriptedControl::succeeding());
        assert!(loader.init("mydrv", image.path()));
        assert!(loader.is_ready());
        assert_eq!(loader.descriptor().name(), "mydrv");
    }

    #[test]
    fn load_writes_entry_then_calls_native() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let mut loader = loader_with(ScriptedControl::succeeding());
        assert!(loader.init("mydrv", image.path()));
        assert!(loader.load());

        let key = paths::service_key_path("mydrv");
        let values = loader.registry().key(&key).unwrap();
        assert_eq!(
            values.get("ImagePath"),
            Some(&RegistryValue::ExpandString(paths::to_native_image_path(
                image.path()
            )))
        );
        assert_eq!(
            loader.control.load_calls,
            vec![paths::to_service_identity("mydrv")]
        );
    }

    #[test]
    fn failed_native_load_keeps_entry_for_retry() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let mut loader = loader_with(ScriptedControl::failing_load(ACCESS_DENIED));
        assert!(loader.init("mydrv", image.path()));

        assert!(!loader.load());
        assert!(loader.registry().contains_key(&paths::service_key_path("mydrv")));
    }

    #[test]
    fn load_without_init_touches_nothing() {
        let mut loader = loader_with(ScriptedControl::succeeding());
        assert!(!loader.load());
        assert!(loader.registry().is_empty());
        assert!(loader.control.load_calls.is_empty());
    }

    #[test]
    fn unload_passes_the_service_identity() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let mut loader = loader_with(ScriptedControl::succeeding());
        assert!(loader.init("mydrv", image.path()));

        assert!(loader.unload());
        assert_eq!(
            loader.control.unload_calls,
            vec![paths::to_service_identity("mydrv")]
        );
    }

    #[test]
    fn failed_unload_is_reported() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let mut loader = loader_with(ScriptedControl {
            unload_status: ACCESS_DENIED,
            ..ScriptedControl::succeeding()
        });
        assert!(loader.init("mydrv", image.path()));
        assert!(!loader.unload());
    }
}
