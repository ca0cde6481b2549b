//! Shared-library plugins loaded through `libloading`.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use logloom_core::LogRecord;

use crate::contract::{LogPlugin, PluginDescriptor, ProcessResult};
use crate::error::PluginError;
use crate::helpers::PluginHelpers;

use super::abi::{
    ABI_VERSION, FfiAbiVersionFn, FfiPluginInfoFn, FfiPluginInitFn, FfiPluginProcessFn,
    FfiPluginShutdownFn, SYM_ABI_VERSION, SYM_INFO, SYM_INIT, SYM_PROCESS, SYM_SHUTDOWN,
};
use super::safety::{HelpersBridge, descriptor_from_info, with_ffi_record};

/// A plugin implemented by a shared library.
///
/// Holds the library open; the raw function pointers below are only valid
/// while `library` is alive.
pub struct LibraryPlugin {
    descriptor: PluginDescriptor,
    init_fn: FfiPluginInitFn,
    process_fn: FfiPluginProcessFn,
    shutdown_fn: FfiPluginShutdownFn,
    bridge: Mutex<Option<Box<HelpersBridge>>>,
    library: Arc<libloading::Library>,
}

impl LibraryPlugin {
    /// Opens `path`, checks the ABI revision, and reads the plugin's
    /// metadata. `stem` names the plugin when the library leaves its name
    /// empty.
    ///
    /// # Safety
    /// This runs the library's initializers and trusts its exported
    /// symbols to match the ABI. Only load trusted plugins.
    pub unsafe fn open(path: &Path, stem: &str) -> Result<Self, PluginError> {
        let load_err = |message: String| PluginError::load(path, message);

        // SAFETY: caller vouches for the library.
        unsafe {
            let library = libloading::Library::new(path)
                .map_err(|e| load_err(format!("cannot open library: {e}")))?;

            let abi_version: FfiAbiVersionFn = *library
                .get::<FfiAbiVersionFn>(SYM_ABI_VERSION)
                .map_err(|e| load_err(format!("missing ABI version symbol: {e}")))?;
            let found = abi_version();
            if found != ABI_VERSION {
                return Err(load_err(format!(
                    "ABI version {found} does not match host version {ABI_VERSION}"
                )));
            }

            let info_fn: FfiPluginInfoFn = *library
                .get::<FfiPluginInfoFn>(SYM_INFO)
                .map_err(|e| load_err(format!("missing info symbol: {e}")))?;
            let init_fn: FfiPluginInitFn = *library
                .get::<FfiPluginInitFn>(SYM_INIT)
                .map_err(|e| load_err(format!("missing init symbol: {e}")))?;
            let process_fn: FfiPluginProcessFn = *library
                .get::<FfiPluginProcessFn>(SYM_PROCESS)
                .map_err(|e| load_err(format!("missing process symbol: {e}")))?;
            let shutdown_fn: FfiPluginShutdownFn = *library
                .get::<FfiPluginShutdownFn>(SYM_SHUTDOWN)
                .map_err(|e| load_err(format!("missing shutdown symbol: {e}")))?;

            let info = info_fn();
            if info.is_null() {
                return Err(load_err("library exported no plugin".to_string()));
            }
            let mut descriptor = descriptor_from_info(&*info).map_err(load_err)?;
            if descriptor.name.is_empty() {
                descriptor.name = stem.to_string();
            }

            info!(
                path = %path.display(),
                plugin = %descriptor.name,
                plugin_type = %descriptor.plugin_type,
                "Shared-library plugin opened"
            );

            Ok(Self {
                descriptor,
                init_fn,
                process_fn,
                shutdown_fn,
                bridge: Mutex::new(None),
                library: Arc::new(library),
            })
        }
    }

    /// Handle keeping the library mapped.
    pub fn library(&self) -> Arc<libloading::Library> {
        Arc::clone(&self.library)
    }
}

impl LogPlugin for LibraryPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn init(&self, helpers: &PluginHelpers) -> Result<(), PluginError> {
        let bridge = HelpersBridge::new(helpers.clone());
        // SAFETY: the table outlives the call and is kept until drop.
        let status = unsafe { (self.init_fn)(bridge.table()) };
        *self.bridge.lock().unwrap_or_else(PoisonError::into_inner) = Some(bridge);

        if status != 0 {
            return Err(PluginError::init(
                &self.descriptor.name,
                format!("init returned status {status}"),
            ));
        }
        Ok(())
    }

    fn process(&self, record: &LogRecord) -> Result<ProcessResult, PluginError> {
        // SAFETY: the record view lives for the duration of the call.
        let code = with_ffi_record(record, |raw| unsafe { (self.process_fn)(raw) });
        debug!(plugin = %self.descriptor.name, code, "Shared-library plugin processed record");
        ProcessResult::from_code(code).ok_or_else(|| {
            PluginError::process(&self.descriptor.name, format!("unknown result code {code}"))
        })
    }

    fn shutdown(&self) -> Result<(), PluginError> {
        // SAFETY: symbol resolved from the library we still hold.
        unsafe { (self.shutdown_fn)() };
        Ok(())
    }
}

impl std::fmt::Debug for LibraryPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryPlugin")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_rejects_non_library_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp
            .path()
            .join(format!("libbogus.{}", std::env::consts::DLL_EXTENSION));
        std::fs::write(&path, b"not a shared object").unwrap();

        let err = unsafe { LibraryPlugin::open(&path, "bogus") }.unwrap_err();
        assert!(matches!(err, PluginError::Load { .. }));
        assert!(err.to_string().contains("cannot open library"));
    }
}
