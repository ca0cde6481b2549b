//! FFI safety wrappers: conversions between ABI types and Rust types, and
//! the host side of the config accessor table.

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::ptr;

use logloom_core::LogRecord;

use crate::contract::{PluginCapabilities, PluginDescriptor, PluginMode, PluginType};
use crate::helpers::PluginHelpers;

use super::abi::{FfiHelpers, FfiLogRecord, FfiPluginInfo};

/// Converts a C string pointer to a `String`, replacing invalid UTF-8.
///
/// Returns `None` for NULL.
///
/// # Safety
/// `ptr` must be NULL or point to a NUL-terminated string that stays
/// valid for the duration of the call.
pub unsafe fn c_str_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let s = unsafe { CStr::from_ptr(ptr) };
    Some(s.to_string_lossy().into_owned())
}

/// Converts a Rust string to a `CString`, dropping interior NUL bytes.
pub fn sanitized_c_string(s: &str) -> CString {
    let bytes: Vec<u8> = s.bytes().filter(|b| *b != 0).collect();
    CString::new(bytes).unwrap_or_default()
}

/// Copies `value` into a caller buffer as a NUL-terminated string,
/// truncating if needed. Returns the untruncated byte length.
///
/// # Safety
/// `buf` must be NULL or valid for writes of `buf_len` bytes.
pub unsafe fn copy_to_buffer(value: &str, buf: *mut c_char, buf_len: usize) -> usize {
    let bytes = value.as_bytes();
    if !buf.is_null() && buf_len > 0 {
        let n = bytes.len().min(buf_len - 1);
        // SAFETY: `n + 1 <= buf_len` and `buf` is writable for `buf_len`.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), buf, n);
            *buf.add(n) = 0;
        }
    }
    bytes.len()
}

/// Builds a descriptor from library metadata.
///
/// # Safety
/// Every string pointer in `info` must be NULL or a valid C string.
pub unsafe fn descriptor_from_info(info: &FfiPluginInfo) -> Result<PluginDescriptor, String> {
    if info.mode != 0 {
        return Err(format!("unsupported plugin mode {}", info.mode));
    }
    // SAFETY: forwarded from the caller's contract on `info`.
    let text = |p: *const c_char| unsafe { c_str_to_string(p) }.unwrap_or_default();
    Ok(PluginDescriptor {
        name: text(info.name),
        version: text(info.version),
        author: text(info.author),
        description: text(info.description),
        plugin_type: PluginType::from_code(info.plugin_type),
        mode: PluginMode::Synchronous,
        capabilities: PluginCapabilities::from_bits_truncate(info.capabilities),
    })
}

/// Lends `record` to `call` as an [`FfiLogRecord`]. The pointers inside
/// are valid only until `call` returns.
pub fn with_ffi_record<R>(record: &LogRecord, call: impl FnOnce(&FfiLogRecord) -> R) -> R {
    let message = sanitized_c_string(&record.message);
    let module = sanitized_c_string(&record.module);
    let source_file = sanitized_c_string(&record.source_file);
    let context =
        sanitized_c_string(&serde_json::to_string(&record.context).unwrap_or_default());

    let raw = FfiLogRecord {
        level: record.level.as_i64() as i32,
        timestamp_ms: record.timestamp.timestamp_millis(),
        message: message.as_ptr(),
        module: module.as_ptr(),
        source_file: source_file.as_ptr(),
        source_line: record.source_line,
        context_json: context.as_ptr(),
    };
    call(&raw)
}

/// Owns a [`PluginHelpers`] and the C table pointing at it.
///
/// Boxed so the table's `ctx` pointer stays valid; keep it alive for as
/// long as the library may call back.
pub struct HelpersBridge {
    helpers: PluginHelpers,
    table: FfiHelpers,
}

// SAFETY: `table.ctx` only ever points at `helpers`, which is immutable
// and itself Send + Sync.
unsafe impl Send for HelpersBridge {}
unsafe impl Sync for HelpersBridge {}

impl HelpersBridge {
    /// Builds the bridge.
    pub fn new(helpers: PluginHelpers) -> Box<Self> {
        let mut bridge = Box::new(Self {
            helpers,
            table: FfiHelpers {
                ctx: ptr::null(),
                get_int: host_get_int,
                get_bool: host_get_bool,
                get_string: host_get_string,
                get_string_list_len: host_get_string_list_len,
                get_string_list_item: host_get_string_list_item,
            },
        });
        bridge.table.ctx = (&bridge.helpers as *const PluginHelpers).cast::<c_void>();
        bridge
    }

    /// Table to pass to `logloom_plugin_init`.
    pub fn table(&self) -> *const FfiHelpers {
        &self.table
    }
}

impl std::fmt::Debug for HelpersBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelpersBridge")
            .field("helpers", &self.helpers)
            .finish()
    }
}

/// Resolves the context and the two key strings of a callback.
///
/// # Safety
/// `ctx` must come from a live [`HelpersBridge`]; `plugin` and `key` must
/// be NULL or valid C strings.
unsafe fn resolve<'a>(
    ctx: *const c_void,
    plugin: *const c_char,
    key: *const c_char,
) -> Option<(&'a PluginHelpers, String, String)> {
    if ctx.is_null() {
        return None;
    }
    // SAFETY: see function contract.
    unsafe {
        let helpers = &*ctx.cast::<PluginHelpers>();
        Some((helpers, c_str_to_string(plugin)?, c_str_to_string(key)?))
    }
}

unsafe extern "C" fn host_get_int(
    ctx: *const c_void,
    plugin: *const c_char,
    key: *const c_char,
    default: i64,
) -> i64 {
    // SAFETY: arguments come from a plugin honoring the helpers contract.
    match unsafe { resolve(ctx, plugin, key) } {
        Some((helpers, plugin, key)) => helpers.get_int(&plugin, &key, default),
        None => default,
    }
}

unsafe extern "C" fn host_get_bool(
    ctx: *const c_void,
    plugin: *const c_char,
    key: *const c_char,
    default: bool,
) -> bool {
    // SAFETY: as above.
    match unsafe { resolve(ctx, plugin, key) } {
        Some((helpers, plugin, key)) => helpers.get_bool(&plugin, &key, default),
        None => default,
    }
}

unsafe extern "C" fn host_get_string(
    ctx: *const c_void,
    plugin: *const c_char,
    key: *const c_char,
    default: *const c_char,
    buf: *mut c_char,
    buf_len: usize,
) -> usize {
    // SAFETY: as above; `buf` is writable for `buf_len` per the ABI.
    unsafe {
        let default = c_str_to_string(default).unwrap_or_default();
        let value = match resolve(ctx, plugin, key) {
            Some((helpers, plugin, key)) => helpers.get_string(&plugin, &key, &default),
            None => default,
        };
        copy_to_buffer(&value, buf, buf_len)
    }
}

unsafe extern "C" fn host_get_string_list_len(
    ctx: *const c_void,
    plugin: *const c_char,
    key: *const c_char,
) -> usize {
    // SAFETY: as above.
    match unsafe { resolve(ctx, plugin, key) } {
        Some((helpers, plugin, key)) => helpers.get_string_list(&plugin, &key, &[]).len(),
        None => 0,
    }
}

unsafe extern "C" fn host_get_string_list_item(
    ctx: *const c_void,
    plugin: *const c_char,
    key: *const c_char,
    index: usize,
    buf: *mut c_char,
    buf_len: usize,
) -> isize {
    // SAFETY: as above; `buf` is writable for `buf_len` per the ABI.
    unsafe {
        let Some((helpers, plugin, key)) = resolve(ctx, plugin, key) else {
            return -1;
        };
        match helpers.get_string_list(&plugin, &key, &[]).get(index) {
            Some(item) => isize::try_from(copy_to_buffer(item, buf, buf_len)).unwrap_or(isize::MAX),
            None => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logloom_core::LogLevel;
    use logloom_core::config::PluginManifest;
    use serde_json::json;

    fn bridge() -> Box<HelpersBridge> {
        let manifest = PluginManifest::from_json(
            &json!({
                "plugin_configs": {
                    "c_plugin": {
                        "limit": 12,
                        "strict": "yes",
                        "target": "stdout",
                        "keywords": ["ERROR", "panic"]
                    }
                }
            })
            .to_string(),
        )
        .unwrap();
        HelpersBridge::new(PluginHelpers::from_manifest(&manifest))
    }

    #[test]
    fn test_copy_to_buffer_truncates_and_reports_length() {
        let mut buf = [1 as c_char; 4];
        let len = unsafe { copy_to_buffer("abcdef", buf.as_mut_ptr(), buf.len()) };
        assert_eq!(len, 6);
        let copied = unsafe { c_str_to_string(buf.as_ptr()) }.unwrap();
        assert_eq!(copied, "abc");
        assert_eq!(unsafe { copy_to_buffer("xy", ptr::null_mut(), 0) }, 2);
    }

    #[test]
    fn test_sanitized_c_string_drops_nul() {
        assert_eq!(sanitized_c_string("a\0b").to_str().unwrap(), "ab");
    }

    #[test]
    fn test_table_callbacks_read_config() {
        let bridge = bridge();
        let table = unsafe { &*bridge.table() };
        let plugin = sanitized_c_string("c_plugin");
        let key = |k: &str| sanitized_c_string(k);

        unsafe {
            assert_eq!((table.get_int)(table.ctx, plugin.as_ptr(), key("limit").as_ptr(), 0), 12);
            assert_eq!((table.get_int)(table.ctx, plugin.as_ptr(), key("nope").as_ptr(), 5), 5);
            assert!((table.get_bool)(table.ctx, plugin.as_ptr(), key("strict").as_ptr(), false));

            let mut buf = [0 as c_char; 32];
            let default = sanitized_c_string("file");
            let len = (table.get_string)(
                table.ctx,
                plugin.as_ptr(),
                key("target").as_ptr(),
                default.as_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
            );
            assert_eq!(len, 6);
            assert_eq!(c_str_to_string(buf.as_ptr()).unwrap(), "stdout");

            let keywords = key("keywords");
            let len = (table.get_string_list_len)(table.ctx, plugin.as_ptr(), keywords.as_ptr());
            assert_eq!(len, 2);
            let n = (table.get_string_list_item)(
                table.ctx,
                plugin.as_ptr(),
                keywords.as_ptr(),
                1,
                buf.as_mut_ptr(),
                buf.len(),
            );
            assert_eq!(n, 5);
            assert_eq!(c_str_to_string(buf.as_ptr()).unwrap(), "panic");
            assert_eq!(
                (table.get_string_list_item)(
                    table.ctx,
                    plugin.as_ptr(),
                    keywords.as_ptr(),
                    2,
                    buf.as_mut_ptr(),
                    buf.len(),
                ),
                -1
            );
        }
    }

    #[test]
    fn test_descriptor_from_info_rejects_async_mode() {
        let name = sanitized_c_string("c_plugin");
        let mut info = FfiPluginInfo {
            name: name.as_ptr(),
            version: ptr::null(),
            author: ptr::null(),
            description: ptr::null(),
            plugin_type: 1,
            mode: 0,
            capabilities: 0b10,
        };
        let desc = unsafe { descriptor_from_info(&info) }.unwrap();
        assert_eq!(desc.name, "c_plugin");
        assert_eq!(desc.plugin_type, PluginType::Sink);
        assert!(desc.capabilities.contains(PluginCapabilities::STRUCTURED_PAYLOAD));
        assert!(desc.version.is_empty());

        info.mode = 1;
        assert!(unsafe { descriptor_from_info(&info) }.is_err());
    }

    #[test]
    fn test_with_ffi_record_exposes_fields() {
        let record = LogRecord::new(LogLevel::Warn, "disk low")
            .with_module("storage")
            .with_location("disk.rs", 7)
            .with_context("free_mb", json!(12));
        let (level, message, context) = with_ffi_record(&record, |raw| unsafe {
            (
                raw.level,
                c_str_to_string(raw.message).unwrap(),
                c_str_to_string(raw.context_json).unwrap(),
            )
        });
        assert_eq!(level, 2);
        assert_eq!(message, "disk low");
        assert_eq!(context, r#"{"free_mb":12}"#);
    }
}
