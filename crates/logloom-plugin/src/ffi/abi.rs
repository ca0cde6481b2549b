//! FFI ABI definitions for shared-library plugins.
//!
//! A library exports one plugin through these C symbols:
//!
//! ```c
//! uint32_t              logloom_plugin_abi_version(void);
//! const LogloomPluginInfo *logloom_plugin_info(void);
//! int32_t               logloom_plugin_init(const LogloomHelpers *helpers);
//! int32_t               logloom_plugin_process(const LogloomRecord *record);
//! void                  logloom_plugin_shutdown(void);
//! ```
//!
//! `init` returns 0 on success. `process` returns a result code
//! (0 = ok, 1 = error, 2 = skip, 3 = retry); anything else is a fault.

use std::os::raw::{c_char, c_void};

/// ABI revision this host understands.
pub const ABI_VERSION: u32 = 1;

// Exported symbol names, NUL-terminated for `libloading`.
pub const SYM_ABI_VERSION: &[u8] = b"logloom_plugin_abi_version\0";
pub const SYM_INFO: &[u8] = b"logloom_plugin_info\0";
pub const SYM_INIT: &[u8] = b"logloom_plugin_init\0";
pub const SYM_PROCESS: &[u8] = b"logloom_plugin_process\0";
pub const SYM_SHUTDOWN: &[u8] = b"logloom_plugin_shutdown\0";

/// FFI-safe plugin metadata. Strings are NUL-terminated and owned by the
/// library; NULL means empty.
#[repr(C)]
pub struct FfiPluginInfo {
    /// Plugin name. Empty or NULL means "use the library stem".
    pub name: *const c_char,
    /// Version.
    pub version: *const c_char,
    /// Author.
    pub author: *const c_char,
    /// Description.
    pub description: *const c_char,
    /// 0 filter, 1 sink, 2 analysis, 3 text resource.
    pub plugin_type: u32,
    /// 0 synchronous. Other values are rejected.
    pub mode: u32,
    /// Capability bits.
    pub capabilities: u32,
}

/// FFI-safe view of a log record, valid only for the duration of the call.
#[repr(C)]
pub struct FfiLogRecord {
    /// Numeric level, 0 (debug) to 4 (fatal).
    pub level: i32,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Message text.
    pub message: *const c_char,
    /// Emitting module.
    pub module: *const c_char,
    /// Source file.
    pub source_file: *const c_char,
    /// Source line.
    pub source_line: u32,
    /// Context map as a JSON object.
    pub context_json: *const c_char,
}

/// Reads an integer setting: `(ctx, plugin, key, default)`.
pub type FfiGetIntFn =
    unsafe extern "C" fn(*const c_void, *const c_char, *const c_char, i64) -> i64;

/// Reads a boolean setting: `(ctx, plugin, key, default)`.
pub type FfiGetBoolFn =
    unsafe extern "C" fn(*const c_void, *const c_char, *const c_char, bool) -> bool;

/// Copies a string setting into a caller buffer:
/// `(ctx, plugin, key, default, buf, buf_len)`.
///
/// Writes at most `buf_len - 1` bytes plus a NUL and returns the full
/// length of the value, so a caller can retry with a bigger buffer.
pub type FfiGetStringFn = unsafe extern "C" fn(
    *const c_void,
    *const c_char,
    *const c_char,
    *const c_char,
    *mut c_char,
    usize,
) -> usize;

/// Number of items in a string-list setting: `(ctx, plugin, key)`.
pub type FfiGetListLenFn =
    unsafe extern "C" fn(*const c_void, *const c_char, *const c_char) -> usize;

/// Copies one string-list item: `(ctx, plugin, key, index, buf, buf_len)`.
///
/// Same buffer contract as [`FfiGetStringFn`]; returns -1 if `index` is
/// out of range.
pub type FfiGetListItemFn = unsafe extern "C" fn(
    *const c_void,
    *const c_char,
    *const c_char,
    usize,
    *mut c_char,
    usize,
) -> isize;

/// Config accessor table handed to `logloom_plugin_init`. Stays valid until
/// the plugin is unloaded.
#[repr(C)]
pub struct FfiHelpers {
    /// Opaque host context; pass back unchanged.
    pub ctx: *const c_void,
    /// Integer getter.
    pub get_int: FfiGetIntFn,
    /// Boolean getter.
    pub get_bool: FfiGetBoolFn,
    /// String getter.
    pub get_string: FfiGetStringFn,
    /// String-list length.
    pub get_string_list_len: FfiGetListLenFn,
    /// String-list item.
    pub get_string_list_item: FfiGetListItemFn,
}

/// `logloom_plugin_abi_version`.
pub type FfiAbiVersionFn = unsafe extern "C" fn() -> u32;

/// `logloom_plugin_info`.
pub type FfiPluginInfoFn = unsafe extern "C" fn() -> *const FfiPluginInfo;

/// `logloom_plugin_init`.
pub type FfiPluginInitFn = unsafe extern "C" fn(helpers: *const FfiHelpers) -> i32;

/// `logloom_plugin_process`.
pub type FfiPluginProcessFn = unsafe extern "C" fn(record: *const FfiLogRecord) -> i32;

/// `logloom_plugin_shutdown`.
pub type FfiPluginShutdownFn = unsafe extern "C" fn();
