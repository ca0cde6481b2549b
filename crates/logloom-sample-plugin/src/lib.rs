//! Sample shared-library plugin built against the Logloom C ABI.
//!
//! Exports one FILTER named `c_sample`. It mirrors the ABI structs itself,
//! the way a plugin written in C would, and reads its settings through the
//! host's helpers table during init:
//!
//! - `fail_init` (bool): return a non-zero status from init.
//! - `min_level` (int): skip records below this level.
//! - `keyword` (string): skip records whose message contains it.
//! - `blocked` (string list): skip records containing any item.
//! - `process_code` (int, default 0): result code for records that pass.
//! - `trace_file` (string): every call is appended here, one per line.

use std::ffi::{CStr, c_char, c_void};
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[cfg(not(feature = "abi-mismatch"))]
const ABI_VERSION: u32 = 1;
#[cfg(feature = "abi-mismatch")]
const ABI_VERSION: u32 = 99;

const NAME: &CStr = c"c_sample";
const RESULT_ERROR: i32 = 1;
const RESULT_SKIP: i32 = 2;

#[repr(C)]
pub struct PluginInfo {
    pub name: *const c_char,
    pub version: *const c_char,
    pub author: *const c_char,
    pub description: *const c_char,
    pub plugin_type: u32,
    pub mode: u32,
    pub capabilities: u32,
}

#[repr(C)]
pub struct Record {
    pub level: i32,
    pub timestamp_ms: i64,
    pub message: *const c_char,
    pub module: *const c_char,
    pub source_file: *const c_char,
    pub source_line: u32,
    pub context_json: *const c_char,
}

#[repr(C)]
pub struct Helpers {
    pub ctx: *const c_void,
    pub get_int: unsafe extern "C" fn(*const c_void, *const c_char, *const c_char, i64) -> i64,
    pub get_bool: unsafe extern "C" fn(*const c_void, *const c_char, *const c_char, bool) -> bool,
    pub get_string: unsafe extern "C" fn(
        *const c_void,
        *const c_char,
        *const c_char,
        *const c_char,
        *mut c_char,
        usize,
    ) -> usize,
    pub get_string_list_len:
        unsafe extern "C" fn(*const c_void, *const c_char, *const c_char) -> usize,
    pub get_string_list_item: unsafe extern "C" fn(
        *const c_void,
        *const c_char,
        *const c_char,
        usize,
        *mut c_char,
        usize,
    ) -> isize,
}

struct StaticInfo(PluginInfo);

// SAFETY: every pointer refers to a `'static` C string literal.
unsafe impl Sync for StaticInfo {}

static INFO: StaticInfo = StaticInfo(PluginInfo {
    name: NAME.as_ptr(),
    version: c"1.2.0".as_ptr(),
    author: c"Logloom Team".as_ptr(),
    description: c"Sample C-ABI keyword and level filter".as_ptr(),
    plugin_type: 0,
    mode: 0,
    capabilities: 0,
});

#[derive(Debug, Default)]
struct Settings {
    min_level: i64,
    keyword: String,
    blocked: Vec<String>,
    process_code: i32,
    trace_file: String,
}

impl Settings {
    fn trace(&self, event: &str) {
        if self.trace_file.is_empty() {
            return;
        }
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.trace_file)
        {
            let _ = writeln!(file, "{event}");
        }
    }
}

static SETTINGS: Mutex<Option<Settings>> = Mutex::new(None);

fn settings() -> MutexGuard<'static, Option<Settings>> {
    SETTINGS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// `buf` must hold a NUL-terminated string.
unsafe fn buffer_text(buf: &[c_char]) -> String {
    // SAFETY: the host always terminates what it copies.
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Reads a string setting, growing the buffer once if the value is longer.
///
/// # Safety
/// `helpers` must be the live table passed to init.
unsafe fn read_string(helpers: &Helpers, key: &CStr) -> String {
    let mut buf = vec![0 as c_char; 16];
    // SAFETY: `buf` is writable for `buf.len()` bytes.
    unsafe {
        let len = (helpers.get_string)(
            helpers.ctx,
            NAME.as_ptr(),
            key.as_ptr(),
            c"".as_ptr(),
            buf.as_mut_ptr(),
            buf.len(),
        );
        if len >= buf.len() {
            buf = vec![0 as c_char; len + 1];
            (helpers.get_string)(
                helpers.ctx,
                NAME.as_ptr(),
                key.as_ptr(),
                c"".as_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        buffer_text(&buf)
    }
}

/// # Safety
/// `helpers` must be the live table passed to init.
unsafe fn read_list(helpers: &Helpers, key: &CStr) -> Vec<String> {
    // SAFETY: as above; each item buffer is writable for its length.
    unsafe {
        let len = (helpers.get_string_list_len)(helpers.ctx, NAME.as_ptr(), key.as_ptr());
        (0..len)
            .filter_map(|index| {
                let mut buf = [0 as c_char; 64];
                let n = (helpers.get_string_list_item)(
                    helpers.ctx,
                    NAME.as_ptr(),
                    key.as_ptr(),
                    index,
                    buf.as_mut_ptr(),
                    buf.len(),
                );
                (n >= 0).then(|| buffer_text(&buf))
            })
            .collect()
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn logloom_plugin_abi_version() -> u32 {
    ABI_VERSION
}

#[unsafe(no_mangle)]
pub extern "C" fn logloom_plugin_info() -> *const PluginInfo {
    &INFO.0
}

/// # Safety
/// `helpers` must be NULL or a valid table that outlives the plugin.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn logloom_plugin_init(helpers: *const Helpers) -> i32 {
    // SAFETY: per the ABI contract above.
    let Some(helpers) = (unsafe { helpers.as_ref() }) else {
        return -1;
    };

    // SAFETY: the table is live for the duration of init.
    let (loaded, fail) = unsafe {
        let int = |key: &CStr, default| {
            (helpers.get_int)(helpers.ctx, NAME.as_ptr(), key.as_ptr(), default)
        };
        let loaded = Settings {
            min_level: int(c"min_level", 0),
            keyword: read_string(helpers, c"keyword"),
            blocked: read_list(helpers, c"blocked"),
            process_code: i32::try_from(int(c"process_code", 0)).unwrap_or(RESULT_ERROR),
            trace_file: read_string(helpers, c"trace_file"),
        };
        let fail = (helpers.get_bool)(helpers.ctx, NAME.as_ptr(), c"fail_init".as_ptr(), false);
        (loaded, fail)
    };

    loaded.trace("init");
    *settings() = Some(loaded);
    i32::from(fail)
}

/// # Safety
/// `record` must be NULL or a valid record for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn logloom_plugin_process(record: *const Record) -> i32 {
    let guard = settings();
    // SAFETY: per the ABI contract above.
    let (Some(current), Some(record)) = (guard.as_ref(), unsafe { record.as_ref() }) else {
        return RESULT_ERROR;
    };
    let message = if record.message.is_null() {
        String::new()
    } else {
        // SAFETY: non-null strings in a record are NUL-terminated.
        unsafe { CStr::from_ptr(record.message) }
            .to_string_lossy()
            .into_owned()
    };
    current.trace(&format!("process:{message}"));

    if i64::from(record.level) < current.min_level {
        return RESULT_SKIP;
    }
    let keyword_hit = !current.keyword.is_empty() && message.contains(&current.keyword);
    if keyword_hit || current.blocked.iter().any(|b| message.contains(b.as_str())) {
        return RESULT_SKIP;
    }
    current.process_code
}

#[unsafe(no_mangle)]
pub extern "C" fn logloom_plugin_shutdown() {
    if let Some(current) = settings().take() {
        current.trace("shutdown");
    }
}
