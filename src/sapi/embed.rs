//! libphp-backed interpreter.
//!
//! PHP calls its SAPI callbacks without any user data, so the session being
//! executed on the current OS thread is parked in a thread-local pointer for
//! the duration of `php_execute_script`. [`SessionScope`] installs it and
//! clears it on drop; nothing outside this module sees the slot.
//!
//! Note: the SAPI name is "cli-server" so OPcache enables itself.

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::path::Path;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicBool, Ordering};

use super::bridge::Interpreter;
use super::callbacks::LogType;
use super::ffi::*;
use super::session::Session;

static SAPI_INITIALIZED: AtomicBool = AtomicBool::new(false);

static SAPI_NAME: &[u8] = b"cli-server\0";
static SAPI_PRETTY_NAME: &[u8] = b"PHP Embed Bridge\0";

thread_local! {
    static CURRENT_SESSION: Cell<*mut c_void> = const { Cell::new(ptr::null_mut()) };

    /// Cookie string handed to PHP; must outlive the request.
    static REQUEST_COOKIES: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Binds a session to the current thread for the lifetime of the scope.
struct SessionScope;

impl SessionScope {
    fn enter(session: &mut Session<'_>) -> Self {
        let raw = session as *mut Session<'_> as *mut c_void;
        CURRENT_SESSION.with(|slot| slot.set(raw));
        SessionScope
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        CURRENT_SESSION.with(|slot| slot.set(ptr::null_mut()));
        REQUEST_COOKIES.with(|c| c.borrow_mut().take());
    }
}

/// Run `f` against the session executing on this thread, if any.
fn with_session<R>(f: impl FnOnce(&mut Session<'_>) -> R) -> Option<R> {
    let raw = CURRENT_SESSION.with(Cell::get);
    if raw.is_null() {
        return None;
    }
    // SAFETY: the pointer was installed by SessionScope::enter from a live
    // `&mut Session` that outlives the scope, and callbacks run on the same
    // thread strictly inside that scope.
    let session = unsafe { &mut *(raw as *mut Session<'_>) };
    Some(f(session))
}

#[allow(clippy::declare_interior_mutable_const)]
static mut BRIDGE_SAPI_MODULE: sapi_module_struct = sapi_module_struct {
    name: SAPI_NAME.as_ptr() as *mut c_char,
    pretty_name: SAPI_PRETTY_NAME.as_ptr() as *mut c_char,

    startup: Some(sapi_startup_callback),
    shutdown: Some(sapi_shutdown_callback),
    activate: None,
    deactivate: None,

    ub_write: Some(sapi_ub_write),
    flush: None,
    get_stat: None,
    getenv: None,

    sapi_error: ptr::null_mut(),

    header_handler: Some(sapi_header_handler),
    send_headers: Some(sapi_send_headers),
    send_header: None,

    read_post: Some(sapi_read_post),
    read_cookies: Some(sapi_read_cookies),

    register_server_variables: Some(sapi_register_server_variables),
    log_message: Some(sapi_log_message),
    get_request_time: None,
    terminate_process: None,

    php_ini_path_override: ptr::null_mut(),
    default_post_reader: None,
    treat_data: None,
    executable_location: ptr::null_mut(),
    php_ini_ignore: 0,
    php_ini_ignore_cwd: 0,
    get_fd: None,
    force_http_10: None,
    get_target_uid: None,
    get_target_gid: None,
    input_filter: None,
    ini_defaults: None,
    phpinfo_as_text: 0,
    ini_entries: ptr::null(),
    additional_functions: ptr::null(),
    input_filter_init: None,
};

unsafe extern "C" fn sapi_startup_callback(_module: *mut sapi_module_struct) -> c_int {
    SUCCESS
}

unsafe extern "C" fn sapi_shutdown_callback(_module: *mut sapi_module_struct) -> c_int {
    SUCCESS
}

unsafe extern "C" fn sapi_ub_write(str: *const c_char, len: usize) -> usize {
    if str.is_null() || len == 0 {
        return 0;
    }
    let data = slice::from_raw_parts(str.cast::<u8>(), len);
    with_session(|s| s.write(data)).unwrap_or(len)
}

unsafe extern "C" fn sapi_header_handler(
    sapi_header: *mut sapi_header_struct,
    op: sapi_header_op_enum,
    _sapi_headers: *mut sapi_headers_struct,
) -> c_int {
    match op {
        sapi_header_op_enum::SAPI_HEADER_SET_STATUS => {
            // http_response_code() passes the code itself in the pointer slot
            let code = sapi_header as usize;
            if let Ok(code) = u16::try_from(code) {
                with_session(|s| s.set_status(code));
            }
        }
        sapi_header_op_enum::SAPI_HEADER_DELETE_ALL => {
            with_session(|s| s.clear_headers());
        }
        _ => {
            if sapi_header.is_null() || (*sapi_header).header.is_null() {
                return 0;
            }
            let Ok(line) = CStr::from_ptr((*sapi_header).header).to_str() else {
                return 0;
            };
            with_session(|s| {
                let _ = match op {
                    sapi_header_op_enum::SAPI_HEADER_REPLACE => s.replace_header(line),
                    sapi_header_op_enum::SAPI_HEADER_ADD => s.add_header(line),
                    _ => {
                        s.remove_header(line);
                        Ok(())
                    }
                };
            });
        }
    }
    // Headers are kept by the session, never by PHP's own list
    0
}

unsafe extern "C" fn sapi_send_headers(_sapi_headers: *mut sapi_headers_struct) -> c_int {
    match with_session(|s| s.send_headers()) {
        Some(false) => SAPI_HEADER_SEND_FAILED,
        _ => SAPI_HEADER_SENT_SUCCESSFULLY,
    }
}

unsafe extern "C" fn sapi_read_post(buffer: *mut c_char, count_bytes: usize) -> usize {
    if buffer.is_null() || count_bytes == 0 {
        return 0;
    }
    let buf = slice::from_raw_parts_mut(buffer.cast::<u8>(), count_bytes);
    with_session(|s| s.read_post(buf)).unwrap_or(0)
}

unsafe extern "C" fn sapi_read_cookies() -> *mut c_char {
    let cookies = with_session(|s| s.read_cookies())
        .flatten()
        .and_then(|c| CString::new(c).ok());
    REQUEST_COOKIES.with(|slot| {
        let mut slot = slot.borrow_mut();
        *slot = cookies;
        slot.as_ref()
            .map_or(ptr::null_mut(), |c| c.as_ptr() as *mut c_char)
    })
}

unsafe extern "C" fn sapi_register_server_variables(track_vars_array: *mut zval) {
    if track_vars_array.is_null() {
        return;
    }
    with_session(|s| {
        for (key, value) in s.server_vars() {
            if let Ok(key_c) = CString::new(key.as_str()) {
                php_register_variable_safe(
                    key_c.as_ptr(),
                    value.as_ptr() as *const c_char,
                    value.len(),
                    track_vars_array,
                );
            }
        }
    });
}

unsafe extern "C" fn sapi_log_message(message: *const c_char, syslog_type: c_int) {
    if message.is_null() {
        return;
    }
    let msg = CStr::from_ptr(message).to_string_lossy();
    let msg = msg.trim();
    if msg.is_empty() {
        return;
    }

    let log_type = LogType(syslog_type);
    if with_session(|s| s.log(msg, log_type)).is_none() {
        // Outside a request (module startup warnings)
        match log_type.level() {
            tracing::Level::ERROR => tracing::error!(target: "php", "{}", msg),
            tracing::Level::WARN => tracing::warn!(target: "php", "{}", msg),
            tracing::Level::INFO => tracing::info!(target: "php", "{}", msg),
            _ => tracing::debug!(target: "php", "{}", msg),
        }
    }
}

/// Interpreter backed by the linked libphp.
#[derive(Debug, Default)]
pub struct PhpInterpreter;

impl PhpInterpreter {
    pub fn new() -> Self {
        Self
    }
}

impl Interpreter for PhpInterpreter {
    fn startup(&self, version_hint: &str) -> Result<(), String> {
        if SAPI_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        tracing::info!(sapi_name = "cli-server", version = %version_hint, "Initializing SAPI module");

        unsafe {
            // ZTS builds need TSRM before sapi_startup
            if !php_tsrm_startup() {
                SAPI_INITIALIZED.store(false, Ordering::SeqCst);
                return Err("php_tsrm_startup failed".to_string());
            }

            sapi_startup(&raw mut BRIDGE_SAPI_MODULE);

            let result = php_module_startup(&raw mut BRIDGE_SAPI_MODULE, ptr::null_mut());
            if result != SUCCESS {
                sapi_shutdown();
                SAPI_INITIALIZED.store(false, Ordering::SeqCst);
                return Err(format!("php_module_startup failed with code {}", result));
            }
        }

        Ok(())
    }

    fn shutdown(&self) {
        if !SAPI_INITIALIZED.swap(false, Ordering::SeqCst) {
            return;
        }
        unsafe {
            php_module_shutdown();
            sapi_shutdown();
        }
        tracing::info!(sapi_name = "cli-server", "SAPI module shutdown complete");
    }

    fn execute(&self, session: &mut Session<'_>) -> Result<(), String> {
        let path = resolve_script(session);
        let filename =
            CString::new(path.as_bytes()).map_err(|_| format!("invalid script path: {}", path))?;

        let _scope = SessionScope::enter(session);

        unsafe {
            // Attach this OS thread to TSRM (no-op when already attached)
            ts_resource_ex(0, ptr::null_mut());

            if php_request_startup() != SUCCESS {
                return Err("php_request_startup failed".to_string());
            }

            let mut file_handle: zend_file_handle = std::mem::zeroed();
            zend_stream_init_filename(&mut file_handle, filename.as_ptr());
            let ok = php_execute_script(&mut file_handle);
            zend_destroy_file_handle(&mut file_handle);

            php_request_shutdown(ptr::null_mut());

            if !ok {
                return Err(format!("php_execute_script failed for {}", path));
            }
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "php-embed"
    }
}

/// Script file to hand PHP: the context's script path, else the script
/// joined onto the document root.
fn resolve_script(session: &Session<'_>) -> String {
    if let Some(path) = session.script_path().filter(|p| !p.is_empty()) {
        return path.to_string();
    }
    match session.document_root() {
        Some(root) if !Path::new(session.script()).is_absolute() => Path::new(root)
            .join(session.script().trim_start_matches('/'))
            .to_string_lossy()
            .into_owned(),
        _ => session.script().to_string(),
    }
}
