//! Minimal libphp bindings used by the embedded interpreter.
//!
//! Layouts follow PHP 8.x ZTS headers. Only the pieces the SAPI module
//! touches are declared; everything else stays opaque.

#![allow(non_camel_case_types)]
#![allow(dead_code)]

use std::ffi::{c_char, c_int, c_uint, c_void};

pub type zend_result = c_int;
pub type zend_long = i64;
pub type zend_ulong = u64;

pub type zend_stat_t = libc::stat;

#[repr(C)]
pub struct zend_refcounted_h {
    pub refcount: u32,
    pub type_info: u32,
}

#[repr(C)]
pub struct zend_string {
    pub gc: zend_refcounted_h,
    pub h: zend_ulong,
    pub len: usize,
    pub val: [c_char; 1],
}

/// Opaque
#[repr(C)]
pub struct HashTable {
    _data: [u8; 56],
}

/// Opaque
#[repr(C)]
pub struct zend_llist {
    _data: [u8; 56],
}

/// Opaque; only ever handled by pointer.
#[repr(C)]
pub struct zval {
    _data: [u8; 16],
}

/// Opaque; only referenced through `additional_functions`.
#[repr(C)]
pub struct zend_function_entry {
    _private: [u8; 0],
}

#[repr(C)]
pub struct sapi_header_struct {
    pub header: *mut c_char,
    pub header_len: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum sapi_header_op_enum {
    SAPI_HEADER_REPLACE = 0,
    SAPI_HEADER_ADD = 1,
    SAPI_HEADER_DELETE = 2,
    SAPI_HEADER_DELETE_PREFIX = 3,
    SAPI_HEADER_DELETE_ALL = 4,
    SAPI_HEADER_SET_STATUS = 5,
}

#[repr(C)]
pub struct sapi_headers_struct {
    pub headers: zend_llist,
    pub http_response_code: c_int,
    pub send_default_content_type: u8,
    pub mimetype: *mut c_char,
    pub http_status_line: *mut c_char,
}

#[repr(C)]
pub struct sapi_module_struct {
    pub name: *mut c_char,
    pub pretty_name: *mut c_char,

    pub startup: Option<unsafe extern "C" fn(*mut sapi_module_struct) -> c_int>,
    pub shutdown: Option<unsafe extern "C" fn(*mut sapi_module_struct) -> c_int>,

    pub activate: Option<unsafe extern "C" fn() -> c_int>,
    pub deactivate: Option<unsafe extern "C" fn() -> c_int>,

    pub ub_write: Option<unsafe extern "C" fn(*const c_char, usize) -> usize>,
    pub flush: Option<unsafe extern "C" fn(*mut c_void)>,
    pub get_stat: Option<unsafe extern "C" fn() -> *mut zend_stat_t>,
    pub getenv: Option<unsafe extern "C" fn(*const c_char, usize) -> *mut c_char>,

    pub sapi_error: *mut c_void,
    pub header_handler: Option<
        unsafe extern "C" fn(
            *mut sapi_header_struct,
            sapi_header_op_enum,
            *mut sapi_headers_struct,
        ) -> c_int,
    >,
    pub send_headers: Option<unsafe extern "C" fn(*mut sapi_headers_struct) -> c_int>,
    pub send_header: Option<unsafe extern "C" fn(*mut sapi_header_struct, *mut c_void)>,

    pub read_post: Option<unsafe extern "C" fn(*mut c_char, usize) -> usize>,
    pub read_cookies: Option<unsafe extern "C" fn() -> *mut c_char>,

    pub register_server_variables: Option<unsafe extern "C" fn(*mut zval)>,
    pub log_message: Option<unsafe extern "C" fn(*const c_char, c_int)>,
    pub get_request_time: Option<unsafe extern "C" fn(*mut f64) -> zend_result>,
    pub terminate_process: Option<unsafe extern "C" fn()>,

    // STANDARD_SAPI_MODULE_PROPERTIES
    pub php_ini_path_override: *mut c_char,
    pub default_post_reader: Option<unsafe extern "C" fn()>,
    pub treat_data: Option<unsafe extern "C" fn(c_int, *mut c_char, *mut zval)>,
    pub executable_location: *mut c_char,

    pub php_ini_ignore: c_int,
    pub php_ini_ignore_cwd: c_int,

    pub get_fd: Option<unsafe extern "C" fn(*mut c_int) -> c_int>,
    pub force_http_10: Option<unsafe extern "C" fn() -> c_int>,
    pub get_target_uid: Option<unsafe extern "C" fn(*mut libc::uid_t) -> c_int>,
    pub get_target_gid: Option<unsafe extern "C" fn(*mut libc::gid_t) -> c_int>,

    pub input_filter: Option<
        unsafe extern "C" fn(c_int, *const c_char, *mut *mut c_char, usize, *mut usize) -> c_uint,
    >,

    pub ini_defaults: Option<unsafe extern "C" fn(*mut HashTable)>,
    pub phpinfo_as_text: c_int,

    pub ini_entries: *const c_char,
    pub additional_functions: *const zend_function_entry,
    pub input_filter_init: Option<unsafe extern "C" fn() -> c_uint>,
}

#[repr(C)]
pub struct zend_file_handle {
    pub handle: zend_file_handle_union,
    pub filename: *const zend_string,
    pub opened_path: *mut zend_string,
    pub type_: u8,
    pub primary_script: bool,
    pub in_list: bool,
    pub buf: *mut c_char,
    pub len: usize,
}

#[repr(C)]
pub union zend_file_handle_union {
    pub fp: *mut libc::FILE,
    pub stream: zend_stream,
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct zend_stream {
    pub handle: *mut c_void,
    pub isatty: c_int,
    pub reader: *mut c_void,
    pub fsizer: *mut c_void,
    pub closer: *mut c_void,
}

pub const SUCCESS: c_int = 0;
pub const FAILURE: c_int = -1;

pub const SAPI_HEADER_SENT_SUCCESSFULLY: c_int = 1;
pub const SAPI_HEADER_SEND_FAILED: c_int = 3;

#[link(name = "php")]
extern "C" {
    pub fn php_tsrm_startup() -> bool;

    pub fn sapi_startup(sf: *mut sapi_module_struct);
    pub fn sapi_shutdown();

    pub fn php_module_startup(
        sf: *mut sapi_module_struct,
        additional_module: *mut c_void,
    ) -> zend_result;
    pub fn php_module_shutdown();

    pub fn php_request_startup() -> zend_result;
    pub fn php_request_shutdown(dummy: *mut c_void);

    // bool since PHP 8.0
    pub fn php_execute_script(primary_file: *mut zend_file_handle) -> bool;

    pub fn zend_stream_init_filename(handle: *mut zend_file_handle, filename: *const c_char);
    pub fn zend_destroy_file_handle(handle: *mut zend_file_handle);

    pub fn php_register_variable_safe(
        var: *const c_char,
        val: *const c_char,
        val_len: usize,
        track_vars_array: *mut zval,
    );

    pub fn ts_resource_ex(id: c_int, th_id: *mut c_void) -> *mut c_void;
}
