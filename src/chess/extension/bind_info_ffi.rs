use ::duckdb::vtab::BindInfo;
use libduckdb_sys::{
    duckdb_bind_get_named_parameter, duckdb_bind_info, duckdb_destroy_value, duckdb_free,
    duckdb_get_varchar, duckdb_is_null_value,
};
use std::ffi::{CStr, CString};
use std::os::raw::c_void;

/// Reads a named `VARCHAR` parameter. Omitted and SQL `NULL` both read as `None`.
pub(crate) fn named_varchar(
    bind: &BindInfo,
    name: &str,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let name_cstr = CString::new(name)?;

    // SAFETY: the returned handle is owned by us and destroyed below.
    let mut value =
        unsafe { duckdb_bind_get_named_parameter(bind_info_ptr(bind), name_cstr.as_ptr()) };
    if value.is_null() {
        return Ok(None);
    }

    // SAFETY: `value` is a live `duckdb_value`; the varchar copy is freed with `duckdb_free`.
    let result = unsafe {
        if duckdb_is_null_value(value) {
            Ok(None)
        } else {
            let varchar = duckdb_get_varchar(value);
            if varchar.is_null() {
                Err(format!("failed to read named parameter '{name}' as VARCHAR").into())
            } else {
                let text = CStr::from_ptr(varchar).to_string_lossy().into_owned();
                duckdb_free(varchar as *mut c_void);
                Ok(Some(text))
            }
        }
    };

    // SAFETY: `value` is released exactly once.
    unsafe {
        duckdb_destroy_value(&mut value);
    }

    result
}

fn bind_info_ptr(bind: &BindInfo) -> duckdb_bind_info {
    // SAFETY: `BindInfo` wraps a single `duckdb_bind_info` and exposes no raw
    // accessor; re-check this layout when upgrading duckdb-rs.
    unsafe { *(bind as *const BindInfo as *const duckdb_bind_info) }
}
