use libduckdb_sys::duckdb_string_t;
use std::ffi::{CString, NulError};

/// Copy a DuckDB `VARCHAR` row into an owned `String`, replacing invalid UTF-8.
///
/// # Safety
///
/// `s` must be a non-NULL row of a `VARCHAR` vector that is still valid for the
/// current invocation.
pub unsafe fn decode_duckdb_string(s: &duckdb_string_t) -> String {
    // SAFETY: the length field sits at the same offset in both union variants.
    let len = unsafe { s.value.inlined.length } as usize;
    if len == 0 {
        return String::new();
    }

    let bytes = if len <= 12 {
        // SAFETY: strings of at most 12 bytes are stored inline.
        let inlined = unsafe { &s.value.inlined.inlined };
        // SAFETY: `inlined` holds `len` initialized bytes.
        unsafe { std::slice::from_raw_parts(inlined.as_ptr() as *const u8, len) }
    } else {
        // SAFETY: longer strings point at DuckDB-owned storage of `len` bytes.
        unsafe { std::slice::from_raw_parts(s.value.pointer.ptr as *const u8, len) }
    };
    String::from_utf8_lossy(bytes).into_owned()
}

/// Build a `CString` for DuckDB output, replacing interior NUL bytes with spaces.
pub fn to_cstring(value: &str) -> Result<CString, NulError> {
    if value.contains('\0') {
        CString::new(value.replace('\0', " "))
    } else {
        CString::new(value)
    }
}
