// C entry points over ScopedBuilder, in libxml2's handle-based style.
//
// Every handle returned by `xmlNewScopedBuilder` is recorded in a registry so
// that stale, foreign or double-freed pointers are rejected instead of
// dereferenced.

use crate::builder::ScopedBuilder;
use crate::error::BuilderError;
use crate::tree::{DEFAULT_ENCODING, DEFAULT_VERSION, Standalone};
use libc::{c_char, c_int};
use log::warn;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::ffi::CStr;
use std::ptr;
use std::sync::Mutex;

pub const XML_BUILDER_OK: c_int = 0;
pub const XML_BUILDER_ERR_ARGUMENT: c_int = -1;
pub const XML_BUILDER_ERR_INVALID_STATE: c_int = -2;
pub const XML_BUILDER_ERR_SCOPE_UNDERFLOW: c_int = -3;

#[allow(non_camel_case_types)]
pub type xmlScopedBuilder = ScopedBuilder;

static LIVE_BUILDERS: Lazy<Mutex<HashSet<usize>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn register_builder(builder: *mut xmlScopedBuilder) {
    let mut live = LIVE_BUILDERS.lock().unwrap_or_else(|e| e.into_inner());
    live.insert(builder as usize);
}

fn unregister_builder(builder: *mut xmlScopedBuilder) -> bool {
    let mut live = LIVE_BUILDERS.lock().unwrap_or_else(|e| e.into_inner());
    live.remove(&(builder as usize))
}

fn is_live(builder: *mut xmlScopedBuilder) -> bool {
    let live = LIVE_BUILDERS.lock().unwrap_or_else(|e| e.into_inner());
    live.contains(&(builder as usize))
}

fn status_of<T>(result: Result<T, BuilderError>) -> c_int {
    match result {
        Ok(_) => XML_BUILDER_OK,
        Err(BuilderError::InvalidState { reason }) => {
            warn!(target: "xml2::ffi", "{reason}");
            XML_BUILDER_ERR_INVALID_STATE
        }
        Err(BuilderError::ScopeUnderflow) => XML_BUILDER_ERR_SCOPE_UNDERFLOW,
    }
}

/// Run `f` against a registered builder, or report an argument error.
///
/// # Safety
/// `builder` is only dereferenced after it has been found in the registry.
unsafe fn with_builder<F>(builder: *mut xmlScopedBuilder, f: F) -> c_int
where
    F: FnOnce(&mut ScopedBuilder) -> c_int,
{
    if builder.is_null() || !is_live(builder) {
        warn!(target: "xml2::ffi", "unknown builder handle {builder:p}");
        return XML_BUILDER_ERR_ARGUMENT;
    }
    f(unsafe { &mut *builder })
}

/// Borrow a NUL-terminated UTF-8 string, `None` for null or invalid UTF-8.
///
/// # Safety
/// `value` must be null or a valid NUL-terminated string.
unsafe fn borrow_str<'a>(value: *const c_char) -> Option<&'a str> {
    if value.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(value) }.to_str().ok()
}

/// Allocate a new builder. Release it with `xmlFreeScopedBuilder`.
#[unsafe(no_mangle)]
pub extern "C" fn xmlNewScopedBuilder() -> *mut xmlScopedBuilder {
    let builder = Box::into_raw(Box::new(ScopedBuilder::new()));
    register_builder(builder);
    builder
}

/// Free a builder and its document.
///
/// # Safety
/// `builder` must be null or a handle from `xmlNewScopedBuilder`. Unknown
/// and already-freed handles are ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlFreeScopedBuilder(builder: *mut xmlScopedBuilder) {
    if builder.is_null() || !unregister_builder(builder) {
        return;
    }
    drop(unsafe { Box::from_raw(builder) });
}

/// Add the XML declaration. Null `version`/`encoding` select `1.0` and
/// `utf-8`; `standalone` follows `xmlDoc.standalone` (1 yes, 0 no, -1 unset).
///
/// # Safety
/// String arguments must be null or valid NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlScopedBuilderDeclaration(
    builder: *mut xmlScopedBuilder,
    version: *const c_char,
    encoding: *const c_char,
    standalone: c_int,
) -> c_int {
    let Some(standalone) = Standalone::from_c_int(standalone) else {
        return XML_BUILDER_ERR_ARGUMENT;
    };
    let version = if version.is_null() {
        DEFAULT_VERSION
    } else {
        match unsafe { borrow_str(version) } {
            Some(v) => v,
            None => return XML_BUILDER_ERR_ARGUMENT,
        }
    };
    let encoding = if encoding.is_null() {
        DEFAULT_ENCODING
    } else {
        match unsafe { borrow_str(encoding) } {
            Some(e) => e,
            None => return XML_BUILDER_ERR_ARGUMENT,
        }
    };

    unsafe {
        with_builder(builder, |b| {
            status_of(b.declaration(version, encoding, standalone))
        })
    }
}

/// # Safety
/// `name` must be a valid NUL-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlScopedBuilderCreateNode(
    builder: *mut xmlScopedBuilder,
    name: *const c_char,
) -> c_int {
    let Some(name) = (unsafe { borrow_str(name) }) else {
        return XML_BUILDER_ERR_ARGUMENT;
    };
    unsafe { with_builder(builder, |b| status_of(b.create_node(name))) }
}

/// # Safety
/// `builder` must be null or a handle from `xmlNewScopedBuilder`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlScopedBuilderWithin(builder: *mut xmlScopedBuilder) -> c_int {
    unsafe {
        with_builder(builder, |b| {
            b.within();
            XML_BUILDER_OK
        })
    }
}

/// # Safety
/// `builder` must be null or a handle from `xmlNewScopedBuilder`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlScopedBuilderEndWithin(builder: *mut xmlScopedBuilder) -> c_int {
    unsafe { with_builder(builder, |b| status_of(b.end_within())) }
}

/// # Safety
/// `name` and `value` must be valid NUL-terminated UTF-8 strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlScopedBuilderSetAttribute(
    builder: *mut xmlScopedBuilder,
    name: *const c_char,
    value: *const c_char,
) -> c_int {
    let (Some(name), Some(value)) = (unsafe { borrow_str(name) }, unsafe { borrow_str(value) })
    else {
        return XML_BUILDER_ERR_ARGUMENT;
    };
    unsafe { with_builder(builder, |b| status_of(b.set_attribute(name, value))) }
}

/// Append text to the current node; non-zero `use_cdata` emits a CDATA
/// section.
///
/// # Safety
/// `value` must be a valid NUL-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlScopedBuilderSetText(
    builder: *mut xmlScopedBuilder,
    value: *const c_char,
    use_cdata: c_int,
) -> c_int {
    let Some(value) = (unsafe { borrow_str(value) }) else {
        return XML_BUILDER_ERR_ARGUMENT;
    };
    unsafe {
        with_builder(builder, |b| {
            status_of(b.set_text_with(value, use_cdata != 0))
        })
    }
}

/// Serialise the document into a `malloc`ed NUL-terminated string that the
/// caller releases with `free`. Returns null for unknown handles or when
/// allocation fails.
///
/// # Safety
/// `builder` must be null or a handle from `xmlNewScopedBuilder`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn xmlScopedBuilderRender(builder: *mut xmlScopedBuilder) -> *mut c_char {
    if builder.is_null() || !is_live(builder) {
        return ptr::null_mut();
    }

    let rendered = unsafe { &*builder }.render();
    let bytes = rendered.as_bytes();
    let out = unsafe { libc::malloc(bytes.len() + 1) } as *mut u8;
    if out.is_null() {
        return ptr::null_mut();
    }
    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len());
        *out.add(bytes.len()) = 0;
    }
    out as *mut c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    // Handles are process-wide; serialise tests so a freed address cannot be
    // reissued to a concurrent test.
    static FFI_TEST_LOCK: Mutex<()> = Mutex::new(());

    fn lock_ffi() -> std::sync::MutexGuard<'static, ()> {
        FFI_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn render_to_string(builder: *mut xmlScopedBuilder) -> String {
        unsafe {
            let raw = xmlScopedBuilderRender(builder);
            assert!(!raw.is_null());
            let text = CStr::from_ptr(raw).to_str().unwrap().to_owned();
            libc::free(raw as *mut libc::c_void);
            text
        }
    }

    #[test]
    fn builds_and_renders_through_c_api() {
        let _guard = lock_ffi();
        let root = CString::new("root").unwrap();
        let child = CString::new("child").unwrap();
        let id = CString::new("id").unwrap();
        let five = CString::new("5").unwrap();
        let text = CString::new("a&b").unwrap();

        let b = xmlNewScopedBuilder();
        unsafe {
            assert_eq!(
                xmlScopedBuilderDeclaration(b, ptr::null(), ptr::null(), 1),
                XML_BUILDER_OK
            );
            assert_eq!(xmlScopedBuilderCreateNode(b, root.as_ptr()), XML_BUILDER_OK);
            assert_eq!(xmlScopedBuilderWithin(b), XML_BUILDER_OK);
            assert_eq!(xmlScopedBuilderCreateNode(b, child.as_ptr()), XML_BUILDER_OK);
            assert_eq!(
                xmlScopedBuilderSetAttribute(b, id.as_ptr(), five.as_ptr()),
                XML_BUILDER_OK
            );
            assert_eq!(xmlScopedBuilderSetText(b, text.as_ptr(), 0), XML_BUILDER_OK);
            assert_eq!(xmlScopedBuilderEndWithin(b), XML_BUILDER_OK);
        }

        assert_eq!(
            render_to_string(b),
            "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"yes\"?>\n\
<root><child id=\"5\">a&amp;b</child></root>\n"
        );

        unsafe { xmlFreeScopedBuilder(b) };
    }

    #[test]
    fn contract_violations_map_to_status_codes() {
        let _guard = lock_ffi();
        let root = CString::new("root").unwrap();
        let text = CString::new("x").unwrap();

        let b = xmlNewScopedBuilder();
        unsafe {
            assert_eq!(
                xmlScopedBuilderSetText(b, text.as_ptr(), 1),
                XML_BUILDER_ERR_INVALID_STATE
            );
            assert_eq!(xmlScopedBuilderEndWithin(b), XML_BUILDER_ERR_SCOPE_UNDERFLOW);
            assert_eq!(xmlScopedBuilderCreateNode(b, root.as_ptr()), XML_BUILDER_OK);
            assert_eq!(
                xmlScopedBuilderDeclaration(b, ptr::null(), ptr::null(), -1),
                XML_BUILDER_ERR_INVALID_STATE
            );
            assert_eq!(
                xmlScopedBuilderDeclaration(b, ptr::null(), ptr::null(), 7),
                XML_BUILDER_ERR_ARGUMENT
            );
            assert_eq!(
                xmlScopedBuilderCreateNode(b, ptr::null()),
                XML_BUILDER_ERR_ARGUMENT
            );
            xmlFreeScopedBuilder(b);
        }
    }

    #[test]
    fn freed_and_foreign_handles_are_rejected() {
        let _guard = lock_ffi();
        let b = xmlNewScopedBuilder();
        unsafe { xmlFreeScopedBuilder(b) };

        unsafe {
            assert_eq!(xmlScopedBuilderWithin(b), XML_BUILDER_ERR_ARGUMENT);
            assert!(xmlScopedBuilderRender(b).is_null());
            // A second free is ignored.
            xmlFreeScopedBuilder(b);
            assert_eq!(
                xmlScopedBuilderWithin(ptr::null_mut()),
                XML_BUILDER_ERR_ARGUMENT
            );
        }

        let mut local = ScopedBuilder::new();
        let foreign = &mut local as *mut xmlScopedBuilder;
        unsafe {
            assert_eq!(xmlScopedBuilderWithin(foreign), XML_BUILDER_ERR_ARGUMENT);
        }
    }
}
