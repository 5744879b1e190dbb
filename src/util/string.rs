use std::ffi::{c_char, CStr, CString};

use anyhow::Result;

/// Wraps a c string into a string, or an empty string if the provided c string was null.
/// Assumes the provided c string is null terminated.
pub(crate) unsafe fn wrap_c_str(s: *const c_char) -> String {
    if s.is_null() {
        String::default()
    } else {
        CStr::from_ptr(s).to_string_lossy().into_owned()
    }
}

/// Reads a fixed size, null terminated character array such as `VkExtensionProperties::extensionName`.
pub(crate) fn wrap_c_array(chars: &[c_char]) -> String {
    let bytes = chars
        .iter()
        .take_while(|c| **c != 0)
        .map(|c| *c as u8)
        .collect::<Vec<u8>>();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Safely unwraps a slice of strings into a vec of raw c strings.
pub(crate) fn unwrap_to_raw_strings(strings: &[CString]) -> Vec<*const c_char> {
    strings.iter().map(|string| string.as_ptr()).collect()
}

/// Converts rust strings to owned c strings.
pub(crate) fn to_c_strings(strings: &[String]) -> Result<Vec<CString>> {
    strings
        .iter()
        .map(|s| Ok(CString::new(s.as_str())?))
        .collect()
}
