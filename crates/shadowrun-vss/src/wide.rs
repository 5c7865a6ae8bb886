//! UTF-16 buffers and Win32 status helpers shared by the backend modules.

#![cfg_attr(not(windows), allow(dead_code))]

/// Longest path accepted by the fixed-size volume API buffers.
pub(crate) const MAX_PATH: usize = 260;

/// Nul-terminated UTF-16 copy of `value`.
pub(crate) fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Decode `buffer` up to the first nul, or the whole buffer if there is none.
pub(crate) fn from_wide(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Split a double-nul-terminated string list.
pub(crate) fn split_multi_sz(buffer: &[u16]) -> Vec<String> {
    buffer
        .split(|c| *c == 0)
        .take_while(|part| !part.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

/// Decode a nul-terminated string owned by the system.
///
/// # Safety
/// `ptr` must be null or point to a readable nul-terminated UTF-16 string.
pub(crate) unsafe fn from_wide_ptr(ptr: *const u16) -> String {
    if ptr.is_null() {
        return String::new();
    }
    let mut len = 0;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}

/// Win32 error code carried by an `HRESULT_FROM_WIN32` value; other codes are
/// passed through unchanged.
pub(crate) fn win32_code(hresult: i32) -> u32 {
    let raw = hresult as u32;
    if raw & 0xFFFF_0000 == 0x8007_0000 {
        raw & 0xFFFF
    } else {
        raw
    }
}
