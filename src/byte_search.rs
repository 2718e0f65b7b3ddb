//! Byte and substring search over in-memory images.

/// Find first occurrence of `needle` in `haystack`.
#[inline]
pub fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|&b| b == needle)
}

/// Find first occurrence of the byte string `needle` in `haystack`.
pub fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let (&first, _) = needle.split_first()?;
    let mut start = 0;
    while let Some(i) = find_byte(&haystack[start..], first) {
        let at = start + i;
        if haystack[at..].starts_with(needle) {
            return Some(at);
        }
        start = at + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_byte() {
        assert_eq!(find_byte(b"hello", b'l'), Some(2));
        assert_eq!(find_byte(b"hello", b'z'), None);
        assert_eq!(find_byte(b"", b'a'), None);
    }

    #[test]
    fn test_find_bytes() {
        assert_eq!(find_bytes(b"xxustaustar", b"ustar"), Some(6));
        assert_eq!(find_bytes(b"ustar", b"ustar"), Some(0));
        assert_eq!(find_bytes(b"usta", b"ustar"), None);
        assert_eq!(find_bytes(b"anything", b""), None);
    }
}
