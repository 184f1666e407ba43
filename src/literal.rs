// Literal scans used before the matcher is entered. With 'perf-literal'
// these are vectorized by memchr, otherwise they walk the slice.

/// The offset of the first occurrence of `needle` in `haystack`.
#[cfg(feature = "perf-literal")]
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(haystack, needle)
}

#[cfg(not(feature = "perf-literal"))]
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    plain::find(haystack, needle)
}

/// The offsets of every occurrence of `byte` in `haystack`, ascending.
#[cfg(feature = "perf-literal")]
pub(crate) fn positions(byte: u8, haystack: &[u8]) -> impl Iterator<Item = usize> + '_ {
    memchr::memchr_iter(byte, haystack)
}

#[cfg(not(feature = "perf-literal"))]
pub(crate) fn positions(byte: u8, haystack: &[u8]) -> impl Iterator<Item = usize> + '_ {
    plain::positions(byte, haystack)
}

/// Slice walking versions of the scans above.
#[cfg(any(test, not(feature = "perf-literal")))]
mod plain {
    pub(super) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return Some(0);
        }
        haystack.windows(needle.len()).position(|window| window == needle)
    }

    pub(super) fn positions(byte: u8, haystack: &[u8]) -> impl Iterator<Item = usize> + '_ {
        haystack.iter().enumerate().filter(move |&(_, &b)| b == byte).map(|(at, _)| at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Find = fn(&[u8], &[u8]) -> Option<usize>;

    fn finders() -> [Find; 2] {
        [find, plain::find]
    }

    #[test]
    fn test_find() {
        for find in finders() {
            assert_eq!(find(b"xxMUSTyy", b"MUST"), Some(2));
            assert_eq!(find(b"xxMUSyy", b"MUST"), None);
            assert_eq!(find(b"ab", b"abc"), None);
            assert_eq!(find(b"abcabc", b"c"), Some(2));
            assert_eq!(find(b"MUSMUST", b"MUST"), Some(3));
            assert_eq!(find(b"abc", b"abc"), Some(0));
        }
    }

    #[test]
    fn test_find_empty() {
        for find in finders() {
            assert_eq!(find(b"abc", b""), Some(0));
            assert_eq!(find(b"", b""), Some(0));
            assert_eq!(find(b"", b"a"), None);
        }
    }

    #[test]
    fn test_positions() {
        let cases: [(u8, &[u8], Vec<usize>); 4] = [
            (b'a', b"banana", vec![1, 3, 5]),
            (b'z', b"banana", vec![]),
            (b'a', b"", vec![]),
            (b'\xff', b"\xff\x00\xff", vec![0, 2]),
        ];
        for (byte, haystack, expected) in cases {
            assert_eq!(positions(byte, haystack).collect::<Vec<_>>(), expected);
            assert_eq!(plain::positions(byte, haystack).collect::<Vec<_>>(), expected);
        }
    }
}
