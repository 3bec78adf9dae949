//! Converting from and to hex strings.

use std::str;


/// Encodes a octet sequence as a hex string.
///
/// The function uses `dest` as the buffer for encoding which therefore must
/// be at least twice the length of `src`. It returns a reference to the used
/// part of this buffer as a `&str`.
///
/// # Panics
///
/// The function panics if `dest` is shorter than twice the length of `src`.
pub fn encode<'a>(src: &[u8], dest: &'a mut [u8]) -> &'a str {
    let dest = &mut dest[..src.len() * 2];
    for (s, d) in src.iter().zip(dest.chunks_mut(2)) {
        d[0] = DIGITS[usize::from(s >> 4)];
        d[1] = DIGITS[usize::from(s & 0x0F)];
    }
    // Only ASCII digits have been written.
    str::from_utf8(dest).unwrap_or_default()
}

/// Encodes a octet sequence into a newly allocated hex string.
pub fn encode_string(src: &[u8]) -> String {
    let mut res = String::with_capacity(src.len() * 2);
    for ch in src {
        res.push(char::from(DIGITS[usize::from(ch >> 4)]));
        res.push(char::from(DIGITS[usize::from(ch & 0x0F)]));
    }
    res
}

/// Decodes a hex string into a vec of octets.
///
/// Both upper and lower case digits are accepted. Returns `None` if the
/// string has an odd length or contains non-hex characters.
pub fn decode(src: &str) -> Option<Vec<u8>> {
    if src.len() % 2 != 0 {
        return None
    }
    src.as_bytes().chunks(2).map(|pair| {
        Some((digit(pair[0])? << 4) | digit(pair[1])?)
    }).collect()
}

fn digit(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None
    }
}

const DIGITS: &[u8] = b"0123456789ABCDEF";


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_and_decode() {
        let mut buf = [0u8; 8];
        assert_eq!(encode(b"\x01\xAB\xff", &mut buf), "01ABFF");
        assert_eq!(encode_string(b"\x00\x10"), "0010");
        assert_eq!(decode("01abFF"), Some(vec![0x01, 0xAB, 0xFF]));
        assert_eq!(decode("123"), None);
        assert_eq!(decode("zz"), None);
    }
}
