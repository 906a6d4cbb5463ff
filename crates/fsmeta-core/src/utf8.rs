//! UTF-8 validation and hex dump formatting.
//!
//! Attribute values are arbitrary bytes. Anything that is valid UTF-8 is
//! shown as text; everything else is shown as a hex dump in the layout
//! `xattr -l` and `hexdump -C` use:
//!
//! ```text
//! 00000000  62 70 6C 69 73 74 30 30 D4 01 02 03 04 05 06 07  |bplist00........|
//! 00000010  0A 58 24 76 65 72 73 69 6F 6E                    |.X$version|
//! 0000001A
//! ```
//!
//! [`is_valid_utf8`], [`decode`] and [`console_safe`] all rest on the
//! standard library's UTF-8 validation: [`decode`] succeeds and
//! [`console_safe`] borrows for exactly the inputs [`is_valid_utf8`]
//! accepts.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Bytes shown on each hex dump line.
pub const BYTES_PER_LINE: usize = 16;

/// Returns `true` if `bytes` is well-formed UTF-8.
pub fn is_valid_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

/// Take ownership of `bytes` as a `String` if they are valid UTF-8.
///
/// On failure the original bytes are handed back untouched.
pub fn decode(bytes: Vec<u8>) -> Result<String, Vec<u8>> {
    String::from_utf8(bytes).map_err(std::string::FromUtf8Error::into_bytes)
}

/// Make bytes safe to print on a terminal.
///
/// Valid input is borrowed as-is; invalid sequences are replaced with
/// U+FFFD.
pub fn console_safe(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Render `bytes` as an offset / hex / ASCII dump.
///
/// The final line holds the total length so an empty input still produces
/// `00000000`. No trailing newline.
pub fn hex_dump(bytes: &[u8]) -> String {
    let lines = bytes.len().div_ceil(BYTES_PER_LINE);
    // offset(8) + gap(2) + 16 * 3 + gap(1) + |ascii|(18) + newline
    let mut out = String::with_capacity((lines + 1) * 78);

    for (index, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        let _ = write!(out, "{:08X}  ", index * BYTES_PER_LINE);
        for slot in 0..BYTES_PER_LINE {
            match chunk.get(slot) {
                Some(byte) => {
                    let _ = write!(out, "{byte:02X} ");
                }
                None => out.push_str("   "),
            }
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| printable(b)));
        out.push_str("|\n");
    }

    let _ = write!(out, "{:08X}", bytes.len());
    out
}

fn printable(byte: u8) -> char {
    if (0x20..=0x7E).contains(&byte) {
        char::from(byte)
    } else {
        '.'
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_utf8() {
        assert!(is_valid_utf8(b"plain ascii"));
        assert!(is_valid_utf8("h\u{e9}llo \u{1f600}".as_bytes()));
        assert!(is_valid_utf8(b""));
        assert!(!is_valid_utf8(&[0xFF, 0xFE]));
        // Truncated multi-byte sequence
        assert!(!is_valid_utf8(&[0xE2, 0x82]));
    }

    #[test]
    fn test_decode_returns_bytes_on_failure() {
        assert_eq!(decode(b"ok".to_vec()), Ok("ok".to_string()));
        assert_eq!(decode(vec![0x61, 0xC0, 0x62]), Err(vec![0x61, 0xC0, 0x62]));
    }

    #[test]
    fn test_console_safe_borrows_valid_input() {
        assert!(matches!(console_safe(b"fine"), Cow::Borrowed("fine")));
        assert_eq!(console_safe(&[0x61, 0xFF, 0x62]), "a\u{FFFD}b");
    }

    #[test]
    fn test_hex_dump_empty() {
        assert_eq!(hex_dump(&[]), "00000000");
    }

    #[test]
    fn test_hex_dump_partial_line() {
        let expected = format!("00000000  48 65 6C 6C 6F{}|Hello|\n00000005", " ".repeat(35));
        assert_eq!(hex_dump(b"Hello"), expected);
    }

    #[test]
    fn test_hex_dump_full_line_and_nonprintable() {
        let bytes: Vec<u8> = (0x40..0x50).collect();
        let dump = hex_dump(&bytes);
        assert_eq!(
            dump,
            "00000000  40 41 42 43 44 45 46 47 48 49 4A 4B 4C 4D 4E 4F  |@ABCDEFGHIJKLMNO|\n00000010"
        );

        let dump = hex_dump(&[0x00, 0x7F, 0x20, 0xFF]);
        assert!(dump.starts_with("00000000  00 7F 20 FF "));
        assert!(dump.contains("|.. .|"));
    }

    #[test]
    fn test_hex_dump_offsets_across_lines() {
        let bytes = vec![0xAB; 40];
        let dump = hex_dump(&bytes);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("00000000  "));
        assert!(lines[1].starts_with("00000010  "));
        assert!(lines[2].starts_with("00000020  AB AB AB AB AB AB AB AB  "));
        assert_eq!(lines[3], "00000028");
    }
}
