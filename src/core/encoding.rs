//! Single- and multi-byte text encodings used by PDF simple fonts.
//!
//! The engine decodes byte strings through a real code page and re-encodes
//! through the same one. That round trip is load-bearing: decoding through
//! Windows-1252 is not a no-op for bytes >= 0x80 (0x92 is U+2019, not
//! U+0092), and casting chars back to bytes would corrupt smart quotes and
//! their friends. Every byte 0x00-0xFF must survive decode -> encode
//! unchanged.

/// Recommended byte encoding for serializing a font's glyph bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteEncoding {
    /// Windows code page 1252 (PDF `WinAnsiEncoding`)
    Windows1252,
    /// Mac OS Roman (PDF `MacRomanEncoding`)
    MacRoman,
    /// UTF-16 big-endian (two-byte composite fonts)
    Utf16Be,
    /// Opaque bytes; serialize as a hex string
    RawHex,
}

/// Windows-1252 mappings for 0x80-0x9F. The five unassigned slots keep
/// their C1 control value so the byte round trip stays total.
const WIN1252_80_9F: [u32; 32] = [
    0x20AC, 0x0081, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, // 0x80-0x87
    0x02C6, 0x2030, 0x0160, 0x2039, 0x0152, 0x008D, 0x017D, 0x008F, // 0x88-0x8F
    0x0090, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, // 0x90-0x97
    0x02DC, 0x2122, 0x0161, 0x203A, 0x0153, 0x009D, 0x017E, 0x0178, // 0x98-0x9F
];

/// Mac OS Roman mappings for 0x80-0xFF.
const MACROMAN_80_FF: [u32; 128] = [
    0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1, // 0x80-0x87
    0x00E0, 0x00E2, 0x00E4, 0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8, // 0x88-0x8F
    0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF, 0x00F1, 0x00F3, // 0x90-0x97
    0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC, // 0x98-0x9F
    0x2020, 0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF, // 0xA0-0xA7
    0x00AE, 0x00A9, 0x2122, 0x00B4, 0x00A8, 0x2260, 0x00C6, 0x00D8, // 0xA8-0xAF
    0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202, 0x2211, // 0xB0-0xB7
    0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8, // 0xB8-0xBF
    0x00BF, 0x00A1, 0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB, // 0xC0-0xC7
    0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3, 0x00D5, 0x0152, 0x0153, // 0xC8-0xCF
    0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA, // 0xD0-0xD7
    0x00FF, 0x0178, 0x2044, 0x20AC, 0x2039, 0x203A, 0xFB01, 0xFB02, // 0xD8-0xDF
    0x2021, 0x00B7, 0x201A, 0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1, // 0xE0-0xE7
    0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC, 0x00D3, 0x00D4, // 0xE8-0xEF
    0xF8FF, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC, // 0xF0-0xF7
    0x00AF, 0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7, // 0xF8-0xFF
];

/// Decodes one Windows-1252 byte.
pub fn win1252_char(b: u8) -> char {
    let cp = match b {
        0x80..=0x9F => WIN1252_80_9F[(b - 0x80) as usize],
        _ => b as u32,
    };
    char::from_u32(cp).unwrap_or('\u{FFFD}')
}

/// Decodes a byte string through Windows-1252.
pub fn decode_win1252(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| win1252_char(b)).collect()
}

/// Encodes one character to its Windows-1252 byte, if one exists.
pub fn encode_win1252_char(c: char) -> Option<u8> {
    let cp = c as u32;
    if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    WIN1252_80_9F
        .iter()
        .position(|&mapped| mapped == cp)
        .map(|i| (i as u8) + 0x80)
}

/// Encodes a string through Windows-1252; None if any character has no
/// mapping.
pub fn encode_win1252(s: &str) -> Option<Vec<u8>> {
    s.chars().map(encode_win1252_char).collect()
}

/// Decodes one Mac OS Roman byte.
pub fn macroman_char(b: u8) -> char {
    let cp = match b {
        0x80..=0xFF => MACROMAN_80_FF[(b - 0x80) as usize],
        _ => b as u32,
    };
    char::from_u32(cp).unwrap_or('\u{FFFD}')
}

/// Decodes a byte string through Mac OS Roman.
pub fn decode_macroman(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| macroman_char(b)).collect()
}

/// Decodes UTF-16BE, skipping an optional byte-order mark. Lone or
/// mismatched surrogates become U+FFFD; a dangling odd byte is dropped.
pub fn decode_utf16be(bytes: &[u8]) -> String {
    let body = if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        &bytes[2..]
    } else {
        bytes
    };

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    String::from_utf16_lossy(&units)
}

/// Printability heuristic used when guessing between UTF-16BE and a single
/// byte code page: at least 70% of the characters must be letters, digits,
/// punctuation, whitespace, common symbols, or CJK.
pub fn looks_printable(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    let total = s.chars().count();
    let printable = s
        .chars()
        .filter(|&c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || c.is_ascii_punctuation()
                || matches!(c as u32,
                    0x00A0..=0x00BF      // Latin-1 punctuation and symbols
                    | 0x2000..=0x206F    // general punctuation
                    | 0x20A0..=0x20CF    // currency
                    | 0x2100..=0x214F    // letterlike
                    | 0x3000..=0x303F)   // CJK punctuation
                || is_cjk(c)
        })
        .count();
    printable * 10 >= total * 7
}

/// Returns true for CJK scalars (used both by the printability heuristic
/// and by fullwidth detection).
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x11FF      // Hangul Jamo
        | 0x2E80..=0x2FDF    // CJK radicals
        | 0x3040..=0x30FF    // Hiragana, Katakana
        | 0x3130..=0x318F    // Hangul compatibility Jamo
        | 0x3400..=0x4DBF    // CJK extension A
        | 0x4E00..=0x9FFF    // CJK unified ideographs
        | 0xAC00..=0xD7A3    // Hangul syllables
        | 0xF900..=0xFAFF)   // CJK compatibility ideographs
}

/// Returns true for characters laid out at full-width advance (factor 1.0
/// instead of the 0.6 used for Western glyphs).
pub fn is_fullwidth(c: char) -> bool {
    is_cjk(c)
        || matches!(c as u32,
            0x3000..=0x303F      // CJK symbols and punctuation
            | 0xFE30..=0xFE4F    // CJK compatibility forms
            | 0xFF00..=0xFF60    // fullwidth forms
            | 0xFFE0..=0xFFE6)
}
