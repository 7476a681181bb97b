//! Font resolution and byte-string decoding.
//!
//! The outer reader hands the engine a per-page font table (already
//! dereferenced and decompressed); this module turns each entry into a
//! read-only [`FontInfo`] and implements the decoding policy used for every
//! string operand on the page:
//!
//! - with a ToUnicode CMap: step through codes of `bytes_per_char` and look
//!   each one up, falling back to U+FFFD (or the byte itself for printable
//!   ASCII);
//! - composite fonts without a CMap: UTF-16BE, falling back to Windows-1252
//!   when the result fails a printability check;
//! - simple fonts: Windows-1252, or MacRoman when declared.
//!
//! Alongside the decoded text, [`FontInfo::decode_glyphs`] keeps the raw
//! bytes of every code so surviving glyphs can be re-emitted byte-exactly.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::cmap::{self, CMap};
use super::encoding::{self, ByteEncoding, looks_printable, macroman_char, win1252_char};

/// The font-dictionary entries the engine reads; everything else in the
/// dictionary is the outer reader's business.
#[derive(Debug, Clone, Default)]
pub struct FontDict {
    /// `/Subtype` (`Type0`, `Type1`, `TrueType`, `Type3`)
    pub subtype: String,

    /// `/BaseFont`
    pub base_font: String,

    /// `/Encoding`, or the `/BaseEncoding` of an encoding dictionary
    pub encoding: Option<String>,

    /// Whether `/DescendantFonts` is present (CID font when `Type0`)
    pub has_descendant_fonts: bool,

    /// Decompressed `/ToUnicode` stream bytes
    pub to_unicode: Option<Vec<u8>>,
}

/// Resolved, read-only font information for one page font.
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// Resource name without the slash (`F1`)
    pub name: String,

    /// Font subtype
    pub subtype: String,

    /// Base font name
    pub base_font: String,

    /// Declared encoding, if any
    pub encoding: Option<String>,

    /// True for composite (CID-keyed) fonts
    pub is_cid: bool,

    /// Character code width in bytes (2 for CID fonts, else 1)
    pub bytes_per_char: u8,

    /// Parsed ToUnicode mapping, shared through the process-wide cache
    pub cmap: Option<Arc<CMap>>,
}

/// One decoded character code: its integer value, the exact source bytes,
/// and the Unicode text the code maps to.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCode {
    /// Integer character code (CID for composite fonts, byte otherwise)
    pub code: u32,

    /// Exact input bytes for this code
    pub bytes: SmallVec<[u8; 2]>,

    /// Offset of the first byte within the source string
    pub byte_index: usize,

    /// Decoded Unicode text (usually one scalar)
    pub text: String,
}

impl FontInfo {
    /// Resolves a single font dictionary.
    pub fn resolve(name: &str, dict: &FontDict) -> Self {
        let is_cid = dict.subtype == "Type0" || dict.has_descendant_fonts;
        let cmap = dict
            .to_unicode
            .as_deref()
            .map(cmap::parse_cached)
            .filter(|m| !m.is_empty());

        FontInfo {
            name: name.trim_start_matches('/').to_string(),
            subtype: dict.subtype.clone(),
            base_font: dict.base_font.clone(),
            encoding: dict.encoding.clone(),
            is_cid,
            bytes_per_char: if is_cid { 2 } else { 1 },
            cmap,
        }
    }

    /// The default font used when a resource entry cannot be resolved:
    /// single-byte Windows-1252.
    pub fn fallback(name: &str) -> Self {
        FontInfo {
            name: name.trim_start_matches('/').to_string(),
            subtype: "Type1".to_string(),
            base_font: "Helvetica".to_string(),
            encoding: Some("WinAnsiEncoding".to_string()),
            is_cid: false,
            bytes_per_char: 1,
            cmap: None,
        }
    }

    /// Heuristic: does this look like a CJK font? Drives the fullwidth
    /// advance factor when no better signal exists.
    pub fn is_cjk_likely(&self) -> bool {
        if let Some(enc) = &self.encoding {
            const CJK_ENCODINGS: [&str; 8] =
                ["UniGB", "UniCNS", "UniJIS", "UniKS", "RKSJ", "EUC", "GBK", "ETen"];
            if CJK_ENCODINGS.iter().any(|kw| enc.contains(kw)) {
                return true;
            }
        }
        const CJK_BASEFONTS: [&str; 12] = [
            "Gothic", "Mincho", "Song", "Sung", "Ming", "Kai", "Hei", "Batang", "Gulim",
            "Dotum", "Myeongjo", "SimSun",
        ];
        CJK_BASEFONTS
            .iter()
            .any(|kw| self.base_font.contains(kw))
    }

    /// The byte encoding the serializer should use for this font's glyph
    /// bytes.
    pub fn recommended_encoding(&self) -> ByteEncoding {
        if self.is_cid {
            return ByteEncoding::RawHex;
        }
        if self.is_cjk_likely() {
            return ByteEncoding::Utf16Be;
        }
        match self.encoding.as_deref() {
            Some("MacRomanEncoding") => ByteEncoding::MacRoman,
            _ => ByteEncoding::Windows1252,
        }
    }

    /// Decodes a string operand to Unicode text.
    pub fn decode_text(&self, bytes: &[u8]) -> String {
        self.decode_glyphs(bytes)
            .iter()
            .map(|g| g.text.as_str())
            .collect()
    }

    /// Decodes a string operand code by code, keeping the exact source
    /// bytes of every code.
    pub fn decode_glyphs(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        if let Some(cmap) = &self.cmap {
            return self.decode_with_cmap(bytes, cmap);
        }
        if self.is_cid {
            return self.decode_cid_without_cmap(bytes);
        }
        self.decode_single_byte(bytes)
    }

    fn decode_with_cmap(&self, bytes: &[u8], cmap: &CMap) -> Vec<DecodedCode> {
        let step = self.bytes_per_char.max(1) as usize;
        let mut out = Vec::with_capacity(bytes.len() / step + 1);
        let mut i = 0;

        while i < bytes.len() {
            let chunk = &bytes[i..bytes.len().min(i + step)];
            let code = chunk.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
            let text = match cmap.lookup(code) {
                Some(mapped) => mapped.to_string(),
                None => {
                    // Printable ASCII codes pass through; everything else is
                    // the replacement character.
                    if code >= 0x20 && code < 0x7F {
                        ((code as u8) as char).to_string()
                    } else {
                        "\u{FFFD}".to_string()
                    }
                }
            };
            out.push(DecodedCode {
                code,
                bytes: SmallVec::from_slice(chunk),
                byte_index: i,
                text,
            });
            i += step;
        }

        out
    }

    fn decode_cid_without_cmap(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        // UTF-16BE reading: one code per 16-bit unit, surrogate pairs fused
        // into a single glyph spanning four bytes.
        let body_start = if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
            2
        } else {
            0
        };

        let mut out = Vec::new();
        let mut i = body_start;
        while i + 1 < bytes.len() {
            let unit = u16::from_be_bytes([bytes[i], bytes[i + 1]]);
            if (0xD800..0xDC00).contains(&unit) && i + 3 < bytes.len() {
                let low = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]);
                if (0xDC00..0xE000).contains(&low) {
                    let scalar =
                        0x10000 + ((unit as u32 - 0xD800) << 10) + (low as u32 - 0xDC00);
                    let text = char::from_u32(scalar)
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "\u{FFFD}".to_string());
                    out.push(DecodedCode {
                        code: unit as u32,
                        bytes: SmallVec::from_slice(&bytes[i..i + 4]),
                        byte_index: i,
                        text,
                    });
                    i += 4;
                    continue;
                }
            }
            let text = char::from_u32(unit as u32)
                .map(|c| c.to_string())
                .unwrap_or_else(|| "\u{FFFD}".to_string());
            out.push(DecodedCode {
                code: unit as u32,
                bytes: SmallVec::from_slice(&bytes[i..i + 2]),
                byte_index: i,
                text,
            });
            i += 2;
        }
        if i < bytes.len() {
            // Dangling odd byte
            out.push(DecodedCode {
                code: bytes[i] as u32,
                bytes: SmallVec::from_slice(&bytes[i..]),
                byte_index: i,
                text: win1252_char(bytes[i]).to_string(),
            });
        }

        // If the UTF-16 reading produced garbage, the string was probably
        // single-byte all along.
        let joined: String = out.iter().map(|g| g.text.as_str()).collect();
        if !looks_printable(&joined) {
            return self.decode_single_byte(bytes);
        }

        out
    }

    fn decode_single_byte(&self, bytes: &[u8]) -> Vec<DecodedCode> {
        let mac = matches!(self.encoding.as_deref(), Some("MacRomanEncoding"));
        bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                let c = if mac { macroman_char(b) } else { win1252_char(b) };
                DecodedCode {
                    code: b as u32,
                    bytes: SmallVec::from_slice(&[b]),
                    byte_index: i,
                    text: c.to_string(),
                }
            })
            .collect()
    }
}

/// Resolves a page's font table into [`FontInfo`] entries keyed by both
/// `Name` and `/Name`, so lookups succeed however the `Tf` operand was
/// normalized.
pub fn resolve_fonts(table: &FxHashMap<String, FontDict>) -> FxHashMap<String, Arc<FontInfo>> {
    let mut out = FxHashMap::default();
    for (name, dict) in table {
        let bare = name.trim_start_matches('/');
        let info = Arc::new(FontInfo::resolve(bare, dict));
        out.insert(bare.to_string(), Arc::clone(&info));
        out.insert(format!("/{}", bare), info);
    }
    out
}

/// Width factor for a glyph: fullwidth characters advance a full em, the
/// rest advance 0.6 em.
pub fn width_factor(text: &str) -> f64 {
    match text.chars().next() {
        Some(c) if encoding::is_fullwidth(c) => 1.0,
        _ => 0.6,
    }
}
