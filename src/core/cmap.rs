//! ToUnicode CMap parsing.
//!
//! A `/ToUnicode` CMap maps character codes to Unicode text and is the
//! primary source of truth for what a byte string *says*. Only the
//! `beginbfchar ... endbfchar` and `beginbfrange ... endbfrange` sections
//! are read; the surrounding PostScript scaffolding is skipped. Invalid
//! entries are dropped, never fatal.
//!
//! Example CMap stream:
//! ```text
//! /CIDInit /ProcSet findresource begin
//! 12 dict begin
//! begincmap
//! 2 beginbfchar
//! <0003> <0020>
//! <0005> <0041>
//! endbfchar
//! 1 beginbfrange
//! <0010> <0020> <0030>
//! endbfrange
//! endcmap
//! ```

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;
use rustc_hash::FxHashMap;

use super::encoding::decode_utf16be;
use super::lexer::{Lexer, Token};

/// Largest single bfrange we will expand; anything bigger is hostile.
const MAX_RANGE_LEN: u32 = 0x10000;

/// Process-wide cache capacity (distinct CMap byte blobs).
const CACHE_CAPACITY: usize = 64;

/// A parsed code -> Unicode mapping.
#[derive(Debug, Default)]
pub struct CMap {
    mappings: FxHashMap<u32, String>,
}

impl CMap {
    /// Creates an empty CMap.
    pub fn new() -> Self {
        CMap {
            mappings: FxHashMap::default(),
        }
    }

    /// Parses a ToUnicode CMap stream.
    ///
    /// Parsing never fails: unknown sections are ignored and malformed
    /// entries are skipped.
    pub fn parse(data: &[u8]) -> Self {
        let mut cmap = CMap::new();
        let mut lexer = Lexer::new(data);

        loop {
            match lexer.next_token() {
                Ok(Token::Eof) => break,
                Ok(Token::Keyword(kw)) if kw == "beginbfchar" => {
                    cmap.parse_bfchar(&mut lexer);
                }
                Ok(Token::Keyword(kw)) if kw == "beginbfrange" => {
                    cmap.parse_bfrange(&mut lexer);
                }
                Ok(_) => {}
                Err(_) => {
                    // Malformed byte somewhere in the scaffolding; the lexer
                    // has already advanced past it.
                }
            }
        }

        cmap
    }

    /// Parses `<src> <dst>` pairs until `endbfchar`.
    fn parse_bfchar(&mut self, lexer: &mut Lexer<'_>) {
        loop {
            let src = match lexer.next_token() {
                Ok(Token::HexString(bytes)) => bytes,
                Ok(Token::Keyword(kw)) if kw == "endbfchar" => return,
                Ok(Token::Eof) => return,
                _ => continue,
            };
            let dst = match lexer.next_token() {
                Ok(Token::HexString(bytes)) => bytes,
                Ok(Token::Keyword(kw)) if kw == "endbfchar" => return,
                Ok(Token::Eof) => return,
                _ => continue,
            };

            if let Some(code) = code_from_bytes(&src) {
                let text = decode_utf16be(&dst);
                if !text.is_empty() {
                    self.mappings.insert(code, text);
                }
            }
        }
    }

    /// Parses `<lo> <hi> <dst>` or `<lo> <hi> [<u0> <u1> ...]` triples until
    /// `endbfrange`.
    fn parse_bfrange(&mut self, lexer: &mut Lexer<'_>) {
        loop {
            let lo = match lexer.next_token() {
                Ok(Token::HexString(bytes)) => bytes,
                Ok(Token::Keyword(kw)) if kw == "endbfrange" => return,
                Ok(Token::Eof) => return,
                _ => continue,
            };
            let hi = match lexer.next_token() {
                Ok(Token::HexString(bytes)) => bytes,
                Ok(Token::Keyword(kw)) if kw == "endbfrange" => return,
                Ok(Token::Eof) => return,
                _ => continue,
            };

            let (lo, hi) = match (code_from_bytes(&lo), code_from_bytes(&hi)) {
                (Some(lo), Some(hi)) if lo <= hi && hi - lo < MAX_RANGE_LEN => (lo, hi),
                _ => continue,
            };

            match lexer.next_token() {
                Ok(Token::HexString(dst)) => {
                    let base = decode_utf16be(&dst);
                    for (i, code) in (lo..=hi).enumerate() {
                        if let Some(text) = offset_text(&base, i as u32) {
                            self.mappings.insert(code, text);
                        }
                    }
                }
                Ok(Token::ArrayStart) => {
                    let mut code = lo;
                    loop {
                        match lexer.next_token() {
                            Ok(Token::HexString(dst)) => {
                                if code <= hi {
                                    let text = decode_utf16be(&dst);
                                    if !text.is_empty() {
                                        self.mappings.insert(code, text);
                                    }
                                    code += 1;
                                }
                            }
                            Ok(Token::ArrayEnd) | Ok(Token::Eof) => break,
                            Ok(_) => {}
                            Err(_) => {}
                        }
                    }
                }
                _ => continue,
            }
        }
    }

    /// Looks up the Unicode text for a character code.
    #[inline(always)] // Hot path: called for every glyph
    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(|s| s.as_str())
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// True if the CMap holds no mappings.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Big-endian integer value of a source-code hex string (1-4 bytes).
fn code_from_bytes(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

/// Destination text for the `i`-th code of a bfrange: the final scalar of
/// the base text advanced by `i`.
fn offset_text(base: &str, i: u32) -> Option<String> {
    let mut chars: Vec<char> = base.chars().collect();
    let last = chars.pop()?;
    let advanced = char::from_u32((last as u32).checked_add(i)?)?;
    chars.push(advanced);
    Some(chars.into_iter().collect())
}

fn cache() -> &'static Mutex<LruCache<Vec<u8>, Arc<CMap>>> {
    static CACHE: OnceLock<Mutex<LruCache<Vec<u8>, Arc<CMap>>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        let capacity = NonZeroUsize::new(CACHE_CAPACITY).expect("nonzero cache capacity");
        Mutex::new(LruCache::new(capacity))
    })
}

/// Parses a CMap through the process-wide cache.
///
/// Pages of the same document routinely share one ToUnicode stream, and
/// pages may be redacted in parallel, so the cache is keyed by the raw CMap
/// bytes and sits behind a mutex.
pub fn parse_cached(data: &[u8]) -> Arc<CMap> {
    let key = data.to_vec();
    if let Ok(mut cache) = cache().lock() {
        if let Some(found) = cache.get(&key) {
            return Arc::clone(found);
        }
        let parsed = Arc::new(CMap::parse(data));
        cache.put(key, Arc::clone(&parsed));
        return parsed;
    }
    // Poisoned lock: fall back to an uncached parse
    Arc::new(CMap::parse(data))
}
