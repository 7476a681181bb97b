//! Raster image redaction.
//!
//! A partially covered image is decoded, the covered pixel regions are
//! painted opaque black, and the result is re-encoded as Deflate-compressed
//! DeviceRGB 8bpc. XObject replacements are returned to the caller keyed by
//! resource name; inline images are re-emitted in place as an
//! `BI ... ID ... EI` sequence with ASCIIHex-encoded data.
//!
//! Supported decode paths: DeviceGray/DeviceRGB/DeviceCMYK at 8 bits per
//! component, plus embedded JPEG and PNG data detected by magic bytes.
//! Anything else fails with `ImageDecode`, and the caller drops the whole
//! image rather than risk leaking the covered region.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::error::{RedactError, RedactResult};
use super::geometry::Rect;
use super::parser::{Operand, RawInlineImage};

/// An image XObject as supplied by the outer reader: parameters from the
/// stream dictionary plus the `/Filter`-decoded data (embedded JPEG/PNG
/// data is passed through still encoded and detected by magic bytes).
#[derive(Debug, Clone)]
pub struct XObjectImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub color_space: String,
    pub bits_per_component: u8,
    pub data: Vec<u8>,
    pub has_smask: bool,
}

/// Replacement stream data for a redacted XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementImage {
    pub name: String,
    pub width: u32,
    pub height: u32,

    /// Deflate-compressed DeviceRGB 8bpc pixel data
    pub data: Vec<u8>,

    /// The caller must drop any `/SMask`: the soft mask could otherwise
    /// reveal the silhouette of the removed region
    pub clear_smask: bool,
}

/// A decoded RGB8 pixel buffer.
struct RgbImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Redacts an image XObject: paints black over every covered pixel region
/// and re-encodes.
///
/// `bbox` is the placement rectangle of the drawn image (the CTM image of
/// the unit square).
pub fn redact_xobject_image(
    image: &XObjectImage,
    bbox: &Rect,
    rects: &[Rect],
) -> RedactResult<ReplacementImage> {
    let mut rgb = decode_image(
        &image.data,
        image.width,
        image.height,
        &image.color_space,
        image.bits_per_component,
        &image.name,
    )?;

    paint_regions(&mut rgb, bbox, rects);

    Ok(ReplacementImage {
        name: image.name.clone(),
        width: rgb.width,
        height: rgb.height,
        data: deflate(&rgb.pixels),
        clear_smask: image.has_smask,
    })
}

/// Redacts an inline image and re-emits the full `BI ... EI` span.
pub fn redact_inline_image(
    inline: &RawInlineImage,
    bbox: &Rect,
    rects: &[Rect],
) -> RedactResult<Vec<u8>> {
    let width = inline_number(inline, &["W", "Width"])
        .ok_or_else(|| RedactError::image_decode("inline"))? as u32;
    let height = inline_number(inline, &["H", "Height"])
        .ok_or_else(|| RedactError::image_decode("inline"))? as u32;
    if width == 0 || height == 0 || width > 1 << 16 || height > 1 << 16 {
        return Err(RedactError::image_decode("inline"));
    }
    let bpc = inline_number(inline, &["BPC", "BitsPerComponent"]).unwrap_or(8.0) as u8;
    let color_space = inline_name(inline, &["CS", "ColorSpace"]).unwrap_or("DeviceGray");

    let data = apply_inline_filters(inline)?;
    let mut rgb = decode_image(&data, width, height, color_space, bpc, "inline")?;

    paint_regions(&mut rgb, bbox, rects);

    // Re-emit as RGB 8bpc with ASCIIHex data.
    let mut out = Vec::with_capacity(rgb.pixels.len() * 2 + 64);
    out.extend_from_slice(
        format!(
            "BI /W {} /H {} /CS /RGB /BPC 8 /F /AHx ID\n",
            rgb.width, rgb.height
        )
        .as_bytes(),
    );
    for &b in &rgb.pixels {
        out.extend_from_slice(format!("{:02X}", b).as_bytes());
    }
    out.extend_from_slice(b">\nEI");
    Ok(out)
}

fn inline_number(inline: &RawInlineImage, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| inline.params.get(*k))
        .and_then(|operand| operand.as_number())
}

fn inline_name<'a>(inline: &'a RawInlineImage, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| inline.params.get(*k))
        .and_then(|operand| operand.as_name())
}

/// Applies the inline image's filter chain (`AHx`, `A85`, `Fl`).
fn apply_inline_filters(inline: &RawInlineImage) -> RedactResult<Vec<u8>> {
    let filters: Vec<String> = match inline
        .params
        .get("F")
        .or_else(|| inline.params.get("Filter"))
    {
        None => Vec::new(),
        Some(Operand::Name(name)) => vec![name.clone()],
        Some(Operand::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().map(str::to_string))
            .collect(),
        Some(_) => return Err(RedactError::image_decode("inline")),
    };

    let mut data = inline.data.clone();
    for filter in filters {
        data = match filter.as_str() {
            "AHx" | "ASCIIHexDecode" => decode_ascii_hex(&data),
            "A85" | "ASCII85Decode" => decode_ascii_85(&data)?,
            "Fl" | "FlateDecode" => inflate(&data, "inline")?,
            other => {
                log::warn!("unsupported inline image filter '{}'", other);
                return Err(RedactError::image_decode("inline"));
            }
        };
    }
    Ok(data)
}

/// ASCIIHexDecode: hex pairs, whitespace ignored, `>` ends the data, an odd
/// final digit is padded with zero.
fn decode_ascii_hex(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;
    for &b in data {
        if b == b'>' {
            break;
        }
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'A'..=b'F' => b - b'A' + 10,
            b'a'..=b'f' => b - b'a' + 10,
            _ => continue,
        };
        match pending.take() {
            Some(hi) => out.push((hi << 4) | digit),
            None => pending = Some(digit),
        }
    }
    if let Some(hi) = pending {
        out.push(hi << 4);
    }
    out
}

/// ASCII85Decode: groups of five characters encode four bytes; `z` is a
/// zero group; `~>` ends the data.
fn decode_ascii_85(data: &[u8]) -> RedactResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut filled = 0usize;

    let mut iter = data.iter().peekable();
    while let Some(&b) = iter.next() {
        match b {
            b'~' => break,
            b'z' if filled == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = b - b'!';
                filled += 1;
                if filled == 5 {
                    let value = group
                        .iter()
                        .fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
                    out.extend_from_slice(&value.to_be_bytes());
                    filled = 0;
                }
            }
            _ if b.is_ascii_whitespace() || b == 0 => {}
            _ => return Err(RedactError::image_decode("inline")),
        }
    }

    if filled > 0 {
        if filled == 1 {
            return Err(RedactError::image_decode("inline"));
        }
        // Pad the partial group with 'u' and keep filled-1 bytes
        let mut padded = group;
        for slot in padded.iter_mut().skip(filled) {
            *slot = 84;
        }
        let value = padded
            .iter()
            .fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
        out.extend_from_slice(&value.to_be_bytes()[..filled - 1]);
    }

    Ok(out)
}

fn inflate(data: &[u8], name: &str) -> RedactResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| RedactError::image_decode(name))?;
    Ok(out)
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

/// Decodes image data to an RGB8 buffer.
fn decode_image(
    data: &[u8],
    width: u32,
    height: u32,
    color_space: &str,
    bits_per_component: u8,
    name: &str,
) -> RedactResult<RgbImage> {
    // Embedded encoded images are detected by magic bytes first.
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return decode_jpeg(data, name);
    }
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        return decode_png(data, name);
    }

    if bits_per_component != 8 {
        log::warn!(
            "image '{}': unsupported {} bits per component",
            name,
            bits_per_component
        );
        return Err(RedactError::image_decode(name));
    }

    let pixel_count = width as usize * height as usize;
    let pixels = match color_space {
        "DeviceGray" | "G" | "CalGray" => {
            let expected = pixel_count;
            if data.len() < expected {
                return Err(RedactError::image_decode(name));
            }
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            for &g in &data[..expected] {
                rgb.extend_from_slice(&[g, g, g]);
            }
            rgb
        }
        "DeviceRGB" | "RGB" | "CalRGB" => {
            let expected = pixel_count * 3;
            if data.len() < expected {
                return Err(RedactError::image_decode(name));
            }
            data[..expected].to_vec()
        }
        "DeviceCMYK" | "CMYK" => {
            let expected = pixel_count * 4;
            if data.len() < expected {
                return Err(RedactError::image_decode(name));
            }
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            for chunk in data[..expected].chunks_exact(4) {
                let (c, m, y, k) = (
                    chunk[0] as f64,
                    chunk[1] as f64,
                    chunk[2] as f64,
                    chunk[3] as f64,
                );
                let r = 255.0 * (1.0 - c / 255.0) * (1.0 - k / 255.0);
                let g = 255.0 * (1.0 - m / 255.0) * (1.0 - k / 255.0);
                let b = 255.0 * (1.0 - y / 255.0) * (1.0 - k / 255.0);
                rgb.extend_from_slice(&[r as u8, g as u8, b as u8]);
            }
            rgb
        }
        other => {
            log::warn!("image '{}': unsupported color space '{}'", name, other);
            return Err(RedactError::image_decode(name));
        }
    };

    Ok(RgbImage {
        width,
        height,
        pixels,
    })
}

#[cfg(feature = "jpeg-decoding")]
fn decode_jpeg(data: &[u8], name: &str) -> RedactResult<RgbImage> {
    use std::io::Cursor;
    use zune_jpeg::zune_core::options::DecoderOptions;

    let options = DecoderOptions::default()
        .set_max_width(u16::MAX as usize)
        .set_max_height(u16::MAX as usize);
    let mut decoder = zune_jpeg::JpegDecoder::new_with_options(Cursor::new(data), options);
    decoder
        .decode_headers()
        .map_err(|_| RedactError::image_decode(name))?;
    let info = decoder
        .info()
        .ok_or_else(|| RedactError::image_decode(name))?;
    let width = info.width as u32;
    let height = info.height as u32;
    let decoded = decoder
        .decode()
        .map_err(|_| RedactError::image_decode(name))?;

    let pixel_count = width as usize * height as usize;
    if pixel_count == 0 {
        return Err(RedactError::image_decode(name));
    }
    let pixels = match decoded.len() / pixel_count {
        1 => {
            let mut rgb = Vec::with_capacity(pixel_count * 3);
            for &g in &decoded[..pixel_count] {
                rgb.extend_from_slice(&[g, g, g]);
            }
            rgb
        }
        3 => decoded,
        _ => return Err(RedactError::image_decode(name)),
    };

    Ok(RgbImage {
        width,
        height,
        pixels,
    })
}

#[cfg(not(feature = "jpeg-decoding"))]
fn decode_jpeg(_data: &[u8], name: &str) -> RedactResult<RgbImage> {
    log::warn!("image '{}': JPEG decoding not enabled", name);
    Err(RedactError::image_decode(name))
}

#[cfg(feature = "png-decoding")]
fn decode_png(data: &[u8], name: &str) -> RedactResult<RgbImage> {
    let decoded = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|_| RedactError::image_decode(name))?;
    let rgb = decoded.to_rgb8();
    Ok(RgbImage {
        width: rgb.width(),
        height: rgb.height(),
        pixels: rgb.into_raw(),
    })
}

#[cfg(not(feature = "png-decoding"))]
fn decode_png(_data: &[u8], name: &str) -> RedactResult<RgbImage> {
    log::warn!("image '{}': PNG decoding not enabled", name);
    Err(RedactError::image_decode(name))
}

/// Paints black over every pixel region covered by a redaction rectangle.
///
/// Page Y grows upward while image rows grow downward, so the vertical
/// mapping flips.
fn paint_regions(rgb: &mut RgbImage, bbox: &Rect, rects: &[Rect]) {
    if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
        return;
    }
    let scale_x = rgb.width as f64 / bbox.width();
    let scale_y = rgb.height as f64 / bbox.height();

    for rect in rects {
        let covered = match bbox.intersection(rect) {
            Some(covered) => covered,
            None => continue,
        };

        let x0 = ((covered.left - bbox.left) * scale_x).floor().max(0.0) as u32;
        let x1 = (((covered.right - bbox.left) * scale_x).ceil() as u32).min(rgb.width);
        let y0 = ((bbox.top - covered.top) * scale_y).floor().max(0.0) as u32;
        let y1 = (((bbox.top - covered.bottom) * scale_y).ceil() as u32).min(rgb.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let i = (y as usize * rgb.width as usize + x as usize) * 3;
                rgb.pixels[i] = 0;
                rgb.pixels[i + 1] = 0;
                rgb.pixels[i + 2] = 0;
            }
        }
    }
}
