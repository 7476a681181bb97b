//! Content-stream serialization.
//!
//! Re-emits a merged operation list as bytes. The list is stable-sorted by
//! stream position, so reconstructed operators that share the position of
//! the originals keep their insertion order and never interleave with
//! surrounding state operators.
//!
//! Syntax rules: locale-invariant numbers with `.` as the decimal
//! separator, literal strings with octal escapes for anything outside
//! 0x20-0x7E, uppercase hex strings, `#XX` name escapes, one operation per
//! line. Everything outside string bodies is printable ASCII.
//!
//! While writing, the serializer enforces the font invariant: if a
//! text-show operator would be emitted with no `Tf` since the last `BT`, a
//! `Tf` is synthesized from the most recent raw `Tf` seen in the input.
//! The raw size is used, never the effective (matrix-scaled) size.

use super::lexer;
use super::parser::Operand;

/// One operation ready for emission.
#[derive(Debug, Clone)]
pub struct EmitOp {
    /// Sort key; ties keep insertion order
    pub pos: u32,

    /// Operator keyword
    pub operator: String,

    /// Operands written before the operator
    pub operands: Vec<Operand>,

    /// Pre-serialized bytes spliced verbatim instead (inline images)
    pub raw: Option<Vec<u8>>,
}

impl EmitOp {
    /// A normal operator tuple.
    pub fn op(pos: u32, operator: &str, operands: Vec<Operand>) -> Self {
        EmitOp {
            pos,
            operator: operator.to_string(),
            operands,
            raw: None,
        }
    }

    /// A verbatim byte span (used for untouched and rebuilt inline images).
    pub fn raw(pos: u32, bytes: Vec<u8>) -> Self {
        EmitOp {
            pos,
            operator: String::new(),
            operands: Vec::new(),
            raw: Some(bytes),
        }
    }
}

/// Serializes the operation list into content-stream bytes.
pub fn serialize(ops: &mut Vec<EmitOp>) -> Vec<u8> {
    // Stable by construction: equal positions keep insertion order.
    ops.sort_by_key(|op| op.pos);

    let fallback_tf = first_tf_in(ops);
    let mut out = Vec::new();
    let mut tf_since_bt = true;
    let mut last_tf: Option<(String, f64)> = None;

    for op in ops.iter() {
        if let Some(raw) = &op.raw {
            out.extend_from_slice(raw);
            out.push(b'\n');
            continue;
        }

        match op.operator.as_str() {
            "BT" => tf_since_bt = false,
            "Tf" => {
                tf_since_bt = true;
                if let (Some(name), Some(size)) = (
                    op.operands.iter().find_map(|operand| operand.as_name()),
                    op.operands.iter().find_map(|operand| operand.as_number()),
                ) {
                    last_tf = Some((name.to_string(), size));
                }
            }
            "Tj" | "TJ" | "'" | "\"" => {
                if !tf_since_bt {
                    let (name, size) = last_tf
                        .clone()
                        .or_else(|| fallback_tf.clone())
                        .unwrap_or_else(|| ("F0".to_string(), 1.0));
                    write_name(&mut out, &name);
                    out.push(b' ');
                    write_number(&mut out, size);
                    out.extend_from_slice(b" Tf\n");
                    tf_since_bt = true;
                }
            }
            _ => {}
        }

        for operand in &op.operands {
            write_operand(&mut out, operand);
            out.push(b' ');
        }
        out.extend_from_slice(op.operator.as_bytes());
        out.push(b'\n');
    }

    out
}

/// First `Tf` anywhere in the list; fallback for the synthesized font when
/// no `Tf` has been written yet.
fn first_tf_in(ops: &[EmitOp]) -> Option<(String, f64)> {
    ops.iter().filter(|op| op.operator == "Tf").find_map(|op| {
        let name = op.operands.iter().find_map(|operand| operand.as_name())?;
        let size = op.operands.iter().find_map(|operand| operand.as_number())?;
        Some((name.to_string(), size))
    })
}

fn write_operand(out: &mut Vec<u8>, operand: &Operand) {
    match operand {
        Operand::Number(n) => write_number(out, *n),
        Operand::String { bytes, hex } => {
            if *hex {
                write_hex_string(out, bytes);
            } else {
                write_literal_string(out, bytes);
            }
        }
        Operand::Name(name) => write_name(out, name),
        Operand::Boolean(true) => out.extend_from_slice(b"true"),
        Operand::Boolean(false) => out.extend_from_slice(b"false"),
        Operand::Null => out.extend_from_slice(b"null"),
        Operand::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b' ');
                }
                write_operand(out, item);
            }
            out.push(b']');
        }
        Operand::Dict(dict) => {
            // Deterministic key order
            let mut keys: Vec<&String> = dict.keys().collect();
            keys.sort();
            out.extend_from_slice(b"<<");
            for key in keys {
                out.push(b' ');
                write_name(out, key);
                out.push(b' ');
                write_operand(out, &dict[key]);
            }
            out.extend_from_slice(b" >>");
        }
    }
}

/// Writes a number: integer form when within 1e-4 of an integer, otherwise
/// ten significant digits with trailing zeros trimmed. A tiny nonzero value
/// keeps its significant digits rather than collapsing to 0. Always ASCII,
/// always `.` as the separator, never exponent notation.
pub(crate) fn write_number(out: &mut Vec<u8>, value: f64) {
    let value = if value.is_finite() { value } else { 0.0 };
    let rounded = value.round();
    if (value - rounded).abs() < 1e-4 && (rounded != 0.0 || value == 0.0) {
        let int = rounded as i64;
        out.extend_from_slice(int.to_string().as_bytes());
        return;
    }

    // Ten significant digits: keep 9 - floor(log10(|v|)) decimal places,
    // clamped at the decimal point for large magnitudes.
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (9 - magnitude).max(0) as usize;
    let mut s = format!("{:.*}", decimals, value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    out.extend_from_slice(s.as_bytes());
}

fn write_literal_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'(');
    for &b in bytes {
        match b {
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            b'(' => out.extend_from_slice(b"\\("),
            b')' => out.extend_from_slice(b"\\)"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            0x20..=0x7E => out.push(b),
            _ => {
                out.push(b'\\');
                out.extend_from_slice(format!("{:03o}", b).as_bytes());
            }
        }
    }
    out.push(b')');
}

fn write_hex_string(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(b'<');
    for &b in bytes {
        out.extend_from_slice(format!("{:02X}", b).as_bytes());
    }
    out.push(b'>');
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    out.push(b'/');
    for &b in name.as_bytes() {
        let needs_escape = b < 0x21
            || b > 0x7E
            || b == b'#'
            || lexer::is_delimiter(b);
        if needs_escape {
            out.extend_from_slice(format!("#{:02X}", b).as_bytes());
        } else {
            out.push(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize_to_string(ops: Vec<EmitOp>) -> String {
        let mut ops = ops;
        String::from_utf8_lossy(&serialize(&mut ops)).into_owned()
    }

    fn number(value: f64) -> String {
        let mut out = Vec::new();
        write_number(&mut out, value);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_number_formats() {
        assert_eq!(number(0.0), "0");
        assert_eq!(number(42.0), "42");
        assert_eq!(number(-7.0), "-7");
        assert_eq!(number(0.5), "0.5");
        assert_eq!(number(-2.25), "-2.25");
        assert_eq!(number(123.456), "123.456");
        // Within tolerance of an integer
        assert_eq!(number(99.99999), "100");
        // Trailing zeros trimmed
        assert_eq!(number(1.100000), "1.1");
    }

    #[test]
    fn test_number_ten_significant_digits() {
        // Large magnitude: the fraction falls outside ten significant digits
        assert_eq!(number(1234567890.123), "1234567890");
        assert_eq!(number(12345678.9012345), "12345678.9");
        assert_eq!(number(1234567.891), "1234567.891");
        assert_eq!(number(-12345678.9012345), "-12345678.9");

        // Small magnitude: significant digits survive, they do not collapse
        // to the integer 0
        assert_eq!(number(0.000000123), "0.000000123");
        assert_eq!(number(-0.000000123), "-0.000000123");
        assert_eq!(number(1e-5), "0.00001");
    }

    #[test]
    fn test_simple_op_line() {
        let text = serialize_to_string(vec![EmitOp::op(
            0,
            "Td",
            vec![Operand::Number(100.0), Operand::Number(700.0)],
        )]);
        assert_eq!(text, "100 700 Td\n");
    }

    #[test]
    fn test_zero_operand_op() {
        let text = serialize_to_string(vec![EmitOp::op(0, "q", vec![])]);
        assert_eq!(text, "q\n");
    }

    #[test]
    fn test_literal_string_escapes() {
        let text = serialize_to_string(vec![EmitOp::op(
            0,
            "Tj",
            vec![Operand::String {
                bytes: b"a(b)\\c\nd".to_vec(),
                hex: false,
            }],
        )]);
        assert_eq!(text, "(a\\(b\\)\\\\c\\nd) Tj\n");
    }

    #[test]
    fn test_literal_string_octal_for_high_bytes() {
        let text = serialize_to_string(vec![EmitOp::op(
            0,
            "Tj",
            vec![Operand::String {
                bytes: vec![b'A', 0x92, b'B'],
                hex: false,
            }],
        )]);
        // 0x92 = octal 222
        assert_eq!(text, "(A\\222B) Tj\n");
    }

    #[test]
    fn test_hex_string_uppercase() {
        let text = serialize_to_string(vec![EmitOp::op(
            0,
            "Tj",
            vec![Operand::String {
                bytes: vec![0x00, 0xAB, 0xCD],
                hex: true,
            }],
        )]);
        assert_eq!(text, "<00ABCD> Tj\n");
    }

    #[test]
    fn test_name_escapes() {
        let text = serialize_to_string(vec![EmitOp::op(
            0,
            "Tf",
            vec![Operand::Name("My Font".to_string()), Operand::Number(9.0)],
        )]);
        assert_eq!(text, "/My#20Font 9 Tf\n");
    }

    #[test]
    fn test_array_serialization() {
        let text = serialize_to_string(vec![EmitOp::op(
            0,
            "TJ",
            vec![Operand::Array(vec![
                Operand::String {
                    bytes: b"AB".to_vec(),
                    hex: false,
                },
                Operand::Number(-100.0),
                Operand::String {
                    bytes: b"CD".to_vec(),
                    hex: false,
                },
            ])],
        )]);
        assert_eq!(text, "[(AB) -100 (CD)] TJ\n");
    }

    #[test]
    fn test_stable_sort_by_position() {
        let text = serialize_to_string(vec![
            EmitOp::op(2, "Q", vec![]),
            EmitOp::op(0, "q", vec![]),
            EmitOp::op(1, "m", vec![Operand::Number(0.0), Operand::Number(0.0)]),
        ]);
        assert_eq!(text, "q\n0 0 m\nQ\n");
    }

    #[test]
    fn test_co_positioned_ops_keep_insertion_order() {
        let text = serialize_to_string(vec![
            EmitOp::op(5, "m", vec![Operand::Number(1.0), Operand::Number(1.0)]),
            EmitOp::op(5, "l", vec![Operand::Number(2.0), Operand::Number(2.0)]),
            EmitOp::op(5, "h", vec![]),
            EmitOp::op(5, "f", vec![]),
        ]);
        assert_eq!(text, "1 1 m\n2 2 l\nh\nf\n");
    }

    #[test]
    fn test_tf_synthesized_before_show() {
        // Tf exists at position 0, a later block shows text without one
        let text = serialize_to_string(vec![
            EmitOp::op(
                0,
                "Tf",
                vec![Operand::Name("F7".to_string()), Operand::Number(10.5)],
            ),
            EmitOp::op(1, "BT", vec![]),
            EmitOp::op(
                2,
                "Tj",
                vec![Operand::String {
                    bytes: b"x".to_vec(),
                    hex: false,
                }],
            ),
            EmitOp::op(3, "ET", vec![]),
        ]);
        assert_eq!(text, "/F7 10.5 Tf\nBT\n/F7 10.5 Tf\n(x) Tj\nET\n");
    }

    #[test]
    fn test_tf_not_synthesized_when_present() {
        let text = serialize_to_string(vec![
            EmitOp::op(0, "BT", vec![]),
            EmitOp::op(
                1,
                "Tf",
                vec![Operand::Name("F1".to_string()), Operand::Number(12.0)],
            ),
            EmitOp::op(
                2,
                "Tj",
                vec![Operand::String {
                    bytes: b"x".to_vec(),
                    hex: false,
                }],
            ),
            EmitOp::op(3, "ET", vec![]),
        ]);
        assert_eq!(text, "BT\n/F1 12 Tf\n(x) Tj\nET\n");
    }

    #[test]
    fn test_tf_synthesis_defaults_without_any_font() {
        let text = serialize_to_string(vec![
            EmitOp::op(0, "BT", vec![]),
            EmitOp::op(
                1,
                "Tj",
                vec![Operand::String {
                    bytes: b"x".to_vec(),
                    hex: false,
                }],
            ),
            EmitOp::op(2, "ET", vec![]),
        ]);
        assert_eq!(text, "BT\n/F0 1 Tf\n(x) Tj\nET\n");
    }

    #[test]
    fn test_raw_splice() {
        let text = serialize_to_string(vec![
            EmitOp::op(0, "q", vec![]),
            EmitOp::raw(1, b"BI /W 1 /H 1 ID x EI".to_vec()),
            EmitOp::op(2, "Q", vec![]),
        ]);
        assert_eq!(text, "q\nBI /W 1 /H 1 ID x EI\nQ\n");
    }

    #[test]
    fn test_output_is_ascii_outside_strings() {
        let mut ops = vec![EmitOp::op(
            0,
            "Tj",
            vec![Operand::String {
                bytes: vec![0xFF, 0x00],
                hex: false,
            }],
        )];
        let bytes = serialize(&mut ops);
        assert!(bytes.iter().all(|&b| b.is_ascii()));
    }
}
