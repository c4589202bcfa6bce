//! PDF object serialization.
//!
//! Serializes objects to their byte representation. Dictionary entries are
//! written in insertion order, so a rewritten object keeps the key order of
//! the revision it replaces.

use crate::object::{Dictionary, Object};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSerializer {
    /// Put each dictionary entry on its own line
    pretty: bool,
}

impl ObjectSerializer {
    /// Create a compact serializer (single-line dictionaries).
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    /// Create a serializer that breaks dictionaries over lines.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an indirect object definition.
    ///
    /// Format: `{id} {gen} obj\n{object}\nendobj\n`
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(buf, *r),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(arr) => self.write_array(buf, arr),
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream { dict, data } => self.write_stream(buf, dict, data),
            Object::Reference(r) => buf.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_array(&self, buf: &mut Vec<u8>, arr: &[Object]) {
        buf.push(b'[');
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                buf.push(b' ');
            }
            self.write_object(buf, obj);
        }
        buf.push(b']');
    }

    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        buf.extend_from_slice(b"<<");
        for (key, value) in dict {
            buf.push(if self.pretty { b'\n' } else { b' ' });
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, value);
        }
        buf.extend_from_slice(if self.pretty && !dict.is_empty() { b"\n>>" } else { b" >>" });
    }

    fn write_stream(&self, buf: &mut Vec<u8>, dict: &Dictionary, data: &[u8]) {
        // /Length always reflects the data actually written.
        let mut dict = dict.clone();
        dict.insert("Length".to_string(), Object::Integer(data.len() as i64));

        self.write_dictionary(buf, &dict);
        buf.extend_from_slice(b"\nstream\n");
        buf.extend_from_slice(data);
        buf.extend_from_slice(b"\nendstream");
    }
}

/// Write a real number with at most five decimals, trailing zeros trimmed.
fn write_real(buf: &mut Vec<u8>, value: f64) {
    if !value.is_finite() {
        buf.push(b'0');
    } else if value.fract() == 0.0 && value.abs() < 1e15 {
        buf.extend_from_slice((value as i64).to_string().as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        buf.extend_from_slice(if trimmed == "-0" { "0" } else { trimmed }.as_bytes());
    }
}

/// Write a string, literal when printable and hexadecimal otherwise.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let printable = data
        .iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

    if printable {
        buf.push(b'(');
        for &byte in data {
            match byte {
                b'(' => buf.extend_from_slice(b"\\("),
                b')' => buf.extend_from_slice(b"\\)"),
                b'\\' => buf.extend_from_slice(b"\\\\"),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.push(byte),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        buf.extend_from_slice(to_hex(data).as_bytes());
        buf.push(b'>');
    }
}

/// Write a name, escaping delimiters and non-regular bytes as `#xx`.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for byte in name.bytes() {
        match byte {
            b'!'..=b'~'
                if !matches!(
                    byte,
                    b'#' | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
                ) =>
            {
                buf.push(byte)
            },
            _ => buf.extend_from_slice(format!("#{:02X}", byte).as_bytes()),
        }
    }
}

/// Uppercase hexadecimal encoding.
pub fn to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;
    use crate::parser::parse_object;

    fn text(obj: &Object) -> String {
        String::from_utf8(ObjectSerializer::compact().serialize(obj)).unwrap()
    }

    #[test]
    fn test_primitives() {
        assert_eq!(text(&Object::Null), "null");
        assert_eq!(text(&Object::Boolean(false)), "false");
        assert_eq!(text(&Object::Integer(-42)), "-42");
        assert_eq!(text(&Object::Reference(ObjectRef::new(3, 0))), "3 0 R");
    }

    #[test]
    fn test_reals() {
        assert_eq!(text(&Object::Real(236.0)), "236");
        assert_eq!(text(&Object::Real(0.5)), "0.5");
        assert_eq!(text(&Object::Real(1.0 / 3.0)), "0.33333");
        assert_eq!(text(&Object::Real(-0.000001)), "0");
    }

    #[test]
    fn test_strings() {
        assert_eq!(text(&Object::text("a (b) \\")), "(a \\(b\\) \\\\)");
        assert_eq!(text(&Object::String(vec![0, 0xAB])), "<00AB>");
    }

    #[test]
    fn test_zero_string_is_hex_placeholder() {
        assert_eq!(text(&Object::String(vec![0; 4])), "<00000000>");
    }

    #[test]
    fn test_name_escaping() {
        assert_eq!(text(&Object::name("Adobe.PPKLite")), "/Adobe.PPKLite");
        assert_eq!(text(&Object::name("A B#")), "/A#20B#23");
    }

    #[test]
    fn test_dictionary_order_is_kept() {
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("ByteRange".to_string(), Object::Array(vec![Object::Integer(0)]));
        assert_eq!(text(&Object::Dictionary(dict)), "<< /Type /Sig /ByteRange [0] >>");
        assert_eq!(text(&Object::Dictionary(Dictionary::new())), "<< >>");
    }

    #[test]
    fn test_stream_length_is_recomputed() {
        let mut dict = Dictionary::new();
        dict.insert("Length".to_string(), Object::Integer(999));
        let stream = Object::Stream {
            dict,
            data: bytes::Bytes::from_static(b"q Q"),
        };
        assert_eq!(text(&stream), "<< /Length 3 >>\nstream\nq Q\nendstream");
    }

    #[test]
    fn test_output_parses_back() {
        let source = b"<< /T (Sig1) /Rect [36 36 236 86] /AP << /N 12 0 R >> /F 132 >>";
        let (_, parsed) = parse_object(source).unwrap();
        let (_, reparsed) = parse_object(&ObjectSerializer::pretty().serialize(&parsed)).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_indirect() {
        let bytes = ObjectSerializer::compact().serialize_indirect(7, 0, &Object::Integer(1));
        assert_eq!(bytes, b"7 0 obj\n1\nendobj\n");
    }
}
