//! PDF object parser.
//!
//! Recursive descent over lexer tokens. Composite objects (arrays and
//! dictionaries) recurse into [`parse_object`]; a dictionary followed by the
//! `stream` keyword becomes a stream object.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object, ObjectRef};
use nom::IResult;

/// Decode escape sequences in a literal string body.
///
/// Handles `\n \r \t \b \f \( \) \\`, octal `\ddd` and line continuations.
/// Unknown escapes drop the backslash.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] != b'\\' || i + 1 >= raw.len() {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        let escaped = raw[i + 1];
        i += 2;
        match escaped {
            b'n' => result.push(b'\n'),
            b'r' => result.push(b'\r'),
            b't' => result.push(b'\t'),
            b'b' => result.push(0x08),
            b'f' => result.push(0x0C),
            b'\n' => {},
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'0'..=b'7' => {
                let mut code = (escaped - b'0') as u32;
                for _ in 0..2 {
                    match raw.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            code = code * 8 + (d - b'0') as u32;
                            i += 1;
                        },
                        _ => break,
                    }
                }
                result.push((code & 0xFF) as u8);
            },
            other => result.push(other),
        }
    }

    result
}

/// Decode a hex string body to bytes. Whitespace is ignored and an odd
/// trailing digit is padded with 0.
pub fn decode_hex(hex_bytes: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex_bytes
        .iter()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|&c| match c {
            b'0'..=b'9' => Ok(c - b'0'),
            b'a'..=b'f' => Ok(c - b'a' + 10),
            b'A'..=b'F' => Ok(c - b'A' + 10),
            _ => Err(Error::ParseError {
                offset: 0,
                reason: format!("invalid hex digit {:?}", c as char),
            }),
        })
        .collect::<Result<_>>()?;

    Ok(digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect())
}

fn tag_error(input: &[u8]) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))
}

/// Parse a single PDF object.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),

        Token::Integer(i) => {
            // "id gen R" is a reference; anything else leaves the integer alone.
            if let Ok((after_gen, Token::Integer(gen))) = token(input) {
                if let Ok((after_r, Token::R)) = token(after_gen) {
                    if (0..=u32::MAX as i64).contains(&i) && (0..=u16::MAX as i64).contains(&gen) {
                        return Ok((after_r, Object::Reference(ObjectRef::new(i as u32, gen as u16))));
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        },

        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::LiteralString(raw) => Ok((input, Object::String(decode_literal_string_escapes(raw)))),

        Token::HexString(raw) => match decode_hex(raw) {
            Ok(decoded) => Ok((input, Object::String(decoded))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::HexDigit,
            ))),
        },

        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input),

        Token::DictStart => {
            let (remaining, dict) = parse_dictionary(input)?;
            match token(remaining) {
                Ok((after_kw, Token::StreamStart)) => {
                    let (rest, data) = parse_stream_data(after_kw, &dict)?;
                    Ok((
                        rest,
                        Object::Stream {
                            dict,
                            data: bytes::Bytes::copy_from_slice(data),
                        },
                    ))
                },
                _ => Ok((remaining, Object::Dictionary(dict))),
            }
        },

        _ => Err(tag_error(input)),
    }
}

/// Parse stream data after the `stream` keyword.
///
/// A direct /Length is trusted when `endstream` follows it. Otherwise (an
/// indirect or wrong /Length) the data runs up to the next `endstream`, minus
/// the end-of-line marker before it.
fn parse_stream_data<'a>(input: &'a [u8], dict: &Dictionary) -> IResult<&'a [u8], &'a [u8]> {
    let input = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(Object::as_integer) {
        let length = length.max(0) as usize;
        if length <= input.len() {
            if let Ok((rest, Token::StreamEnd)) = token(&input[length..]) {
                return Ok((rest, &input[..length]));
            }
        }
        log::debug!("Stream /Length {} does not end at endstream, scanning", length);
    }

    let pos = find_endstream(input).ok_or_else(|| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof))
    })?;
    let mut end = pos;
    if end > 0 && input[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && input[end - 1] == b'\r' {
        end -= 1;
    }
    let rest = &input[pos + b"endstream".len()..];
    Ok((rest, &input[..end]))
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input.windows(keyword.len()).position(|window| window == keyword)
}

fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(remaining) {
            return Ok((rest, Object::Array(objects)));
        }
        let (rest, obj) = parse_object(remaining)?;
        objects.push(obj);
        remaining = rest;
    }
}

fn parse_dictionary(input: &[u8]) -> IResult<&[u8], Dictionary> {
    let mut dict = Dictionary::new();
    let mut remaining = input;

    loop {
        let (rest, tok) = token(remaining)?;
        match tok {
            Token::DictEnd => return Ok((rest, dict)),
            Token::Name(key) => {
                let (rest, value) = parse_object(rest)?;
                // A null value is equivalent to an absent entry.
                if !value.is_null() {
                    dict.insert(key, value);
                }
                remaining = rest;
            },
            _ => return Err(tag_error(remaining)),
        }
    }
}

/// Parse an indirect object `id gen obj ... endobj` starting at `input`.
///
/// A missing `endobj` is tolerated.
pub fn parse_indirect_object(input: &[u8]) -> IResult<&[u8], (ObjectRef, Object)> {
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) if id >= 0 => (rest, id),
        _ => return Err(tag_error(input)),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) if (0..=u16::MAX as i64).contains(&gen) => (rest, gen),
        _ => return Err(tag_error(input)),
    };
    let rest = match token(rest)? {
        (rest, Token::ObjStart) => rest,
        _ => return Err(tag_error(input)),
    };

    let (rest, object) = parse_object(rest)?;
    let rest = match token(rest) {
        Ok((after, Token::ObjEnd)) => after,
        _ => rest,
    };

    Ok((rest, (ObjectRef::new(id as u32, gen as u16), object)))
}

/// Parse the indirect object that starts at `offset` in `data`.
pub fn parse_indirect_at(data: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    let slice = data.get(offset..).ok_or(Error::ParseError {
        offset,
        reason: "offset beyond end of file".to_string(),
    })?;
    parse_indirect_object(slice)
        .map(|(_, parsed)| parsed)
        .map_err(|e| match e {
            nom::Err::Error(inner) | nom::Err::Failure(inner) => Error::ParseError {
                offset: offset + slice.len() - inner.input.len(),
                reason: format!("malformed indirect object ({:?})", inner.code),
            },
            nom::Err::Incomplete(_) => Error::ParseError {
                offset,
                reason: "truncated indirect object".to_string(),
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives() {
        assert_eq!(parse_object(b"null").unwrap().1, Object::Null);
        assert_eq!(parse_object(b"true").unwrap().1, Object::Boolean(true));
        assert_eq!(parse_object(b"-17").unwrap().1, Object::Integer(-17));
        assert_eq!(parse_object(b"0.5").unwrap().1, Object::Real(0.5));
        assert_eq!(parse_object(b"/Sig").unwrap().1, Object::name("Sig"));
    }

    #[test]
    fn test_reference_lookahead() {
        let (_, obj) = parse_object(b"12 0 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(12, 0)));

        let (rest, obj) = parse_object(b"12 0 obj").unwrap();
        assert_eq!(obj, Object::Integer(12));
        assert_eq!(rest, b" 0 obj");
    }

    #[test]
    fn test_literal_string_escapes() {
        assert_eq!(decode_literal_string_escapes(b"a\\nb"), b"a\nb");
        assert_eq!(decode_literal_string_escapes(b"\\(x\\)"), b"(x)");
        assert_eq!(decode_literal_string_escapes(b"\\247"), vec![0xA7]);
        assert_eq!(decode_literal_string_escapes(b"\\0053"), vec![0x05, b'3']);
        assert_eq!(decode_literal_string_escapes(b"line\\\nnext"), b"linenext");
        assert_eq!(decode_literal_string_escapes(b"\\q"), b"q");
    }

    #[test]
    fn test_hex_strings() {
        assert_eq!(decode_hex(b"48 65 6C").unwrap(), b"Hel");
        assert_eq!(decode_hex(b"901FA").unwrap(), vec![0x90, 0x1F, 0xA0]);
        assert!(decode_hex(b"zz").is_err());
        assert_eq!(parse_object(b"<>").unwrap().1, Object::String(vec![]));
    }

    #[test]
    fn test_nested_dictionary() {
        let (_, obj) = parse_object(b"<< /Type /Annot /Rect [0 0 10.5 20] /P 4 0 R /AP << /N 9 0 R >> >>")
            .unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Annot"));
        assert_eq!(dict.get("Rect").unwrap().as_array().unwrap().len(), 4);
        assert_eq!(dict.get("P").unwrap().as_reference(), Some(ObjectRef::new(4, 0)));
        assert!(dict.get("AP").unwrap().as_dict().unwrap().contains_key("N"));
    }

    #[test]
    fn test_null_entries_are_dropped() {
        let (_, obj) = parse_object(b"<< /A null /B 1 >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert!(!dict.contains_key("A"));
        assert!(dict.contains_key("B"));
    }

    #[test]
    fn test_unterminated_array_fails() {
        assert!(parse_object(b"[1 2").is_err());
    }

    #[test]
    fn test_stream_with_direct_length() {
        let input = b"<< /Length 5 >>\nstream\nHelloendstream";
        let (_, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"Hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_with_indirect_length() {
        let input = b"<< /Length 8 0 R >>\r\nstream\r\nBT ET\r\nendstream\r\nendobj";
        let (rest, obj) = parse_object(input).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"BT ET"),
            other => panic!("expected stream, got {:?}", other),
        }
        assert_eq!(token(rest).unwrap().1, Token::ObjEnd);
    }

    #[test]
    fn test_indirect_object() {
        let data = b"junk 7 0 obj\n<< /Type /Catalog >>\nendobj\n";
        let (id, obj) = parse_indirect_at(data, 5).unwrap();
        assert_eq!(id, ObjectRef::new(7, 0));
        assert_eq!(obj.as_dict().unwrap().get("Type").unwrap().as_name(), Some("Catalog"));
    }

    #[test]
    fn test_indirect_object_bad_offset() {
        assert!(matches!(parse_indirect_at(b"1 0 obj 5 endobj", 99), Err(Error::ParseError { .. })));
        assert!(matches!(parse_indirect_at(b"<< >>", 0), Err(Error::ParseError { .. })));
    }
}
