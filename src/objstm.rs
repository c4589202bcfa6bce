//! Object stream parsing (PDF 1.5+).
//!
//! An object stream (`/Type /ObjStm`) packs several objects into one
//! compressed stream. The decoded data starts with `/N` pairs of integers
//! (object number, offset relative to `/First`), followed by the objects.
//! Cross-reference entries address members by their position in that list.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;

/// Upper bound on `/N`.
const MAX_OBJECTS_PER_STREAM: i64 = 1_000_000;

/// Parse an object stream into its members, in header order.
pub fn parse_object_stream(stream_obj: &Object) -> Result<Vec<(u32, Object)>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    if let Some(type_name) = dict.get("Type").and_then(Object::as_name) {
        if type_name != "ObjStm" {
            return Err(Error::structure(format!(
                "expected /Type /ObjStm, got /Type /{}",
                type_name
            )));
        }
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .filter(|n| (0..=MAX_OBJECTS_PER_STREAM).contains(n))
        .ok_or_else(|| Error::structure("object stream has no valid /N"))? as usize;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .filter(|first| *first >= 0)
        .ok_or_else(|| Error::structure("object stream has no valid /First"))? as usize;

    let decoded = stream_obj.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::structure(format!(
            "object stream data too short: {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let header = parse_header(&decoded[..first], n)?;
    let body = &decoded[first..];
    let mut members = Vec::with_capacity(header.len());

    for (id, offset) in header {
        let parsed = body.get(offset..).and_then(|slice| parse_object(slice).ok());
        match parsed {
            Some((_, object)) => members.push((id, object)),
            None => {
                log::warn!("Object {} at offset {} in object stream is unreadable", id, offset);
                members.push((id, Object::Null));
            },
        }
    }

    Ok(members)
}

fn parse_header(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut pairs = Vec::with_capacity(count);
    let mut remaining = data;

    for _ in 0..count {
        let mut pair = [0i64; 2];
        for slot in pair.iter_mut() {
            match token(remaining) {
                Ok((rest, Token::Integer(value))) if value >= 0 => {
                    *slot = value;
                    remaining = rest;
                },
                _ => return Err(Error::structure("malformed object stream header")),
            }
        }
        pairs.push((pair[0] as u32, pair[1] as usize));
    }

    Ok(pairs)
}
