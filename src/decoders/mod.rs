//! Stream decoders for the structural streams a signer has to read.
//!
//! Cross-reference streams and object streams are almost always FlateDecode
//! compressed, usually with a PNG predictor on top. Page content is never
//! decoded, so no other filter is needed.

use crate::error::{Error, Result};
use crate::object::Object;

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Upper bound for a decoded structural stream.
const MAX_DECODED_SIZE: usize = 256 * 1024 * 1024;

/// Trait for stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Filter name as it appears in a /Filter entry.
    fn name(&self) -> &str;
}

/// Decode stream data through a filter pipeline, then undo any predictor.
pub fn decode_stream(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            other => return Err(Error::Decode(format!("unsupported filter: {}", other))),
        };
        current = decoder.decode(&current)?;
        log::debug!("{} decoded {} -> {} bytes", decoder.name(), data.len(), current.len());

        if current.len() > MAX_DECODED_SIZE {
            return Err(Error::Decode(format!(
                "decoded stream of {} bytes exceeds limit of {} bytes",
                current.len(),
                MAX_DECODED_SIZE
            )));
        }
    }

    match params {
        Some(params) if params.predictor > 1 => decode_predictor(&current, params),
        _ => Ok(current),
    }
}

impl DecodeParams {
    /// Read predictor parameters from a /DecodeParms value.
    ///
    /// An array of parameter dictionaries (one per filter) contributes its
    /// first dictionary.
    pub fn from_object(params_obj: Option<&Object>) -> Option<Self> {
        let dict = match params_obj? {
            Object::Dictionary(d) => d,
            Object::Array(arr) => arr.iter().find_map(|obj| obj.as_dict())?,
            _ => return None,
        };

        let int = |key: &str, default: i64| {
            dict.get(key)
                .and_then(|obj| obj.as_integer())
                .unwrap_or(default)
        };

        Some(DecodeParams {
            predictor: int("Predictor", 1),
            columns: int("Columns", 1).max(1) as usize,
            colors: int("Colors", 1).max(1) as usize,
            bits_per_component: int("BitsPerComponent", 8).max(1) as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dictionary;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_flate_pipeline() {
        let compressed = zlib(b"1 0 obj");
        let decoded = decode_stream(&compressed, &["FlateDecode".to_string()], None).unwrap();
        assert_eq!(decoded, b"1 0 obj");
    }

    #[test]
    fn test_unsupported_filter() {
        let result = decode_stream(b"xx", &["DCTDecode".to_string()], None);
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_params_from_dictionary() {
        let mut dict = Dictionary::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(5));
        let params = DecodeParams::from_object(Some(&Object::Dictionary(dict))).unwrap();
        assert_eq!(params.predictor, 12);
        assert_eq!(params.columns, 5);
        assert_eq!(params.colors, 1);
        assert_eq!(params.bits_per_component, 8);
    }

    #[test]
    fn test_params_absent() {
        assert!(DecodeParams::from_object(None).is_none());
        assert!(DecodeParams::from_object(Some(&Object::Null)).is_none());
    }

    #[test]
    fn test_flate_with_png_up_predictor() {
        // Two rows of 3 columns, both tagged "Up" (2).
        let encoded_rows = [2u8, 1, 2, 3, 2, 1, 1, 1];
        let compressed = zlib(&encoded_rows);
        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            colors: 1,
            bits_per_component: 8,
        };
        let decoded =
            decode_stream(&compressed, &["FlateDecode".to_string()], Some(&params)).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn test_crafted_columns_are_a_decode_error() {
        let mut dict = Dictionary::new();
        dict.insert("Predictor".to_string(), Object::Integer(12));
        dict.insert("Columns".to_string(), Object::Integer(i64::MAX / 4));
        let params = DecodeParams::from_object(Some(&Object::Dictionary(dict))).unwrap();

        let compressed = zlib(&[2, 0, 0, 0]);
        let err = decode_stream(&compressed, &["FlateDecode".to_string()], Some(&params)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DocumentStructure);
    }
}
