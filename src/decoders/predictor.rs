//! Predictor reversal for cross-reference and object streams.
//!
//! Predictors 10-15 are PNG filters: every row carries its own filter tag
//! byte, whatever the /Predictor value says. Predictor 2 is TIFF horizontal
//! differencing.

use crate::error::{Error, Result};

/// Decode parameters for stream decoders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of columns (samples per row)
    pub columns: usize,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
        }
    }
}

impl DecodeParams {
    /// Bytes of sample data in one row, without the PNG tag byte.
    ///
    /// Fails when the parameters describe a row too large to address.
    pub fn pixel_bytes_per_row(&self) -> Result<usize> {
        self.columns
            .checked_mul(self.colors)
            .and_then(|samples| samples.checked_mul(self.bits_per_component))
            .map(|bits| bits.div_ceil(8))
            .ok_or_else(|| self.oversized())
    }

    /// Distance in bytes to the "left" neighbour, never less than one.
    fn bytes_per_pixel(&self) -> Result<usize> {
        self.colors
            .checked_mul(self.bits_per_component)
            .map(|bits| bits.div_ceil(8).max(1))
            .ok_or_else(|| self.oversized())
    }

    /// Row length checked against the amount of data actually present.
    fn row_len_within(&self, data: &[u8]) -> Result<usize> {
        let row_len = self.pixel_bytes_per_row()?;
        if row_len > data.len() {
            return Err(Error::Decode(format!(
                "predictor row of {} bytes exceeds {} bytes of stream data",
                row_len,
                data.len()
            )));
        }
        Ok(row_len)
    }

    fn oversized(&self) -> Error {
        Error::Decode(format!(
            "predictor row size overflows: {} columns, {} colors, {} bits",
            self.columns, self.colors, self.bits_per_component
        ))
    }
}

/// Reverse the predictor named in `params`.
pub fn decode_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => decode_tiff(data, params),
        10..=15 => decode_png(data, params),
        other => Err(Error::Decode(format!("Unsupported predictor: {}", other))),
    }
}

fn decode_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        return Err(Error::Decode(format!(
            "TIFF predictor with {} bits per component",
            params.bits_per_component
        )));
    }
    let row_len = params.row_len_within(data)?;
    let bpp = params.bytes_per_pixel()?;
    let mut output = Vec::with_capacity(data.len());

    for row in data.chunks(row_len) {
        let start = output.len();
        for (i, &byte) in row.iter().enumerate() {
            let left = if i >= bpp { output[start + i - bpp] } else { 0 };
            output.push(byte.wrapping_add(left));
        }
    }

    Ok(output)
}

fn decode_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = params.row_len_within(data)?;
    let bpp = params.bytes_per_pixel()?;
    let stride = row_len + 1;

    if data.len() % stride != 0 {
        log::warn!(
            "Predictor data length {} is not a multiple of row size {}, dropping tail",
            data.len(),
            stride
        );
    }

    let mut output: Vec<u8> = Vec::with_capacity(data.len() / stride * row_len);
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks_exact(stride) {
        let tag = chunk[0];
        let encoded = &chunk[1..];
        let mut row = vec![0u8; row_len];

        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = previous[i];
            let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };

            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, upper_left),
                other => {
                    return Err(Error::Decode(format!("Invalid PNG predictor tag: {}", other)));
                },
            };
            row[i] = encoded[i].wrapping_add(predicted);
        }

        output.extend_from_slice(&row);
        previous = row;
    }

    Ok(output)
}

/// Paeth predictor function (from the PNG specification).
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(columns: usize) -> DecodeParams {
        DecodeParams {
            predictor: 12,
            columns,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_predictor() {
        let data = vec![1, 2, 3];
        assert_eq!(decode_predictor(&data, &DecodeParams::default()).unwrap(), data);
    }

    #[test]
    fn test_png_rows_use_their_own_tag() {
        // Predictor 12 announced, but row two is tagged Sub.
        let data = vec![0, 5, 6, 7, 1, 1, 1, 1];
        let decoded = decode_predictor(&data, &png(3)).unwrap();
        assert_eq!(decoded, vec![5, 6, 7, 1, 2, 3]);
    }

    #[test]
    fn test_png_up_accumulates() {
        let data = vec![2, 1, 0, 0, 2, 0, 1, 0, 2, 0, 0, 1];
        let decoded = decode_predictor(&data, &png(3)).unwrap();
        assert_eq!(decoded, vec![1, 0, 0, 1, 1, 0, 1, 1, 1]);
    }

    #[test]
    fn test_png_average_and_paeth() {
        let data = vec![0, 10, 20, 3, 5, 5, 4, 1, 1];
        let decoded = decode_predictor(&data, &png(2)).unwrap();
        // Average row: [5 + 10/2, 5 + (10 + 20)/2] = [10, 20]
        assert_eq!(&decoded[..4], &[10, 20, 10, 20]);
        // Paeth row: first byte predicts from up (10), second from left/up
        assert_eq!(decoded[4], 11);
    }

    #[test]
    fn test_png_invalid_tag() {
        let data = vec![9, 0, 0];
        assert!(decode_predictor(&data, &png(2)).is_err());
    }

    #[test]
    fn test_tiff_predictor() {
        let params = DecodeParams {
            predictor: 2,
            columns: 4,
            ..Default::default()
        };
        let decoded = decode_predictor(&[1, 1, 1, 1], &params).unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_huge_columns_fail_before_allocating() {
        let params = png((i64::MAX / 4) as usize);
        let err = decode_predictor(&[2, 0, 0, 0], &params).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));

        let overflow = DecodeParams {
            predictor: 12,
            columns: usize::MAX,
            colors: 3,
            ..Default::default()
        };
        assert!(matches!(overflow.pixel_bytes_per_row(), Err(Error::Decode(_))));
        assert!(matches!(decode_predictor(&[0; 8], &overflow), Err(Error::Decode(_))));
    }

    #[test]
    fn test_row_longer_than_data() {
        let tiff = DecodeParams {
            predictor: 2,
            columns: 16,
            ..Default::default()
        };
        assert!(matches!(decode_predictor(&[1, 2, 3], &tiff), Err(Error::Decode(_))));
        assert!(decode_predictor(&[], &png(4)).unwrap().is_empty());
    }

    #[test]
    fn test_paeth_function() {
        assert_eq!(paeth(10, 20, 15), 15);
        assert_eq!(paeth(10, 10, 10), 10);
        assert_eq!(paeth(0, 5, 0), 5);
    }

    #[test]
    fn test_unsupported_predictor() {
        let params = DecodeParams {
            predictor: 7,
            ..Default::default()
        };
        assert!(decode_predictor(&[0], &params).is_err());
    }
}
