//! Cross-reference table parser.
//!
//! Maps object numbers to their locations in the file. Reads classic `xref`
//! tables and cross-reference streams (PDF 1.5+), and follows `/Prev` chains
//! through earlier revisions. Entries from newer sections win.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object};
use crate::parser::parse_indirect_at;
use std::collections::{HashMap, HashSet};

/// Upper bound on revisions followed through `/Prev`.
const MAX_XREF_SECTIONS: usize = 256;

/// Upper bound on entries in one subsection.
const MAX_SUBSECTION_ENTRIES: u32 = 10_000_000;

/// Where an object lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free (deleted) object.
    Free {
        /// Generation number for reuse
        generation: u16,
    },
    /// Object stored at a byte offset.
    InUse {
        /// Byte offset of `id gen obj`
        offset: usize,
        /// Generation number
        generation: u16,
    },
    /// Object stored inside an object stream.
    Compressed {
        /// Object number of the containing object stream
        stream_id: u32,
        /// Index of the object within the stream
        index: u32,
    },
}

/// Merged cross-reference information of a whole file.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl CrossRefTable {
    /// Look up an object number.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Trailer of the newest section.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Number of known object numbers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were read.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest object number that appears in any section.
    pub fn max_object_number(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Fold an older section in. Existing (newer) entries are kept.
    fn merge_older(&mut self, older: HashMap<u32, XRefEntry>) {
        for (id, entry) in older {
            self.entries.entry(id).or_insert(entry);
        }
    }
}

/// Find the offset named by the last `startxref` in the file.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let tail_start = data.len().saturating_sub(4096);
    let tail = &data[tail_start..];
    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|window| window == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits: String = tail[pos + keyword.len()..]
        .iter()
        .skip_while(|c| c.is_ascii_whitespace())
        .take_while(|c| c.is_ascii_digit())
        .map(|&c| c as char)
        .collect();

    let offset: usize = digits.parse().map_err(|_| Error::InvalidXref)?;
    if offset >= data.len() {
        return Err(Error::InvalidXref);
    }
    Ok(offset)
}

/// Read the cross-reference chain starting at `offset`.
///
/// The trailer of the first (newest) section becomes the table's trailer.
pub fn parse_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::default();
    let mut visited = HashSet::new();
    let mut next = Some(offset);
    let mut first = true;

    while let Some(offset) = next.take() {
        if !visited.insert(offset) {
            log::warn!("Cross-reference /Prev loop at offset {}, stopping", offset);
            break;
        }
        if visited.len() > MAX_XREF_SECTIONS {
            return Err(Error::structure("too many cross-reference sections"));
        }

        let (entries, trailer) = parse_section(data, offset)?;
        log::debug!("Read {} xref entries at offset {}", entries.len(), offset);
        table.merge_older(entries);

        // Hybrid files keep compressed entries in a side stream.
        if let Some(stm_offset) = trailer.get("XRefStm").and_then(Object::as_integer) {
            match parse_xref_stream(data, stm_offset as usize) {
                Ok((entries, _)) => table.merge_older(entries),
                Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }

        next = trailer
            .get("Prev")
            .and_then(Object::as_integer)
            .filter(|&prev| prev >= 0)
            .map(|prev| prev as usize);

        if first {
            table.trailer = trailer;
            first = false;
        }
    }

    if table.trailer.get("Root").is_none() {
        return Err(Error::structure("trailer has no /Root entry"));
    }
    Ok(table)
}

type Section = (HashMap<u32, XRefEntry>, Dictionary);

fn parse_section(data: &[u8], offset: usize) -> Result<Section> {
    let start = data
        .get(offset..)
        .ok_or(Error::InvalidXref)?
        .iter()
        .position(|c| !c.is_ascii_whitespace())
        .map(|skip| offset + skip)
        .ok_or(Error::InvalidXref)?;

    if data[start..].starts_with(b"xref") {
        parse_classic(data, start + 4)
    } else {
        parse_xref_stream(data, start)
    }
}

/// Line-oriented cursor over a classic table.
struct LineCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LineCursor<'a> {
    fn next_line(&mut self) -> Option<&'a str> {
        while self.pos < self.data.len() && matches!(self.data[self.pos], b'\r' | b'\n') {
            self.pos += 1;
        }
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        while self.pos < self.data.len() && !matches!(self.data[self.pos], b'\r' | b'\n') {
            self.pos += 1;
        }
        std::str::from_utf8(&self.data[start..self.pos]).ok()
    }
}

fn parse_classic(data: &[u8], body_start: usize) -> Result<Section> {
    let mut entries = HashMap::new();
    let mut cursor = LineCursor {
        data,
        pos: body_start,
    };

    loop {
        let line_start = cursor.pos;
        let line = cursor.next_line().ok_or(Error::InvalidXref)?.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("trailer") {
            // The trailer dictionary may share the line with the keyword.
            let keyword_at = data[line_start..]
                .windows(7)
                .position(|w| w == b"trailer")
                .map(|p| line_start + p + 7)
                .ok_or(Error::InvalidXref)?;
            let (_, trailer) = crate::parser::parse_object(&data[keyword_at..])
                .map_err(|_| Error::ParseError {
                    offset: keyword_at,
                    reason: "malformed trailer dictionary".to_string(),
                })?;
            return Ok((entries, trailer.into_dict()?));
        }

        let mut header = line.split_whitespace();
        let (first_id, count) = match (header.next(), header.next(), header.next()) {
            (Some(a), Some(b), None) => (
                a.parse::<u32>().map_err(|_| Error::InvalidXref)?,
                b.parse::<u32>().map_err(|_| Error::InvalidXref)?,
            ),
            _ => return Err(Error::InvalidXref),
        };
        if count > MAX_SUBSECTION_ENTRIES {
            return Err(Error::InvalidXref);
        }

        for i in 0..count {
            let line = cursor.next_line().ok_or(Error::InvalidXref)?;
            let mut parts = line.split_whitespace();
            let (field1, generation, kind) = match (parts.next(), parts.next(), parts.next()) {
                (Some(a), Some(b), Some(c)) => (a, b, c),
                _ => {
                    log::warn!("Malformed xref entry {:?} for object {}", line, first_id + i);
                    continue;
                },
            };
            let field1: usize = field1.parse().map_err(|_| Error::InvalidXref)?;
            let generation: u16 = generation.parse().map_err(|_| Error::InvalidXref)?;
            let entry = match kind {
                "n" => XRefEntry::InUse {
                    offset: field1,
                    generation,
                },
                "f" => XRefEntry::Free { generation },
                _ => return Err(Error::InvalidXref),
            };
            entries.entry(first_id + i).or_insert(entry);
        }
    }
}

fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn parse_xref_stream(data: &[u8], offset: usize) -> Result<Section> {
    let (_, object) = parse_indirect_at(data, offset)?;
    let dict = object
        .as_dict()
        .filter(|_| matches!(object, Object::Stream { .. }))
        .ok_or(Error::InvalidXref)?;

    if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidXref);
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or(Error::InvalidXref)?
        .iter()
        .map(|w| w.as_integer().filter(|&w| (0..=8).contains(&w)).map(|w| w as usize))
        .collect::<Option<_>>()
        .ok_or(Error::InvalidXref)?;
    if widths.len() != 3 {
        return Err(Error::InvalidXref);
    }
    let entry_len: usize = widths.iter().sum();
    if entry_len == 0 {
        return Err(Error::InvalidXref);
    }

    let size = dict
        .get("Size")
        .and_then(Object::as_integer)
        .ok_or(Error::InvalidXref)?;
    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks(2)
            .map(|pair| match pair {
                [start, count] => Some((start.as_integer()? as u32, count.as_integer()? as u32)),
                _ => None,
            })
            .collect::<Option<_>>()
            .ok_or(Error::InvalidXref)?,
        None => vec![(0, size.max(0) as u32)],
    };

    let decoded = object.decode_stream_data()?;
    let mut rows = decoded.chunks_exact(entry_len);
    let mut entries = HashMap::new();

    for (first_id, count) in ranges {
        for i in 0..count {
            let Some(row) = rows.next() else {
                log::warn!("Cross-reference stream at {} is shorter than its /Index", offset);
                break;
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1.
            let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
            let field2 = read_field(f2);
            let field3 = read_field(f3);

            let entry = match kind {
                0 => XRefEntry::Free {
                    generation: field3 as u16,
                },
                1 => XRefEntry::InUse {
                    offset: field2 as usize,
                    generation: field3 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: field2 as u32,
                    index: field3 as u32,
                },
                // Unknown types are treated as null references.
                _ => continue,
            };
            entries.entry(first_id + i).or_insert(entry);
        }
    }

    let mut trailer = dict.clone();
    for key in ["Length", "Filter", "DecodeParms", "W", "Index", "Type"] {
        trailer.shift_remove(key);
    }
    Ok((entries, trailer))
}
