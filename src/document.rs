//! Read-only model of the document being signed.
//!
//! The whole file is held in memory: the incremental update has to copy the
//! original bytes verbatim anyway, and objects are parsed lazily from that
//! buffer through the cross-reference table.

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_at;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

/// Maximum number of indirections followed by [`SourceDocument::resolve`].
const MAX_RESOLVE_DEPTH: usize = 32;

/// Maximum page tree depth.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// A parsed, immutable source document.
pub struct SourceDocument {
    data: Vec<u8>,
    version: (u8, u8),
    xref: CrossRefTable,
    startxref: usize,
    object_streams: RefCell<HashMap<u32, Rc<Vec<(u32, Object)>>>>,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("len", &self.data.len())
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("startxref", &self.startxref)
            .finish_non_exhaustive()
    }
}

impl SourceDocument {
    /// Read and index a document from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        log::debug!("Read {} bytes from {}", data.len(), path.display());
        Self::from_bytes(data)
    }

    /// Index a document held in memory.
    ///
    /// Fails on a missing header, an unreadable cross-reference chain, or an
    /// encrypted document.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let version = parse_header(&data)?;
        let startxref = find_xref_offset(&data)?;
        let xref = parse_xref(&data, startxref)?;

        if xref.trailer().contains_key("Encrypt") {
            return Err(Error::structure("encrypted documents are not supported"));
        }

        log::debug!(
            "PDF {}.{} with {} xref entries, startxref {}",
            version.0,
            version.1,
            xref.len(),
            startxref
        );

        Ok(Self {
            data,
            version,
            xref,
            startxref,
            object_streams: RefCell::new(HashMap::new()),
        })
    }

    /// Original bytes, unmodified.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Header version (major, minor).
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Trailer of the newest revision.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Offset of the newest cross-reference section.
    pub fn startxref(&self) -> usize {
        self.startxref
    }

    /// First object number that is free for new objects.
    pub fn next_object_id(&self) -> u32 {
        let size = self
            .trailer()
            .get("Size")
            .and_then(Object::as_integer)
            .unwrap_or(0)
            .clamp(0, u32::MAX as i64) as u32;
        size.max(self.xref.max_object_number() + 1)
    }

    /// Load an indirect object.
    pub fn load_object(&self, obj_ref: ObjectRef) -> Result<Object> {
        match self.xref.get(obj_ref.id) {
            Some(XRefEntry::InUse { offset, generation }) => {
                if *generation != obj_ref.gen {
                    log::warn!(
                        "Reference {} does not match generation {} in xref",
                        obj_ref,
                        generation
                    );
                }
                let (found, object) = parse_indirect_at(&self.data, *offset)?;
                if found.id != obj_ref.id {
                    return Err(Error::ParseError {
                        offset: *offset,
                        reason: format!("expected object {}, found {}", obj_ref, found),
                    });
                }
                Ok(object)
            },
            Some(XRefEntry::Compressed { stream_id, index }) => {
                self.load_compressed(obj_ref, *stream_id, *index as usize)
            },
            Some(XRefEntry::Free { .. }) | None => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    fn load_compressed(&self, obj_ref: ObjectRef, stream_id: u32, index: usize) -> Result<Object> {
        let cached = self.object_streams.borrow().get(&stream_id).cloned();
        let members = match cached {
            Some(members) => members,
            None => {
                let stream_ref = ObjectRef::new(stream_id, 0);
                if matches!(self.xref.get(stream_id), Some(XRefEntry::Compressed { .. })) {
                    return Err(Error::structure(format!(
                        "object stream {} is itself compressed",
                        stream_ref
                    )));
                }
                let members = Rc::new(parse_object_stream(&self.load_object(stream_ref)?)?);
                log::debug!("Unpacked {} objects from object stream {}", members.len(), stream_id);
                self.object_streams
                    .borrow_mut()
                    .insert(stream_id, Rc::clone(&members));
                members
            },
        };

        // The index is a hint; fall back to a search by number.
        match members.get(index) {
            Some((id, object)) if *id == obj_ref.id => Ok(object.clone()),
            _ => members
                .iter()
                .find(|(id, _)| *id == obj_ref.id)
                .map(|(_, object)| object.clone())
                .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        }
    }

    /// Follow references until a direct object is reached.
    ///
    /// A reference to a missing object resolves to null.
    pub fn resolve(&self, object: &Object) -> Result<Object> {
        let mut current = object.clone();
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(r) => {
                    current = match self.load_object(r) {
                        Ok(loaded) => loaded,
                        Err(Error::ObjectNotFound(..)) => return Ok(Object::Null),
                        Err(e) => return Err(e),
                    };
                },
                direct => return Ok(direct),
            }
        }
        Err(Error::structure("reference chain too long"))
    }

    /// Resolve an object that must be a dictionary (or stream dictionary).
    pub fn resolve_dict(&self, object: &Object) -> Result<Dictionary> {
        match self.resolve(object)? {
            Object::Dictionary(dict) | Object::Stream { dict, .. } => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Reference of the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer()
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::structure("trailer /Root is not a reference"))
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<Dictionary> {
        let catalog = self.load_object(self.catalog_ref()?)?.into_dict()?;
        if let Some(kind) = catalog.get("Type").and_then(Object::as_name) {
            if kind != "Catalog" {
                log::warn!("Catalog has /Type /{}", kind);
            }
        }
        Ok(catalog)
    }

    /// Reference and dictionary of the first page.
    pub fn first_page(&self) -> Result<(ObjectRef, Dictionary)> {
        let catalog = self.catalog()?;
        let pages_ref = catalog
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::structure("catalog /Pages is not a reference"))?;

        let mut visited = HashSet::new();
        self.first_page_under(pages_ref, 0, &mut visited)?
            .ok_or_else(|| Error::structure("document has no pages"))
    }

    fn first_page_under(
        &self,
        node_ref: ObjectRef,
        depth: usize,
        visited: &mut HashSet<ObjectRef>,
    ) -> Result<Option<(ObjectRef, Dictionary)>> {
        if depth > MAX_PAGE_TREE_DEPTH || !visited.insert(node_ref) {
            log::warn!("Skipping page tree node {} (cycle or too deep)", node_ref);
            return Ok(None);
        }

        let node = self.load_object(node_ref)?.into_dict()?;
        let is_leaf = match node.get("Type").and_then(Object::as_name) {
            Some("Page") => true,
            Some("Pages") => false,
            _ => !node.contains_key("Kids"),
        };
        if is_leaf {
            return Ok(Some((node_ref, node)));
        }

        let kids = match node.get("Kids") {
            Some(kids) => self.resolve(kids)?,
            None => return Ok(None),
        };
        for kid in kids.as_array().map(Vec::as_slice).unwrap_or_default() {
            match kid.as_reference() {
                Some(kid_ref) => {
                    if let Some(found) = self.first_page_under(kid_ref, depth + 1, visited)? {
                        return Ok(Some(found));
                    }
                },
                None => log::warn!("Ignoring direct object in /Kids of {}", node_ref),
            }
        }
        Ok(None)
    }
}

/// Check the `%PDF-M.m` header and return the version.
///
/// Up to 1024 bytes of leading garbage are tolerated.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| {
            Error::InvalidHeader(String::from_utf8_lossy(&data[..data.len().min(8)]).into_owned())
        })?;
    if pos > 0 {
        log::warn!("PDF header found at offset {} instead of 0", pos);
    }

    match data.get(pos + 5..pos + 8) {
        Some([major, b'.', minor]) if major.is_ascii_digit() && minor.is_ascii_digit() => {
            Ok((major - b'0', minor - b'0'))
        },
        _ => Err(Error::InvalidHeader(
            String::from_utf8_lossy(&data[pos..data.len().min(pos + 8)]).into_owned(),
        )),
    }
}
