//! Incremental update writer.
//!
//! An incremental update appends new and replaced objects to the unmodified
//! original bytes, followed by a cross-reference section that covers only
//! those objects and a trailer whose `/Prev` points at the previous section.
//! Byte offsets of everything the original file contains are preserved.

use super::object_serializer::ObjectSerializer;
use crate::document::SourceDocument;
use crate::error::Result;
use crate::object::{Dictionary, Object, ObjectRef};
use std::collections::BTreeMap;
use std::ops::Range;

/// Trailer keys carried forward from the previous revision.
const CARRIED_TRAILER_KEYS: [&str; 2] = ["Info", "ID"];

/// Collects objects for one incremental update of a source document.
#[derive(Debug)]
pub struct IncrementalUpdate<'a> {
    source: &'a SourceDocument,
    objects: BTreeMap<u32, (u16, Object)>,
    next_id: u32,
}

/// Serialized document after an incremental update.
#[derive(Debug, Clone)]
pub struct UpdatedDocument {
    /// Original bytes followed by the update section
    pub bytes: Vec<u8>,
    /// Byte span of each object written in the update, keyed by object number
    pub spans: BTreeMap<u32, Range<usize>>,
    /// Offset of the new cross-reference section
    pub startxref: usize,
}

impl UpdatedDocument {
    /// Byte span of a written object.
    pub fn span(&self, obj_ref: ObjectRef) -> Option<Range<usize>> {
        self.spans.get(&obj_ref.id).cloned()
    }
}

impl<'a> IncrementalUpdate<'a> {
    /// Start an update of `source`.
    pub fn new(source: &'a SourceDocument) -> Self {
        Self {
            source,
            objects: BTreeMap::new(),
            next_id: source.next_object_id(),
        }
    }

    /// Reserve a fresh object number.
    pub fn allocate(&mut self) -> ObjectRef {
        let obj_ref = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        obj_ref
    }

    /// Add a new object or replace an existing one.
    pub fn put(&mut self, obj_ref: ObjectRef, object: Object) {
        if obj_ref.id >= self.next_id {
            self.next_id = obj_ref.id + 1;
        }
        self.objects.insert(obj_ref.id, (obj_ref.gen, object));
    }

    /// Number of objects in the update.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Serialize the original bytes plus the update section.
    pub fn write(self) -> Result<UpdatedDocument> {
        let original = self.source.bytes();
        let serializer = ObjectSerializer::compact();

        let mut out = Vec::with_capacity(original.len() + 4096 * (self.objects.len() + 1));
        out.extend_from_slice(original);
        if !matches!(original.last(), Some(b'\n') | Some(b'\r')) {
            out.push(b'\n');
        }

        let mut spans = BTreeMap::new();
        let mut entries = Vec::with_capacity(self.objects.len());
        for (&id, (gen, object)) in &self.objects {
            let start = out.len();
            out.extend_from_slice(&serializer.serialize_indirect(id, *gen, object));
            spans.insert(id, start..out.len());
            entries.push((id, start, *gen));
        }

        let startxref = out.len();
        write_xref_section(&mut out, &entries);

        let trailer = self.build_trailer()?;
        out.extend_from_slice(b"trailer\n");
        out.extend_from_slice(&serializer.serialize(&Object::Dictionary(trailer)));
        out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", startxref).as_bytes());

        log::debug!(
            "Incremental update: {} objects, {} bytes appended, startxref {}",
            entries.len(),
            out.len() - original.len(),
            startxref
        );

        Ok(UpdatedDocument {
            bytes: out,
            spans,
            startxref,
        })
    }

    fn build_trailer(&self) -> Result<Dictionary> {
        let previous = self.source.trailer();
        let mut trailer = Dictionary::new();
        trailer.insert("Size".to_string(), Object::Integer(self.next_id as i64));
        trailer.insert("Root".to_string(), Object::Reference(self.source.catalog_ref()?));
        trailer.insert("Prev".to_string(), Object::Integer(self.source.startxref() as i64));
        for key in CARRIED_TRAILER_KEYS {
            if let Some(value) = previous.get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }
        Ok(trailer)
    }
}

/// Write a classic `xref` section, one subsection per run of consecutive
/// object numbers. Object 0 always heads the free list.
fn write_xref_section(out: &mut Vec<u8>, entries: &[(u32, usize, u16)]) {
    out.extend_from_slice(b"xref\n0 1\n0000000000 65535 f\r\n");

    let mut i = 0;
    while i < entries.len() {
        let mut run_end = i + 1;
        while run_end < entries.len() && entries[run_end].0 == entries[run_end - 1].0 + 1 {
            run_end += 1;
        }
        out.extend_from_slice(format!("{} {}\n", entries[i].0, run_end - i).as_bytes());
        for (_, offset, gen) in &entries[i..run_end] {
            out.extend_from_slice(format!("{:010} {:05} n\r\n", offset, gen).as_bytes());
        }
        i = run_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_indirect_at;
    use crate::xref::{parse_xref, XRefEntry};

    fn one_page_pdf(trailer_extra: &str) -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
        ];
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let xref_at = out.len();
        out.extend_from_slice(b"xref\n0 4\n0000000000 65535 f \n");
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size 4 /Root 1 0 R {} >>\nstartxref\n{}\n%%EOF",
                trailer_extra, xref_at
            )
            .as_bytes(),
        );
        out
    }

    #[test]
    fn test_original_bytes_are_preserved() {
        let original = one_page_pdf("");
        let doc = SourceDocument::from_bytes(original.clone()).unwrap();
        let mut update = IncrementalUpdate::new(&doc);
        let new_ref = update.allocate();
        assert_eq!(new_ref, ObjectRef::new(4, 0));
        update.put(new_ref, Object::Integer(7));

        let updated = update.write().unwrap();
        assert!(updated.bytes.starts_with(&original));
        // A newline is inserted because the original ends right after %%EOF.
        assert_eq!(updated.bytes[original.len()], b'\n');
        assert!(updated.bytes.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn test_update_is_readable_through_new_xref() {
        let doc = SourceDocument::from_bytes(one_page_pdf("/Info 3 0 R")).unwrap();
        let mut update = IncrementalUpdate::new(&doc);
        let mut page = doc.first_page().unwrap().1;
        page.insert("Rotate".to_string(), Object::Integer(90));
        update.put(ObjectRef::new(3, 0), Object::Dictionary(page));
        let added = update.allocate();
        update.put(added, Object::text("new"));

        let updated = update.write().unwrap();
        let table = parse_xref(&updated.bytes, updated.startxref).unwrap();

        match table.get(3) {
            Some(XRefEntry::InUse { offset, .. }) => {
                assert_eq!(*offset, updated.span(ObjectRef::new(3, 0)).unwrap().start);
                let (_, object) = parse_indirect_at(&updated.bytes, *offset).unwrap();
                assert_eq!(object.as_dict().unwrap().get("Rotate"), Some(&Object::Integer(90)));
            },
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(matches!(table.get(1), Some(XRefEntry::InUse { .. })));

        let trailer = table.trailer();
        assert_eq!(trailer.get("Size"), Some(&Object::Integer(5)));
        assert_eq!(trailer.get("Prev"), Some(&Object::Integer(doc.startxref() as i64)));
        assert_eq!(trailer.get("Info"), Some(&Object::Reference(ObjectRef::new(3, 0))));
    }

    #[test]
    fn test_xref_subsections_group_runs() {
        let mut out = Vec::new();
        write_xref_section(&mut out, &[(3, 100, 0), (7, 200, 0), (8, 300, 0)]);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "xref\n0 1\n0000000000 65535 f\r\n\
             3 1\n0000000100 00000 n\r\n\
             7 2\n0000000200 00000 n\r\n0000000300 00000 n\r\n"
        );
    }

    #[test]
    fn test_put_past_next_id_bumps_size() {
        let doc = SourceDocument::from_bytes(one_page_pdf("")).unwrap();
        let mut update = IncrementalUpdate::new(&doc);
        update.put(ObjectRef::new(10, 0), Object::Null);
        assert_eq!(update.allocate(), ObjectRef::new(11, 0));
        assert_eq!(update.len(), 1);
    }
}
