//! Field reservation and ByteRange planning.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` that opens the signature value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! [`reserve`] writes the signature field, its widget and the signature
//! dictionary as an incremental update with a zero-filled `/Contents`
//! placeholder, then patches the real offsets into `/ByteRange`. The
//! placeholder for `/ByteRange` is wide enough for any offset below 10^10,
//! so patching never moves a byte.

use super::appearance::{self, WidgetAnnotation};
use super::types::{ByteRange, SignatureInfo, SignatureRequest, SIGNATURE_FILTER, SIGNATURE_SUB_FILTER};
use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::object::{decode_text_string, encode_text_string, Dictionary, Object, ObjectRef};
use crate::writer::{IncrementalUpdate, UpdatedDocument};
use std::collections::HashSet;

/// Value written into each patched slot of the `/ByteRange` placeholder.
const BYTE_RANGE_PLACEHOLDER: i64 = 9_999_999_999;

/// `/SigFlags`: SignaturesExist | AppendOnly.
const SIG_FLAGS: i64 = 3;

/// Upper bound on field tree depth.
const MAX_FIELD_DEPTH: usize = 32;

/// A document with a reserved, still empty signature slot.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    bytes: Vec<u8>,
    byte_range: ByteRange,
    field: ObjectRef,
    signature: ObjectRef,
}

impl PreparedDocument {
    /// Full document bytes, placeholder included.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the document bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The byte range written into the signature dictionary.
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    /// Offset of the `<` that opens the `/Contents` value.
    pub fn contents_offset(&self) -> usize {
        self.byte_range.gap().start
    }

    /// Number of container bytes the placeholder can hold.
    pub fn contents_capacity(&self) -> usize {
        self.byte_range.gap().len().saturating_sub(2) / 2
    }

    /// Signature field (and widget) object.
    pub fn field_ref(&self) -> ObjectRef {
        self.field
    }

    /// Signature dictionary object.
    pub fn signature_ref(&self) -> ObjectRef {
        self.signature
    }
}

/// Where a dictionary or array lives, which decides what must be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Location {
    /// Its own indirect object
    Indirect(ObjectRef),
    /// Embedded in the parent object
    Inline,
}

/// An existing field whose fully qualified name matches the request.
#[derive(Debug)]
struct ExistingField {
    obj_ref: Option<ObjectRef>,
    dict: Dictionary,
    field_type: Option<String>,
}

/// Reserve the signature field and placeholder in an incremental update of
/// `document`, and attach the visible appearance to the same field.
///
/// Returns the prepared bytes and the byte range to hash.
pub fn reserve(
    document: &SourceDocument,
    request: &SignatureRequest,
    info: &SignatureInfo,
    max_signature_size: usize,
) -> Result<(PreparedDocument, ByteRange)> {
    if max_signature_size == 0 {
        return Err(Error::Signing("signature size must be at least one byte".to_string()));
    }

    let catalog_ref = document.catalog_ref()?;
    let mut catalog = document.catalog()?;
    let (page_ref, mut page) = document.first_page()?;

    let (mut acroform, acroform_location) = match catalog.get("AcroForm") {
        Some(Object::Reference(r)) => match document.resolve(&Object::Reference(*r))? {
            Object::Dictionary(dict) => (dict, Location::Indirect(*r)),
            Object::Null => (Dictionary::new(), Location::Inline),
            other => return Err(not_a("AcroForm", "dictionary", &other)),
        },
        Some(Object::Dictionary(dict)) => (dict.clone(), Location::Inline),
        _ => (Dictionary::new(), Location::Inline),
    };

    let (mut fields, fields_location) = match acroform.get("Fields") {
        Some(Object::Reference(r)) => match document.resolve(&Object::Reference(*r))? {
            Object::Array(items) => (items, Location::Indirect(*r)),
            Object::Null => (Vec::new(), Location::Inline),
            other => return Err(not_a("Fields", "array", &other)),
        },
        Some(Object::Array(items)) => (items.clone(), Location::Inline),
        _ => (Vec::new(), Location::Inline),
    };

    let existing = find_field(document, &fields, &request.field_name)?;
    let mut update = IncrementalUpdate::new(document);

    let (field_ref, mut field_dict, is_new) = match existing {
        Some(field) => {
            let obj_ref = check_reusable(document, &field, page_ref, &request.field_name)?;
            log::info!("Reusing unsigned signature field {} ({})", request.field_name, obj_ref);
            (obj_ref, field.dict, false)
        },
        None => {
            let obj_ref = update.allocate();
            let mut dict = Dictionary::new();
            dict.insert("FT".to_string(), Object::name("Sig"));
            dict.insert("Type".to_string(), Object::name("Annot"));
            dict.insert("Subtype".to_string(), Object::name("Widget"));
            dict.insert("T".to_string(), Object::String(encode_text_string(&request.field_name)));
            log::info!("Creating signature field {} ({})", request.field_name, obj_ref);
            (obj_ref, dict, true)
        },
    };

    let signature_ref = update.allocate();
    update.put(signature_ref, Object::Dictionary(signature_dictionary(info, max_signature_size)));

    let widget: WidgetAnnotation =
        appearance::render(page_ref, request.rect, &request.text).write_into(&mut update);
    widget.apply_to(&mut field_dict);
    field_dict.insert("V".to_string(), Object::Reference(signature_ref));
    update.put(field_ref, Object::Dictionary(field_dict));

    // Page /Annots
    let field_obj = Object::Reference(field_ref);
    match page.get("Annots").cloned() {
        Some(Object::Reference(r)) => match document.resolve(&Object::Reference(r))? {
            Object::Array(mut annots) => {
                if !annots.contains(&field_obj) {
                    annots.push(field_obj.clone());
                    update.put(r, Object::Array(annots));
                }
            },
            _ => {
                log::warn!("Page /Annots {} is not an array, replacing it", r);
                page.insert("Annots".to_string(), Object::Array(vec![field_obj.clone()]));
                update.put(page_ref, Object::Dictionary(page));
            },
        },
        Some(Object::Array(mut annots)) => {
            if !annots.contains(&field_obj) {
                annots.push(field_obj.clone());
                page.insert("Annots".to_string(), Object::Array(annots));
                update.put(page_ref, Object::Dictionary(page));
            }
        },
        _ => {
            page.insert("Annots".to_string(), Object::Array(vec![field_obj.clone()]));
            update.put(page_ref, Object::Dictionary(page));
        },
    }

    // AcroForm /Fields and /SigFlags
    if is_new {
        fields.push(field_obj);
        match fields_location {
            Location::Indirect(r) => update.put(r, Object::Array(fields)),
            Location::Inline => {
                acroform.insert("Fields".to_string(), Object::Array(fields));
            },
        }
    }
    acroform.insert("SigFlags".to_string(), Object::Integer(SIG_FLAGS));
    match acroform_location {
        Location::Indirect(r) => update.put(r, Object::Dictionary(acroform)),
        Location::Inline => {
            catalog.insert("AcroForm".to_string(), Object::Dictionary(acroform));
            update.put(catalog_ref, Object::Dictionary(catalog));
        },
    }

    let updated = update.write()?;
    let prepared = patch_byte_range(updated, field_ref, signature_ref, max_signature_size)?;
    let byte_range = prepared.byte_range;
    log::debug!(
        "Reserved {} bytes for the signature container, byte range {}",
        max_signature_size,
        byte_range
    );
    Ok((prepared, byte_range))
}

/// Signature dictionary with zero-filled `/ByteRange` and `/Contents`.
///
/// `/ByteRange` precedes `/Contents`, so the patched array is covered by the
/// first signed span.
fn signature_dictionary(info: &SignatureInfo, max_signature_size: usize) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.insert("Type".to_string(), Object::name("Sig"));
    dict.insert("Filter".to_string(), Object::name(SIGNATURE_FILTER));
    dict.insert("SubFilter".to_string(), Object::name(SIGNATURE_SUB_FILTER));
    dict.insert(
        "ByteRange".to_string(),
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(BYTE_RANGE_PLACEHOLDER),
            Object::Integer(BYTE_RANGE_PLACEHOLDER),
            Object::Integer(BYTE_RANGE_PLACEHOLDER),
        ]),
    );
    dict.insert("Contents".to_string(), Object::String(vec![0; max_signature_size]));
    dict.insert("M".to_string(), Object::text(info.pdf_date()));

    let optional = [
        ("Name", &info.signer_name),
        ("Reason", &info.reason),
        ("Location", &info.location),
        ("ContactInfo", &info.contact_info),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            dict.insert(key.to_string(), Object::String(encode_text_string(value)));
        }
    }
    dict
}

/// Locate the placeholders inside the written signature dictionary and
/// patch `/ByteRange` in place.
fn patch_byte_range(
    updated: UpdatedDocument,
    field: ObjectRef,
    signature: ObjectRef,
    max_signature_size: usize,
) -> Result<PreparedDocument> {
    let span = updated
        .span(signature)
        .ok_or_else(|| Error::Signing("signature dictionary was not written".to_string()))?;
    let mut bytes = updated.bytes;
    let object = &bytes[span.clone()];

    let contents_start = span.start
        + find(object, b"/Contents <")
            .ok_or_else(|| Error::Signing("/Contents placeholder not found".to_string()))?
        + b"/Contents ".len();
    let contents_end = contents_start + 2 * max_signature_size + 2;
    if bytes.get(contents_end - 1) != Some(&b'>') {
        return Err(Error::Signing("/Contents placeholder has unexpected size".to_string()));
    }

    let array_start = span.start
        + find(object, b"/ByteRange [")
            .ok_or_else(|| Error::Signing("/ByteRange placeholder not found".to_string()))?
        + b"/ByteRange ".len();
    let array_end = array_start
        + find(&bytes[array_start..contents_start], b"]")
            .ok_or_else(|| Error::Signing("/ByteRange placeholder is not closed".to_string()))?
        + 1;

    let byte_range = ByteRange::around(contents_start, contents_end, bytes.len());
    let mut patched = byte_range.to_string().into_bytes();
    let width = array_end - array_start;
    if patched.len() > width {
        return Err(Error::Signing(format!(
            "byte range {} does not fit its {} byte placeholder",
            byte_range, width
        )));
    }
    // Pad inside the brackets: "[0 1 2 3    ]"
    let close = patched.pop();
    patched.resize(width - 1, b' ');
    patched.extend(close);
    bytes[array_start..array_end].copy_from_slice(&patched);

    Ok(PreparedDocument {
        bytes,
        byte_range,
        field,
        signature,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Walk the field tree for a field whose fully qualified name is `name`.
fn find_field(document: &SourceDocument, fields: &[Object], name: &str) -> Result<Option<ExistingField>> {
    let mut visited = HashSet::new();
    let mut stack: Vec<(Object, Option<String>, Option<String>, usize)> = fields
        .iter()
        .rev()
        .map(|entry| (entry.clone(), None, None, 0))
        .collect();

    while let Some((entry, parent_name, inherited_type, depth)) = stack.pop() {
        let obj_ref = entry.as_reference();
        if let Some(r) = obj_ref {
            if !visited.insert(r) {
                log::warn!("Field {} appears twice in the field tree", r);
                continue;
            }
        }
        if depth > MAX_FIELD_DEPTH {
            log::warn!("Field tree deeper than {}, not descending further", MAX_FIELD_DEPTH);
            continue;
        }

        let dict = match document.resolve(&entry)? {
            Object::Dictionary(dict) => dict,
            _ => continue,
        };

        let partial = dict.get("T").and_then(Object::as_string).map(decode_text_string);
        let qualified = match (&parent_name, &partial) {
            (Some(parent), Some(partial)) => Some(format!("{}.{}", parent, partial)),
            (None, Some(partial)) => Some(partial.clone()),
            (parent, None) => parent.clone(),
        };
        let field_type = dict
            .get("FT")
            .and_then(Object::as_name)
            .map(str::to_string)
            .or(inherited_type);

        if partial.is_some() && qualified.as_deref() == Some(name) {
            return Ok(Some(ExistingField {
                obj_ref,
                dict,
                field_type,
            }));
        }

        if let Some(kids) = dict.get("Kids") {
            if let Object::Array(kids) = document.resolve(kids)? {
                for kid in kids.into_iter().rev() {
                    stack.push((kid, qualified.clone(), field_type.clone(), depth + 1));
                }
            }
        }
    }

    Ok(None)
}

/// Decide whether an existing field can take the signature.
fn check_reusable(
    document: &SourceDocument,
    field: &ExistingField,
    page_ref: ObjectRef,
    name: &str,
) -> Result<ObjectRef> {
    if field.field_type.as_deref() != Some("Sig") {
        return Err(Error::structure(format!(
            "field {} exists and is not a signature field (/FT {})",
            name,
            field.field_type.as_deref().unwrap_or("none")
        )));
    }
    if let Some(value) = field.dict.get("V") {
        if !document.resolve(value)?.is_null() {
            return Err(Error::structure(format!("signature field {} is already signed", name)));
        }
    }
    if field.dict.contains_key("Kids") {
        return Err(Error::structure(format!(
            "signature field {} has separate widget annotations",
            name
        )));
    }
    if let Some(page) = field.dict.get("P").and_then(Object::as_reference) {
        if page != page_ref {
            return Err(Error::structure(format!(
                "signature field {} is placed on another page ({})",
                name, page
            )));
        }
    }
    field.obj_ref.ok_or_else(|| {
        Error::structure(format!("signature field {} is not an indirect object", name))
    })
}

fn not_a(what: &str, expected: &str, found: &Object) -> Error {
    Error::structure(format!("/{} is not a {} ({})", what, expected, found.type_name()))
}
