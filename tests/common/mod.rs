//! Shared helpers for the integration tests.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Password of every PKCS#12 fixture.
pub const PASSWORD: &str = "secret";

/// Path of a file in `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

/// Read a file in `tests/fixtures`.
pub fn fixture_bytes(name: &str) -> Vec<u8> {
    std::fs::read(fixture(name)).unwrap()
}

/// Classic PDF from numbered object bodies (object 1 first).
pub fn classic_pdf(objects: &[&str], trailer_extra: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f\r\n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n\r\n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R {}>>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            trailer_extra,
            xref_at
        )
        .as_bytes(),
    );
    out
}

/// Three pages, each with a content stream, no form.
pub fn three_page_pdf() -> Vec<u8> {
    let content = "BT /F1 24 Tf 72 700 Td (Hello) Tj ET";
    let stream = format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content);
    classic_pdf(
        &[
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R 4 0 R 5 0 R] /Count 3 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 6 0 R /Resources << /Font << /F1 7 0 R >> >> >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
            stream.as_str(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>",
            "<< /Producer (pdf_autograph tests) >>",
        ],
        "/Info 8 0 R /ID [<0123456789ABCDEF0123456789ABCDEF> <0123456789ABCDEF0123456789ABCDEF>] ",
    )
}

/// One page whose form already holds `fields` (object bodies from 4 on).
///
/// Object 1 is the catalog with `/AcroForm << /Fields [4 0 R ...] >>`,
/// 2 the page tree, 3 page 1, and the last object a second page.
pub fn form_pdf(fields: &[&str]) -> Vec<u8> {
    let field_refs: Vec<String> = (0..fields.len()).map(|i| format!("{} 0 R", i + 4)).collect();
    let second_page = fields.len() + 4;
    let catalog = format!(
        "<< /Type /Catalog /Pages 2 0 R /AcroForm << /Fields [{}] >> >>",
        field_refs.join(" ")
    );
    let pages = format!("<< /Type /Pages /Kids [3 0 R {} 0 R] /Count 2 >>", second_page);
    let page = format!(
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Annots [{}] >>",
        field_refs.join(" ")
    );

    let mut objects: Vec<&str> = vec![catalog.as_str(), pages.as_str(), page.as_str()];
    objects.extend_from_slice(fields);
    objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>");
    classic_pdf(&objects, "")
}

/// A PDF 1.5 file whose objects live in a compressed object stream and
/// whose cross-reference section is a FlateDecode xref stream.
pub fn xref_stream_pdf() -> Vec<u8> {
    let members = [
        (1u32, "<< /Type /Catalog /Pages 2 0 R >>"),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        (3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 595 842] >>"),
    ];
    let mut header = String::new();
    let mut body = String::new();
    for (id, text) in members {
        header.push_str(&format!("{} {} ", id, body.len()));
        body.push_str(text);
        body.push('\n');
    }
    let first = header.len();
    let objstm_data = deflate(format!("{}{}", header, body).as_bytes());

    let mut out = b"%PDF-1.5\n".to_vec();
    let objstm_offset = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj\n<< /Type /ObjStm /N 3 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            first,
            objstm_data.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&objstm_data);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_offset = out.len();
    // W [1 4 2]: type, offset or stream number, generation or index
    let mut rows = Vec::new();
    rows.extend(row(0, 0, 65535));
    for index in 0..3u32 {
        rows.extend(row(2, 4, index as u16));
    }
    rows.extend(row(1, objstm_offset as u32, 0));
    rows.extend(row(1, xref_offset as u32, 0));
    let xref_data = deflate(&rows);

    out.extend_from_slice(
        format!(
            "5 0 obj\n<< /Type /XRef /Size 6 /W [1 4 2] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            xref_data.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&xref_data);
    out.extend_from_slice(format!("\nendstream\nendobj\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

fn row(kind: u8, field2: u32, field3: u16) -> Vec<u8> {
    let mut row = vec![kind];
    row.extend_from_slice(&field2.to_be_bytes());
    row.extend_from_slice(&field3.to_be_bytes());
    row
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Write `bytes` to `dir/name` and return the path.
pub fn write_pdf(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

/// Position of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the last `needle` in `haystack`.
pub fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
