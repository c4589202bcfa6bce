//! Digital signature types and data structures.
//!
//! This module defines the data that flows through one signing run: the
//! caller's request, the extracted credentials, the planned byte range and
//! the encoded signature container.

use crate::config::SignerConfig;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use chrono::{DateTime, Utc};
use std::ops::Range;
use std::path::PathBuf;

/// Page that receives the signature widget (1-based).
pub const SIGNATURE_PAGE: usize = 1;

/// `/Filter` of the signature dictionary.
pub const SIGNATURE_FILTER: &str = "Adobe.PPKLite";

/// `/SubFilter` of the signature dictionary.
pub const SIGNATURE_SUB_FILTER: &str = "adbe.pkcs7.detached";

/// What to sign and how it should look.
///
/// Built once from caller input and never changed afterwards.
#[derive(Clone)]
pub struct SignatureRequest {
    /// Name of the signature field (`/T`)
    pub field_name: String,
    /// Text shown inside the signature box
    pub text: String,
    /// Box position on page 1, lower-left corner plus size
    pub rect: Rect,
    /// Document to sign
    pub source: PathBuf,
    /// PKCS#12 key container
    pub key_container: PathBuf,
    /// Password of the key container
    pub password: String,
}

impl SignatureRequest {
    /// Create a new request.
    pub fn new(
        field_name: impl Into<String>,
        text: impl Into<String>,
        rect: Rect,
        source: impl Into<PathBuf>,
        key_container: impl Into<PathBuf>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            text: text.into(),
            rect,
            source: source.into(),
            key_container: key_container.into(),
            password: password.into(),
        }
    }

    /// Page the widget is placed on. Always the first page.
    pub fn page(&self) -> usize {
        SIGNATURE_PAGE
    }
}

impl std::fmt::Debug for SignatureRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureRequest")
            .field("field_name", &self.field_name)
            .field("text", &self.text)
            .field("rect", &self.rect)
            .field("source", &self.source)
            .field("key_container", &self.key_container)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Descriptive entries of the signature dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInfo {
    /// `/Name`, the signer certificate's common name
    pub signer_name: Option<String>,
    /// `/M`
    pub signing_time: DateTime<Utc>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
}

impl SignatureInfo {
    /// Collect the dictionary entries for a run.
    pub fn new(config: &SignerConfig, signer_name: Option<String>) -> Self {
        Self {
            signer_name,
            signing_time: config.effective_signing_time(),
            reason: config.reason.clone(),
            location: config.location.clone(),
            contact_info: config.contact_info.clone(),
        }
    }

    /// `/M` value in PDF date format, e.g. `D:20240501120000+00'00'`.
    pub fn pdf_date(&self) -> String {
        self.signing_time.format("D:%Y%m%d%H%M%S+00'00'").to_string()
    }
}

/// The `/ByteRange` of a signature: `[offset1 length1 offset2 length2]`.
///
/// The two spans cover the whole document except the `/Contents` hex
/// string, delimiters included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange(pub [i64; 4]);

impl ByteRange {
    /// Byte range around a gap `[gap_start, gap_end)` in a document of
    /// `total_len` bytes.
    pub fn around(gap_start: usize, gap_end: usize, total_len: usize) -> Self {
        ByteRange([
            0,
            gap_start as i64,
            gap_end as i64,
            total_len.saturating_sub(gap_end) as i64,
        ])
    }

    /// The four integers as written into the document.
    pub fn values(&self) -> [i64; 4] {
        self.0
    }

    /// Signed spans, in order.
    pub fn spans(&self) -> [Range<usize>; 2] {
        let [o1, l1, o2, l2] = self.0.map(|v| v.max(0) as usize);
        [o1..o1 + l1, o2..o2 + l2]
    }

    /// Excluded region between the spans.
    pub fn gap(&self) -> Range<usize> {
        let [first, second] = self.spans();
        first.end..second.start
    }

    /// Number of signed bytes.
    pub fn covered_len(&self) -> usize {
        self.spans().iter().map(|span| span.len()).sum()
    }

    /// Check that the range starts at 0, ends at `total_len` and has a
    /// non-negative gap.
    pub fn validate(&self, total_len: usize) -> Result<()> {
        let [o1, l1, o2, l2] = self.0;
        if o1 != 0 || l1 < 0 || l2 < 0 || o2 < l1 {
            return Err(Error::Signing(format!("malformed byte range {:?}", self.0)));
        }
        let end = o2
            .checked_add(l2)
            .ok_or_else(|| Error::Signing(format!("byte range {:?} overflows", self.0)))?;
        if usize::try_from(end).ok() != Some(total_len) {
            return Err(Error::Signing(format!(
                "byte range {:?} does not end at document length {}",
                self.0, total_len
            )));
        }
        Ok(())
    }

    /// Borrow the two signed spans out of `data`.
    pub fn slices<'a>(&self, data: &'a [u8]) -> Result<[&'a [u8]; 2]> {
        self.validate(data.len())?;
        let [first, second] = self.spans();
        Ok([&data[first], &data[second]])
    }
}

impl std::fmt::Display for ByteRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "[{} {} {} {}]", a, b, c, d)
    }
}

/// DER-encoded CMS `ContentInfo` holding a detached `SignedData`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContainer(Vec<u8>);

impl SignatureContainer {
    /// Wrap encoded bytes.
    pub fn new(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// Encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for an empty container.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Private key as PKCS#8 DER.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Vec<u8>);

impl PrivateKey {
    /// Wrap PKCS#8 DER bytes.
    pub fn from_pkcs8_der(der: Vec<u8>) -> Self {
        Self(der)
    }

    /// PKCS#8 DER bytes.
    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Dotted OID of the key algorithm, if the encoding is readable.
    pub fn algorithm(&self) -> Option<String> {
        pkcs8::PrivateKeyInfo::try_from(self.0.as_slice())
            .ok()
            .map(|info| info.algorithm.oid.to_string())
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").field(&"[REDACTED]").finish()
    }
}

/// DER certificates, leaf first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CertificateChain(Vec<Vec<u8>>);

impl CertificateChain {
    /// Wrap DER certificates ordered leaf first.
    pub fn new(certificates: Vec<Vec<u8>>) -> Self {
        Self(certificates)
    }

    /// The signer certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        self.0.first().map(Vec::as_slice)
    }

    /// All certificates, leaf first.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.0.iter().map(Vec::as_slice)
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the chain holds no certificate.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Common name of the leaf certificate's subject.
    pub fn leaf_common_name(&self) -> Option<String> {
        let (_, cert) = x509_parser::parse_x509_certificate(self.leaf()?).ok()?;
        let name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);
        name
    }
}

/// A key entry taken from a key container.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Alias of the entry
    pub alias: String,
    /// Signing key
    pub key: PrivateKey,
    /// Certificate chain, leaf first
    pub chain: CertificateChain,
}
