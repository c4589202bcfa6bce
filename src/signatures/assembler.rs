//! Signing run orchestration.
//!
//! A run moves through `Opened → Prepared → Hashed → Signed → Finalized`.
//! Every transition consumes the previous state, so a failed run simply
//! drops its state; the destination [`NamedTempFile`] goes with it and is
//! deleted. Only [`Signed::finalize`] persists the destination file.
//!
//! ```ignore
//! use pdf_autograph::{sign_document, Rect, SignatureRequest, SignerConfig};
//!
//! let request = SignatureRequest::new(
//!     "Signature1",
//!     "Approved by J. Doe",
//!     Rect::from_ints(36, 36, 200, 60),
//!     "contract.pdf",
//!     "signer.p12",
//!     "secret",
//! );
//! let output = sign_document(&request, &SignerConfig::default())?;
//! println!("{}", output.display());
//! ```

use super::byterange::{self, PreparedDocument};
use super::credentials;
use super::signer;
use super::types::{ByteRange, Credentials, SignatureContainer, SignatureInfo, SignatureRequest};
use crate::config::SignerConfig;
use crate::document::SourceDocument;
use crate::error::{Error, Result};
use crate::writer::to_hex;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Extension of every output file.
const OUTPUT_SUFFIX: &str = ".pdf";

/// Source loaded, credentials extracted, destination created.
#[derive(Debug)]
pub struct Opened {
    document: SourceDocument,
    credentials: Credentials,
    destination: NamedTempFile,
}

/// Field and placeholder reserved, appearance attached.
#[derive(Debug)]
pub struct Prepared {
    document: PreparedDocument,
    byte_range: ByteRange,
    credentials: Credentials,
    signing_time: DateTime<Utc>,
    destination: NamedTempFile,
}

/// Byte range digested.
#[derive(Debug)]
pub struct Hashed {
    document: PreparedDocument,
    digest: [u8; 32],
    credentials: Credentials,
    signing_time: DateTime<Utc>,
    destination: NamedTempFile,
}

/// Signature container built and known to fit.
#[derive(Debug)]
pub struct Signed {
    document: PreparedDocument,
    container: SignatureContainer,
    destination: NamedTempFile,
}

/// Signed document persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    path: PathBuf,
    byte_range: ByteRange,
    signature_len: usize,
}

impl Opened {
    /// Extract the credentials, load the source and create the destination.
    ///
    /// The key container is opened first so that a wrong password never
    /// leaves a destination file behind.
    pub fn open(request: &SignatureRequest, config: &SignerConfig) -> Result<Self> {
        let credentials = credentials::extract_file(&request.key_container, &request.password)?;
        let document = SourceDocument::open(&request.source)?;
        let destination = create_destination(config)?;

        log::info!(
            "Opened {} (PDF {}.{}) for signing as {}, writing to {}",
            request.source.display(),
            document.version().0,
            document.version().1,
            credentials.alias,
            destination.path().display()
        );
        Ok(Self {
            document,
            credentials,
            destination,
        })
    }

    /// Path of the destination file.
    pub fn destination_path(&self) -> &Path {
        self.destination.path()
    }

    /// Reserve the signature field and placeholder and attach the appearance.
    pub fn prepare(self, request: &SignatureRequest, config: &SignerConfig) -> Result<Prepared> {
        let info = SignatureInfo::new(config, self.credentials.chain.leaf_common_name());
        let (document, byte_range) =
            byterange::reserve(&self.document, request, &info, config.max_signature_size)?;

        log::info!(
            "Prepared field {} on page {} with byte range {}",
            request.field_name,
            request.page(),
            byte_range
        );
        Ok(Prepared {
            document,
            byte_range,
            credentials: self.credentials,
            signing_time: info.signing_time,
            destination: self.destination,
        })
    }
}

impl Prepared {
    /// The document with its empty placeholder.
    pub fn document(&self) -> &PreparedDocument {
        &self.document
    }

    /// Digest the byte range.
    pub fn hash(self) -> Result<Hashed> {
        let digest = signer::digest(self.document.bytes(), &self.byte_range)?;
        log::info!("Hashed {} bytes", self.byte_range.covered_len());
        Ok(Hashed {
            document: self.document,
            digest,
            credentials: self.credentials,
            signing_time: self.signing_time,
            destination: self.destination,
        })
    }
}

impl Hashed {
    /// SHA-256 of the byte range.
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Build the signature container.
    pub fn sign(self) -> Result<Signed> {
        let container = signer::sign_digest(
            &self.digest,
            &self.credentials.key,
            &self.credentials.chain,
            self.signing_time,
        )?;
        signer::ensure_fits(&container, self.document.contents_capacity())?;
        log::info!(
            "Signed with {} ({} certificates, {} byte container)",
            self.credentials.alias,
            self.credentials.chain.len(),
            container.len()
        );
        Ok(Signed {
            document: self.document,
            container,
            destination: self.destination,
        })
    }
}

impl Signed {
    /// The encoded signature container.
    pub fn container(&self) -> &SignatureContainer {
        &self.container
    }

    /// Write the container into the placeholder and persist the destination.
    pub fn finalize(self) -> Result<Finalized> {
        let byte_range = self.document.byte_range();
        let start = self.document.contents_offset() + 1;
        let hex = to_hex(self.container.as_bytes());

        let mut bytes = self.document.into_bytes();
        // The placeholder is already zero-filled, so the unused tail stays "00...".
        bytes
            .get_mut(start..start + hex.len())
            .ok_or_else(|| Error::Signing("signature container does not fit its placeholder".to_string()))?
            .copy_from_slice(hex.as_bytes());

        let mut destination = self.destination;
        destination.write_all(&bytes)?;
        destination.flush()?;
        destination.as_file().sync_all()?;

        let (_file, path) = destination.keep().map_err(|e| Error::Io(e.error))?;
        log::info!("Finalized {} ({} bytes)", path.display(), bytes.len());
        Ok(Finalized {
            path,
            byte_range,
            signature_len: self.container.len(),
        })
    }
}

impl Finalized {
    /// Path of the signed document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the path of the signed document.
    pub fn into_path(self) -> PathBuf {
        self.path
    }

    /// Byte range covered by the signature.
    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    /// Size of the DER signature container.
    pub fn signature_len(&self) -> usize {
        self.signature_len
    }
}

/// Sign `request.source` and return the path of the new signed copy.
///
/// The source document is never modified. On failure no output file is
/// left behind.
pub fn sign_document(request: &SignatureRequest, config: &SignerConfig) -> Result<PathBuf> {
    let finalized = Opened::open(request, config)?
        .prepare(request, config)?
        .hash()?
        .sign()?
        .finalize()?;
    Ok(finalized.into_path())
}

fn create_destination(config: &SignerConfig) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(&config.output_prefix).suffix(OUTPUT_SUFFIX);
    let file = match &config.output_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    Ok(file)
}
