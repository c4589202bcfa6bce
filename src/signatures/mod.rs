//! PDF digital signatures.
//!
//! Signs an existing document with a detached CMS signature
//! (`adbe.pkcs7.detached`) and a visible appearance on page 1, written as an
//! incremental update to a fresh output file.
//!
//! The run is split the same way the signature is built:
//!
//! - [`credentials`]: key and certificate chain from a PKCS#12 container
//! - [`byterange`]: signature field, placeholder and `/ByteRange`
//! - [`appearance`]: the visible box and its text
//! - [`signer`]: SHA-256 digest and the CMS `SignedData`
//! - [`assembler`]: the state machine tying them together
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-1:2008 Section 12.8 - Digital Signatures
//! - RFC 5652 - Cryptographic Message Syntax

pub mod appearance;
pub mod assembler;
pub mod byterange;
pub mod credentials;
pub mod signer;
mod types;

pub use appearance::{render, SignatureAppearance, WidgetAnnotation};
pub use assembler::{sign_document, Finalized, Hashed, Opened, Prepared, Signed};
pub use byterange::{reserve, PreparedDocument};
pub use credentials::{extract, extract_file, CertificateEntry, KeyContainer, KeyEntry};
pub use signer::{digest, sign, sign_digest};
pub use types::{
    ByteRange, CertificateChain, Credentials, PrivateKey, SignatureContainer, SignatureInfo,
    SignatureRequest, SIGNATURE_FILTER, SIGNATURE_PAGE, SIGNATURE_SUB_FILTER,
};
