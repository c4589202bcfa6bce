// Allow some clippy lints that are too pedantic for this project
#![allow(clippy::enum_variant_names)]
#![allow(clippy::manual_find)]
// Allow unused for tests
#![cfg_attr(test, allow(dead_code))]

//! # PDF Autograph
//!
//! Visible digital signatures for existing PDF documents.
//!
//! A run takes a PKCS#12 key container, its password and a PDF, and writes
//! a new signed copy of the document to a fresh temporary file:
//!
//! - **Detached CMS signature**: SHA-256 with RSA PKCS#1 v1.5, full
//!   certificate chain, `adbe.pkcs7.detached` (ISO 32000-1 §12.8)
//! - **Visible appearance**: a box of text on page 1, bound to the same
//!   signature field
//! - **Incremental update**: the original bytes are kept verbatim and the
//!   new revision is appended after them
//!
//! ## Architecture
//!
//! - **Reading**: nom lexer/parser, classic and stream cross-references,
//!   object streams ([`document::SourceDocument`])
//! - **Writing**: object serializer and incremental update writer
//!   ([`writer`])
//! - **Signing**: credential extraction, field reservation, appearance,
//!   CMS signing and the assembler state machine ([`signatures`])
//!
//! ## Quick Start
//!
//! ```ignore
//! use pdf_autograph::{sign_document, Rect, SignatureRequest, SignerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let request = SignatureRequest::new(
//!     "Signature1",
//!     "Signed by Test Signer",
//!     Rect::from_ints(36, 36, 200, 60),
//!     "document.pdf",
//!     "signer.p12",
//!     "secret",
//! );
//! let output = sign_document(&request, &SignerConfig::default())?;
//! println!("{}", output.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//! * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Core PDF parsing
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Stream decoders
pub mod decoders;

// Geometry
pub mod geometry;

// PDF writing
pub mod writer;

// Digital signatures
pub mod signatures;

// Configuration
pub mod config;

// Re-exports
pub use config::SignerConfig;
pub use document::SourceDocument;
pub use error::{Error, ErrorKind, Result};
pub use geometry::Rect;
pub use signatures::{sign_document, SignatureRequest};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
