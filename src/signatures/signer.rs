//! Digest and detached CMS signature creation.
//!
//! The byte range is hashed with SHA-256 and signed with RSA PKCS#1 v1.5.
//! The result is a CMS `SignedData` (RFC 5652) without encapsulated content,
//! carrying the content-type, message-digest and signing-time attributes and
//! the whole certificate chain.

use super::byterange::PreparedDocument;
use super::types::{ByteRange, CertificateChain, PrivateKey, SignatureContainer};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use cms::builder::{SignedDataBuilder, SignerInfoBuilder};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::signed_data::{EncapsulatedContentInfo, SignerIdentifier};
use const_oid::db::rfc5911::{ID_DATA, ID_SIGNING_TIME};
use const_oid::db::rfc5912::{ID_SHA_256, RSA_ENCRYPTION};
use der::asn1::{GeneralizedTime, SetOfVec, UtcTime};
use der::{Any, Decode, Encode};
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::pkcs8::DecodePrivateKey;
use sha2::{Digest, Sha256};
use spki::AlgorithmIdentifierOwned;
use std::time::Duration;
use x509_cert::attr::Attribute;
use x509_cert::time::Time;
use x509_cert::Certificate;

/// First year that has to be encoded as GeneralizedTime.
const UTC_TIME_END_YEAR: u16 = 2050;

/// SHA-256 over the two signed spans, in range order.
pub fn digest(data: &[u8], byte_range: &ByteRange) -> Result<[u8; 32]> {
    let [first, second] = byte_range.slices(data)?;
    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    Ok(hasher.finalize().into())
}

/// Hash the byte range of a prepared document and sign it.
///
/// Fails with [`Error::Signing`] for non-RSA keys and for containers larger
/// than the reserved placeholder.
pub fn sign(
    prepared: &PreparedDocument,
    byte_range: &ByteRange,
    key: &PrivateKey,
    chain: &CertificateChain,
    signing_time: DateTime<Utc>,
) -> Result<SignatureContainer> {
    let digest = digest(prepared.bytes(), byte_range)?;
    log::debug!("Byte range {} digest computed ({} bytes signed)", byte_range, byte_range.covered_len());

    let container = sign_digest(&digest, key, chain, signing_time)?;
    ensure_fits(&container, prepared.contents_capacity())?;
    Ok(container)
}

/// Fail with [`Error::Signing`] when `container` is larger than the
/// reserved placeholder.
pub fn ensure_fits(container: &SignatureContainer, capacity: usize) -> Result<()> {
    if container.len() > capacity {
        return Err(Error::Signing(format!(
            "signature container is {} bytes but only {} were reserved",
            container.len(),
            capacity
        )));
    }
    log::debug!("Signature container: {} of {} reserved bytes", container.len(), capacity);
    Ok(())
}

/// Build a detached signature container for a precomputed SHA-256 digest.
pub fn sign_digest(
    digest: &[u8],
    key: &PrivateKey,
    chain: &CertificateChain,
    signing_time: DateTime<Utc>,
) -> Result<SignatureContainer> {
    let signing_key = rsa_signing_key(key)?;

    let certificates = chain
        .iter()
        .map(Certificate::from_der)
        .collect::<der::Result<Vec<_>>>()
        .map_err(|e| Error::Signing(format!("unreadable certificate: {}", e)))?;
    let leaf = certificates
        .first()
        .ok_or_else(|| Error::Signing("certificate chain is empty".to_string()))?;

    let sid = SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
        issuer: leaf.tbs_certificate.issuer.clone(),
        serial_number: leaf.tbs_certificate.serial_number.clone(),
    });
    let digest_algorithm = AlgorithmIdentifierOwned {
        oid: ID_SHA_256,
        parameters: None,
    };
    let content = EncapsulatedContentInfo {
        econtent_type: ID_DATA,
        econtent: None,
    };

    let mut signer_info =
        SignerInfoBuilder::new(&signing_key, sid, digest_algorithm.clone(), &content, Some(digest))
            .map_err(cms_error)?;
    signer_info
        .add_signed_attribute(signing_time_attribute(signing_time)?)
        .map_err(cms_error)?;

    let mut builder = SignedDataBuilder::new(&content);
    builder.add_digest_algorithm(digest_algorithm).map_err(cms_error)?;
    for certificate in certificates.iter().cloned() {
        builder
            .add_certificate(CertificateChoices::Certificate(certificate))
            .map_err(cms_error)?;
    }
    let content_info = builder
        .add_signer_info::<SigningKey<Sha256>, Signature>(signer_info)
        .map_err(cms_error)?
        .build()
        .map_err(cms_error)?;

    let der = content_info
        .to_der()
        .map_err(|e| Error::Signing(format!("cannot encode signature container: {}", e)))?;
    Ok(SignatureContainer::new(der))
}

fn rsa_signing_key(key: &PrivateKey) -> Result<SigningKey<Sha256>> {
    let info = pkcs8::PrivateKeyInfo::try_from(key.as_der())
        .map_err(|e| Error::Signing(format!("unreadable private key: {}", e)))?;
    if info.algorithm.oid != RSA_ENCRYPTION {
        return Err(Error::Signing(format!(
            "key algorithm {} is not supported, sha256WithRSAEncryption needs an RSA key",
            info.algorithm.oid
        )));
    }
    let private = rsa::RsaPrivateKey::from_pkcs8_der(key.as_der())
        .map_err(|e| Error::Signing(format!("invalid RSA private key: {}", e)))?;
    Ok(SigningKey::<Sha256>::new(private))
}

/// PKCS#9 signing-time attribute, UTCTime before 2050.
fn signing_time_attribute(time: DateTime<Utc>) -> Result<Attribute> {
    let seconds = u64::try_from(time.timestamp())
        .map_err(|_| Error::Signing(format!("signing time {} predates 1970", time)))?;
    let date_time = der::DateTime::from_unix_duration(Duration::from_secs(seconds)).map_err(asn1_error)?;

    let value = if date_time.year() < UTC_TIME_END_YEAR {
        Time::UtcTime(UtcTime::from_date_time(date_time).map_err(asn1_error)?)
    } else {
        Time::GeneralTime(GeneralizedTime::from_date_time(date_time))
    };
    let value = Any::from_der(&value.to_der().map_err(asn1_error)?).map_err(asn1_error)?;
    let values = SetOfVec::try_from(vec![value]).map_err(asn1_error)?;

    Ok(Attribute {
        oid: ID_SIGNING_TIME,
        values,
    })
}

fn cms_error(e: cms::builder::Error) -> Error {
    Error::Signing(format!("CMS construction failed: {:?}", e))
}

fn asn1_error(e: der::Error) -> Error {
    Error::Signing(format!("ASN.1 encoding failed: {}", e))
}
