//! Credential extraction from PKCS#12 key containers.
//!
//! A container is a list of safe bags. Every shrouded key bag is a key
//! entry; certificate bags without a matching key are trust entries. The
//! first key entry in bag order is used for signing.

use super::types::{CertificateChain, Credentials, PrivateKey};
use crate::error::{Error, Result};
use p12::{PKCS12Attribute, SafeBag, SafeBagKind, PFX};
use std::path::Path;
use x509_parser::certificate::X509Certificate;

/// Upper bound on certificates followed when completing a chain.
const MAX_CHAIN_LENGTH: usize = 16;

/// One key entry of a container.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    /// Entry alias
    pub alias: String,
    /// `localKeyId` attribute, if present
    pub local_key_id: Option<Vec<u8>>,
    /// PKCS#8 DER of the decrypted key
    pub key: PrivateKey,
}

/// One certificate bag of a container.
#[derive(Debug, Clone)]
pub struct CertificateEntry {
    /// `friendlyName` attribute, if present
    pub friendly_name: Option<String>,
    /// `localKeyId` attribute, if present
    pub local_key_id: Option<Vec<u8>>,
    /// DER certificate
    pub der: Vec<u8>,
}

/// Decrypted contents of a PKCS#12 container.
#[derive(Debug, Clone, Default)]
pub struct KeyContainer {
    keys: Vec<KeyEntry>,
    certificates: Vec<CertificateEntry>,
}

impl KeyContainer {
    /// Open a container with `password`.
    ///
    /// Fails with [`Error::Authentication`] when the container is malformed
    /// or the password does not match its integrity MAC.
    pub fn open(data: &[u8], password: &str) -> Result<Self> {
        let pfx = PFX::parse(data)
            .map_err(|e| Error::Authentication(format!("malformed PKCS#12 data: {:?}", e)))?;

        if !pfx.verify_mac(password) {
            return Err(Error::Authentication("MAC verification failed, wrong password".to_string()));
        }

        let bags = pfx
            .bags(password)
            .map_err(|e| Error::Authentication(format!("cannot decrypt safe contents: {:?}", e)))?;
        let decrypted_keys = pfx
            .key_bags(password)
            .map_err(|e| Error::Authentication(format!("cannot decrypt key bags: {:?}", e)))?;

        let shrouded: Vec<&SafeBag> = bags
            .iter()
            .filter(|bag| matches!(bag.bag, SafeBagKind::Pkcs8ShroudedKeyBag(_)))
            .collect();
        if shrouded.len() != decrypted_keys.len() {
            return Err(Error::Authentication(format!(
                "decrypted {} of {} private keys",
                decrypted_keys.len(),
                shrouded.len()
            )));
        }

        let keys = shrouded
            .into_iter()
            .zip(decrypted_keys)
            .enumerate()
            .map(|(n, (bag, der))| {
                let local_key_id = local_key_id(bag);
                let alias = friendly_name(bag)
                    .or_else(|| local_key_id.as_deref().map(hex_lower))
                    .unwrap_or_else(|| format!("key-{}", n));
                KeyEntry {
                    alias,
                    local_key_id,
                    key: PrivateKey::from_pkcs8_der(der),
                }
            })
            .collect();

        let certificates = bags
            .iter()
            .filter_map(|bag| {
                bag.bag.get_x509_cert().map(|der| CertificateEntry {
                    friendly_name: friendly_name(bag),
                    local_key_id: local_key_id(bag),
                    der,
                })
            })
            .collect();

        Ok(Self { keys, certificates })
    }

    /// Key entries in container order.
    pub fn key_entries(&self) -> &[KeyEntry] {
        &self.keys
    }

    /// All certificates in container order.
    pub fn certificates(&self) -> &[CertificateEntry] {
        &self.certificates
    }

    /// Whether `alias` names a key entry.
    pub fn is_key_entry(&self, alias: &str) -> bool {
        self.keys.iter().any(|k| k.alias == alias)
    }

    /// Take the first key entry and its certificate chain.
    pub fn into_credentials(self) -> Result<Credentials> {
        if self.keys.len() > 1 {
            log::warn!(
                "Key container holds {} key entries, using the first ({})",
                self.keys.len(),
                self.keys[0].alias
            );
        }
        let entry = self.keys.first().ok_or(Error::NoKeyEntry)?;

        let leaf = self.find_leaf(entry).ok_or_else(|| {
            log::warn!("Key entry {} has no certificate", entry.alias);
            Error::NoKeyEntry
        })?;
        let chain = self.complete_chain(leaf);
        log::debug!("Selected key entry {} with {} certificates", entry.alias, chain.len());

        Ok(Credentials {
            alias: entry.alias.clone(),
            key: entry.key.clone(),
            chain,
        })
    }

    /// Certificate belonging to `entry`: same `localKeyId`, else same public
    /// key, else the only certificate that issues no other.
    fn find_leaf(&self, entry: &KeyEntry) -> Option<&CertificateEntry> {
        if let Some(id) = &entry.local_key_id {
            if let Some(cert) = self.certificates.iter().find(|c| c.local_key_id.as_ref() == Some(id)) {
                return Some(cert);
            }
        }

        if let Some(spki) = rsa_public_key_der(&entry.key) {
            let matching = self.certificates.iter().find(|c| {
                x509_parser::parse_x509_certificate(&c.der)
                    .map(|(_, cert)| cert.public_key().raw == spki.as_slice())
                    .unwrap_or(false)
            });
            if matching.is_some() {
                return matching;
            }
        }

        let parsed: Vec<_> = self
            .certificates
            .iter()
            .filter_map(|c| x509_parser::parse_x509_certificate(&c.der).ok().map(|(_, x)| (c, x)))
            .collect();
        parsed
            .iter()
            .find(|(_, cert)| {
                !parsed.iter().any(|(_, other)| {
                    other.issuer().as_raw() == cert.subject().as_raw() && !is_self_issued(other)
                })
            })
            .map(|(entry, _)| *entry)
    }

    /// Follow issuer links from `leaf` through the container's certificates.
    fn complete_chain(&self, leaf: &CertificateEntry) -> CertificateChain {
        let parsed: Vec<(&[u8], X509Certificate<'_>)> = self
            .certificates
            .iter()
            .filter_map(|c| {
                x509_parser::parse_x509_certificate(&c.der)
                    .ok()
                    .map(|(_, x)| (c.der.as_slice(), x))
            })
            .collect();

        let mut chain = vec![leaf.der.clone()];
        let mut current = parsed.iter().find(|(der, _)| *der == leaf.der.as_slice());

        while let Some((_, cert)) = current {
            if is_self_issued(cert) || chain.len() >= MAX_CHAIN_LENGTH {
                break;
            }
            current = parsed.iter().find(|(der, candidate)| {
                candidate.subject().as_raw() == cert.issuer().as_raw()
                    && !chain.iter().any(|c| c.as_slice() == *der)
            });
            if let Some((der, _)) = current {
                chain.push(der.to_vec());
            }
        }

        CertificateChain::new(chain)
    }
}

/// Open a container and take its first key entry.
pub fn extract(data: &[u8], password: &str) -> Result<Credentials> {
    KeyContainer::open(data, password)?.into_credentials()
}

/// Read a container from disk and take its first key entry.
pub fn extract_file(path: impl AsRef<Path>, password: &str) -> Result<Credentials> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    log::debug!("Read {} byte key container {}", data.len(), path.display());
    extract(&data, password)
}

fn friendly_name(bag: &SafeBag) -> Option<String> {
    bag.attributes.iter().find_map(|attr| match attr {
        PKCS12Attribute::FriendlyName(name) => Some(name.clone()),
        _ => None,
    })
}

fn local_key_id(bag: &SafeBag) -> Option<Vec<u8>> {
    bag.attributes.iter().find_map(|attr| match attr {
        PKCS12Attribute::LocalKeyId(id) => Some(id.clone()),
        _ => None,
    })
}

fn is_self_issued(cert: &X509Certificate<'_>) -> bool {
    cert.subject().as_raw() == cert.issuer().as_raw()
}

/// SubjectPublicKeyInfo DER of an RSA private key.
fn rsa_public_key_der(key: &PrivateKey) -> Option<Vec<u8>> {
    use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};

    let private = rsa::RsaPrivateKey::from_pkcs8_der(key.as_der()).ok()?;
    let document = private.to_public_key().to_public_key_der().ok()?;
    Some(document.as_bytes().to_vec())
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
