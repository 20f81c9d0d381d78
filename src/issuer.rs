use x509_cert::name::Name;

use crate::key::KeyPair;

/// Represents an entity capable of issuing certificates.
///
/// Issuance only needs the name written into the certificate's issuer field
/// and the key that signs it; see [`crate::cert::Certificate::issue`].
pub trait Issuer {
    /// Returns the distinguished name of the issuer.
    fn issuer_name(&self) -> Name;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> &KeyPair;
}

/// An issuer given as a bare name and key, e.g. for self-signing.
#[derive(Debug, Clone)]
pub struct NamedIssuer<'a> {
    pub name: Name,
    pub key: &'a KeyPair,
}

impl Issuer for NamedIssuer<'_> {
    fn issuer_name(&self) -> Name {
        self.name.clone()
    }

    fn signing_key(&self) -> &KeyPair {
        self.key
    }
}
