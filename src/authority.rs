use std::io::Write;

use rand_core::CryptoRngCore;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::csr::CertificateSigningRequest;
use crate::error::Result;
use crate::issuer::Issuer;
use crate::key::{KeyPair, PemEncryption};
use crate::subject::Subject;

/// A certificate authority: its key pair, the request it was built from and
/// the certificate issued for it.
///
/// As an [`Issuer`] the authority signs with its private key under the
/// subject of its own signing request.
#[derive(Debug, Clone)]
pub struct CertificationAuthority {
    name: String,
    key_pair: KeyPair,
    subject: Subject,
    csr: CertificateSigningRequest,
    certificate: Certificate,
}

impl CertificationAuthority {
    pub fn new(
        name: impl Into<String>,
        key_pair: KeyPair,
        subject: Subject,
        csr: CertificateSigningRequest,
        certificate: Certificate,
    ) -> Self {
        Self {
            name: name.into(),
            key_pair,
            subject,
            csr,
            certificate,
        }
    }

    /// Logical name, e.g. `ROOT`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn csr(&self) -> &CertificateSigningRequest {
        &self.csr
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The private key as PKCS#8 PEM, encrypted when `encryption` is given.
    pub fn key_pem(
        &self,
        encryption: Option<&PemEncryption>,
        rng: &mut impl CryptoRngCore,
    ) -> Result<String> {
        match encryption {
            Some(encryption) => self.key_pair.to_encrypted_pkcs8_pem(encryption, rng),
            None => self.key_pair.to_pkcs8_pem(),
        }
    }

    /// Writes [`Self::key_pem`] to `out`.
    pub fn write_key(
        &self,
        out: &mut impl Write,
        encryption: Option<&PemEncryption>,
        rng: &mut impl CryptoRngCore,
    ) -> Result<()> {
        out.write_all(self.key_pem(encryption, rng)?.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    pub fn write_csr(&self, out: &mut impl Write) -> Result<()> {
        self.csr.write_pem(out)
    }

    pub fn write_certificate(&self, out: &mut impl Write) -> Result<()> {
        self.certificate.write_pem(out)
    }
}

impl Issuer for CertificationAuthority {
    fn issuer_name(&self) -> Name {
        self.csr.subject().clone()
    }

    fn signing_key(&self) -> &KeyPair {
        &self.key_pair
    }
}
