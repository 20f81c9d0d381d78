pub mod extensions;
pub mod params;

use std::fmt;
use std::io::Write;

use const_oid::ObjectIdentifier;
use der::asn1::{AnyRef, BitString};
use der::{Any, Decode, Encode};
use extensions::{
    AuthorityInfoAccess, BasicConstraints, CrlDistributionPoint, ExtensionDescriptor, KeyUsage,
    KeyUsages,
};
use params::{ExtensionParam, IssuanceProfile, Validity};
use rand_core::CryptoRngCore;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::authority::CertificationAuthority;
use crate::csr::CertificateSigningRequest;
use crate::error::{CaError, Result};
use crate::issuer::{Issuer, NamedIssuer};
use crate::key::{self, KeyPair};
use crate::pem_utils;
use crate::subject::format_name;
use crate::tbs_certificate::{TbsCertificate, random_serial_number};

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption (PKCS#1 v1.5).
    Sha256WithRsa,
    /// SHA-384 with RSA encryption (PKCS#1 v1.5).
    Sha384WithRsa,
    /// SHA-512 with RSA encryption (PKCS#1 v1.5).
    Sha512WithRsa,
    /// ECDSA over P-256 with SHA-256.
    EcdsaWithSha256,
    /// Pure Ed25519.
    Ed25519,
}

impl SignatureAlgorithm {
    pub const fn oid(self) -> ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRsa => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha384WithRsa => const_oid::db::rfc5912::SHA_384_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha512WithRsa => const_oid::db::rfc5912::SHA_512_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::EcdsaWithSha256 => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Ed25519 => const_oid::db::rfc8410::ID_ED_25519,
        }
    }

    /// Looks up the algorithm for a signature OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Result<Self> {
        [
            SignatureAlgorithm::Sha256WithRsa,
            SignatureAlgorithm::Sha384WithRsa,
            SignatureAlgorithm::Sha512WithRsa,
            SignatureAlgorithm::EcdsaWithSha256,
            SignatureAlgorithm::Ed25519,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
        .ok_or_else(|| CaError::DecodingError(format!("unsupported signature algorithm {oid}")))
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignatureAlgorithm::Sha256WithRsa => "SHA256withRSA",
            SignatureAlgorithm::Sha384WithRsa => "SHA384withRSA",
            SignatureAlgorithm::Sha512WithRsa => "SHA512withRSA",
            SignatureAlgorithm::EcdsaWithSha256 => "SHA256withECDSA",
            SignatureAlgorithm::Ed25519 => "Ed25519",
        };
        f.write_str(name)
    }
}

impl From<SignatureAlgorithm> for AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA identifiers carry an explicit NULL parameter (RFC 4055); ECDSA and
    /// Ed25519 identifiers have none.
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRsa
            | SignatureAlgorithm::Sha384WithRsa
            | SignatureAlgorithm::Sha512WithRsa => Some(Any::from(AnyRef::NULL)),
            SignatureAlgorithm::EcdsaWithSha256 | SignatureAlgorithm::Ed25519 => None,
        };
        AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// The extension steps that follow the SAN copy during issuance.
///
/// CRL distribution point, then Authority Information Access, then the CA
/// markings when the profile asks for them.
pub fn issuance_extensions(profile: &IssuanceProfile, issuer_name: &Name) -> Vec<ExtensionDescriptor> {
    let mut descriptors = vec![
        ExtensionDescriptor::CrlDistributionPoint(CrlDistributionPoint {
            uri: profile.uris.crl.clone(),
            crl_issuer: issuer_name.clone(),
        }),
        ExtensionDescriptor::AuthorityInfoAccess(AuthorityInfoAccess {
            ca_issuers: profile.uris.ca_issuers.clone(),
            ocsp: profile.uris.ocsp.clone(),
        }),
    ];
    if let Some(constraints) = profile.ca_constraints {
        descriptors.push(ExtensionDescriptor::BasicConstraints(BasicConstraints {
            is_ca: true,
            max_path_length: constraints.path_len,
        }));
        descriptors.push(ExtensionDescriptor::KeyUsage(KeyUsage(
            KeyUsages::KeyCertSign | KeyUsages::CRLSign,
        )));
    }
    descriptors
}

/// Represents an X.509 certificate.
///
/// This struct provides methods to encode the certificate into DER or PEM formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    /// The inner representation of the certificate.
    pub inner: CertificateInner,
}

impl Certificate {
    /// Issues a certificate for `csr`, signed by `issuer_key` under `issuer_name`.
    ///
    /// Uses the default [`IssuanceProfile`]. For a self-signed certificate pass
    /// the request's own subject and key.
    pub fn generate(
        csr: &CertificateSigningRequest,
        issuer_name: &Name,
        issuer_key: &KeyPair,
        signature_algorithm: SignatureAlgorithm,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        let issuer = NamedIssuer {
            name: issuer_name.clone(),
            key: issuer_key,
        };
        Self::issue(
            csr,
            &issuer,
            signature_algorithm,
            &IssuanceProfile::default(),
            rng,
        )
    }

    /// Issues a certificate whose issuer name is the request's own subject.
    pub fn self_signed(
        csr: &CertificateSigningRequest,
        key: &KeyPair,
        signature_algorithm: SignatureAlgorithm,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        Self::generate(csr, csr.subject(), key, signature_algorithm, rng)
    }

    /// Issues a certificate for `csr` signed by an existing CA.
    ///
    /// The issuer name is the subject of the CA's signing request.
    pub fn generate_by(
        csr: &CertificateSigningRequest,
        authority: &CertificationAuthority,
        signature_algorithm: SignatureAlgorithm,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        Self::issue(
            csr,
            authority,
            signature_algorithm,
            &IssuanceProfile::default(),
            rng,
        )
    }

    /// Runs the issuance algorithm.
    ///
    /// The subject and public key come verbatim from `csr`. Extensions are
    /// applied in order: the SAN requested by `csr` (if any), then
    /// [`issuance_extensions`]. The TBS certificate is signed by the issuer's
    /// key with `signature_algorithm`.
    ///
    /// # Errors
    /// * [`CaError::SigningError`] if the issuer key cannot sign with `signature_algorithm`.
    /// * [`CaError::ExtensionError`] if an extension value cannot be encoded.
    pub fn issue<I: Issuer + ?Sized>(
        csr: &CertificateSigningRequest,
        issuer: &I,
        signature_algorithm: SignatureAlgorithm,
        profile: &IssuanceProfile,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Self> {
        let issuer_name = issuer.issuer_name();
        let serial = random_serial_number(rng);

        let mut tbs = TbsCertificate::new(
            serial.to_be_bytes().to_vec(),
            signature_algorithm,
            issuer_name.clone(),
            Validity::one_year_from_now(),
            csr.subject().clone(),
            csr.subject_public_key_info().clone(),
        );

        csr.add_san_extension(&mut tbs)?;
        for descriptor in issuance_extensions(profile, &issuer_name) {
            tbs.apply(&descriptor)?;
        }

        let tbs_certificate = tbs.to_tbs_certificate_inner()?;
        let signature = issuer
            .signing_key()
            .sign_data(&tbs_certificate.to_der()?, signature_algorithm)?;

        let certificate = Certificate {
            inner: CertificateInner {
                tbs_certificate,
                signature_algorithm: signature_algorithm.into(),
                signature: BitString::from_bytes(&signature)?,
            },
        };

        tracing::debug!(
            serial,
            subject = %format_name(csr.subject()),
            issuer = %format_name(&issuer_name),
            algorithm = %signature_algorithm,
            "issued certificate"
        );

        Ok(certificate)
    }

    pub fn issuer(&self) -> &Name {
        &self.inner.tbs_certificate.issuer
    }

    pub fn subject(&self) -> &Name {
        &self.inner.tbs_certificate.subject
    }

    /// Big-endian bytes of the serial number.
    pub fn serial_number(&self) -> &[u8] {
        self.inner.tbs_certificate.serial_number.as_bytes()
    }

    pub fn validity(&self) -> Validity {
        let validity = &self.inner.tbs_certificate.validity;
        Validity {
            not_before: crate::tbs_certificate::from_x509_time(&validity.not_before),
            not_after: crate::tbs_certificate::from_x509_time(&validity.not_after),
        }
    }

    /// Extensions in certificate order.
    pub fn extensions(&self) -> Vec<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from)
            .collect()
    }

    /// The first extension with `oid`.
    pub fn extension(&self, oid: ObjectIdentifier) -> Option<ExtensionParam> {
        self.inner
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == oid)
            .map(ExtensionParam::from)
    }

    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.tbs_certificate.subject_public_key_info
    }

    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid(&self.inner.signature_algorithm.oid)
    }

    /// Checks the certificate signature against the public half of `key`.
    pub fn verify_signed_by(&self, key: &KeyPair) -> Result<()> {
        let tbs = self.inner.tbs_certificate.to_der()?;
        let signature = self.inner.signature.as_bytes().ok_or_else(|| {
            CaError::SigningError("signature has unused bits".to_string())
        })?;
        key::verify_signature(&key.as_spki()?, self.signature_algorithm()?, &tbs, signature)
    }

    /// Encodes the certificate into DER format.
    ///
    /// # Returns
    /// A byte vector containing the DER-encoded certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertificateInner::from_der(der)?;
        Ok(Self { inner })
    }

    /// Encodes the certificate into PEM format.
    ///
    /// # Returns
    /// A string containing the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, CERTIFICATE_LABEL))
    }

    /// Writes the PEM encoding to `out` and flushes it.
    pub fn write_pem(&self, out: &mut impl Write) -> Result<()> {
        out.write_all(self.to_pem()?.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Reads the first PEM block of `input` as a certificate.
    ///
    /// # Errors
    /// * `FormatError("no objects left")` when `input` holds no PEM block.
    /// * `FormatError("not a Certificate")` when the block is something else.
    pub fn read_pem(input: &str) -> Result<Self> {
        let der = pem_utils::expect_block(input, &[CERTIFICATE_LABEL], "not a Certificate")?;
        Self::from_der(&der)
    }
}
