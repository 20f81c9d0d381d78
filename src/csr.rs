//! PKCS#10 certificate signing requests.

use std::io::Write;

use const_oid::AssociatedOid;
use der::asn1::{BitString, SetOfVec};
use der::{Any, Decode, Encode};
use x509_cert::attr::Attribute;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, ExtensionReq, Version};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::{
    ExtensionDescriptor, SanEntry, SubjectAltName, ToAndFromX509Extension,
};
use crate::cert::params::ExtensionParam;
use crate::error::{CaError, Result};
use crate::key::{self, KeyPair};
use crate::pem_utils;
use crate::subject::{Subject, format_name};
use crate::tbs_certificate::TbsCertificate;

/// PEM label written for signing requests.
pub const CSR_LABEL: &str = "CERTIFICATE REQUEST";
/// Older label still produced by some tools; accepted on read.
pub const LEGACY_CSR_LABEL: &str = "NEW CERTIFICATE REQUEST";

/// A signed PKCS#10 certificate signing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSigningRequest {
    inner: CertReq,
}

impl CertificateSigningRequest {
    /// Builds and signs a request for `subject` with `key_pair`.
    ///
    /// A non-empty `san_names` adds an extensionRequest attribute holding one
    /// non-critical Subject Alternative Name extension.
    ///
    /// # Errors
    /// * [`CaError::ValidationError`] if `subject` lacks a common name or organization.
    /// * [`CaError::ExtensionError`] if a SAN entry cannot be encoded.
    /// * [`CaError::SigningError`] if `key_pair` cannot sign with `signature_algorithm`.
    pub fn generate(
        key_pair: &KeyPair,
        subject: &Subject,
        san_names: &[SanEntry],
        signature_algorithm: SignatureAlgorithm,
    ) -> Result<Self> {
        let mut attributes = Vec::new();
        if !san_names.is_empty() {
            let san = SubjectAltName {
                names: san_names.to_vec(),
            };
            let extension = ExtensionParam::from_extension(&san, false)?.to_x509_extension()?;
            attributes.push(extension_request(vec![extension])?);
        }

        let info = CertReqInfo {
            version: Version::V1,
            subject: subject.to_name()?,
            public_key: key_pair.as_spki()?,
            attributes: SetOfVec::try_from(attributes)?,
        };

        let signature = key_pair.sign_data(&info.to_der()?, signature_algorithm)?;
        let inner = CertReq {
            info,
            algorithm: signature_algorithm.into(),
            signature: BitString::from_bytes(&signature)?,
        };

        tracing::debug!(
            subject = %format_name(&inner.info.subject),
            san = san_names.len(),
            algorithm = %signature_algorithm,
            "generated certificate signing request"
        );
        Ok(Self { inner })
    }

    pub fn subject(&self) -> &Name {
        &self.inner.info.subject
    }

    pub fn subject_public_key_info(&self) -> &SubjectPublicKeyInfoOwned {
        &self.inner.info.public_key
    }

    /// Extensions carried in extensionRequest attributes, in request order.
    pub fn requested_extensions(&self) -> Result<Vec<ExtensionParam>> {
        let mut extensions = Vec::new();
        for attribute in self.inner.info.attributes.iter() {
            if attribute.oid != ExtensionReq::OID {
                continue;
            }
            for value in attribute.values.iter() {
                let request = ExtensionReq::from_der(&value.to_der()?)?;
                extensions.extend(request.0.iter().map(ExtensionParam::from));
            }
        }
        Ok(extensions)
    }

    /// The requested Subject Alternative Name extension, as encoded in the request.
    pub fn requested_subject_alt_name(&self) -> Result<Option<ExtensionParam>> {
        Ok(self
            .requested_extensions()?
            .into_iter()
            .find(|ext| ext.oid == SubjectAltName::OID))
    }

    /// Copies the requested SAN extension onto `tbs` unchanged.
    ///
    /// Criticality and encoded value are kept byte for byte. Does nothing when
    /// the request asks for no SAN.
    pub fn add_san_extension(&self, tbs: &mut TbsCertificate) -> Result<()> {
        if let Some(san) = self.requested_subject_alt_name()? {
            tbs.apply(&ExtensionDescriptor::SubjectAltName(san))?;
        }
        Ok(())
    }

    /// Checks the request's signature against its own public key.
    pub fn verify(&self) -> Result<()> {
        let algorithm = SignatureAlgorithm::from_oid(&self.inner.algorithm.oid)?;
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or_else(|| CaError::SigningError("signature has unused bits".to_string()))?;
        key::verify_signature(
            &self.inner.info.public_key,
            algorithm,
            &self.inner.info.to_der()?,
            signature,
        )
    }

    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.inner
            .to_der()
            .map_err(|e| CaError::EncodingError(e.to_string()))
    }

    pub fn from_der(der: &[u8]) -> Result<Self> {
        let inner = CertReq::from_der(der)?;
        Ok(Self { inner })
    }

    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, CSR_LABEL))
    }

    /// Writes the PEM encoding to `out` and flushes it.
    pub fn write_pem(&self, out: &mut impl Write) -> Result<()> {
        out.write_all(self.to_pem()?.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Reads the first PEM block of `input` as a signing request.
    ///
    /// # Errors
    /// * `FormatError("no objects left")` when `input` holds no PEM block.
    /// * `FormatError("not a Certificate Signing Request")` for any other block.
    pub fn read_pem(input: &str) -> Result<Self> {
        let der = pem_utils::expect_block(
            input,
            &[CSR_LABEL, LEGACY_CSR_LABEL],
            "not a Certificate Signing Request",
        )?;
        Self::from_der(&der)
    }
}

fn extension_request(extensions: Vec<Extension>) -> Result<Attribute> {
    let value = Any::from_der(&ExtensionReq(extensions).to_der()?)?;
    Ok(Attribute {
        oid: ExtensionReq::OID,
        values: SetOfVec::try_from(vec![value])?,
    })
}
