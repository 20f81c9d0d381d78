use std::time::SystemTime;

use der::asn1::{GeneralizedTime, UtcTime};
use rand_core::CryptoRngCore;
use time::OffsetDateTime;
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Time;

use crate::cert::SignatureAlgorithm;
use crate::cert::extensions::ExtensionDescriptor;
use crate::cert::params::{ExtensionParam, Validity};
use crate::error::{CaError, Result};

/// Represents the "To Be Signed" (TBS) portion of an X.509 certificate.
///
/// This is the assembly value of the issuance algorithm: extensions are
/// appended in the order they are applied and keep that order in the
/// encoded certificate.
///
/// # Fields
/// * `serial_number` - Big-endian magnitude of the (non-negative) serial number.
/// * `signature_algorithm` - The algorithm used to sign the certificate.
/// * `issuer` - The distinguished name of the certificate issuer.
/// * `validity` - The certificate's validity period.
/// * `subject` - The distinguished name of the certificate subject.
/// * `subject_public_key_info` - The public key of the certificate subject.
/// * `extensions` - X.509 extensions in insertion order.
#[derive(Debug, Clone)]
pub struct TbsCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: SignatureAlgorithm,
    pub issuer: Name,
    pub validity: Validity,
    pub subject: Name,
    pub subject_public_key_info: SubjectPublicKeyInfoOwned,
    pub extensions: Vec<ExtensionParam>,
}

impl TbsCertificate {
    /// Creates a `TbsCertificate` without extensions.
    pub fn new(
        serial_number: Vec<u8>,
        signature_algorithm: SignatureAlgorithm,
        issuer: Name,
        validity: Validity,
        subject: Name,
        subject_public_key_info: SubjectPublicKeyInfoOwned,
    ) -> Self {
        Self {
            serial_number,
            signature_algorithm,
            issuer,
            validity,
            subject,
            subject_public_key_info,
            extensions: Vec::new(),
        }
    }

    /// Appends an already encoded extension.
    pub fn add_extension(&mut self, extension: ExtensionParam) {
        self.extensions.push(extension);
    }

    /// Encodes `descriptor` and appends it.
    pub fn apply(&mut self, descriptor: &ExtensionDescriptor) -> Result<()> {
        self.add_extension(descriptor.to_param()?);
        Ok(())
    }

    /// Converts the `TbsCertificate` into a `TbsCertificateInner` for DER encoding.
    pub fn to_tbs_certificate_inner(&self) -> Result<TbsCertificateInner> {
        let extensions = self
            .extensions
            .iter()
            .map(ExtensionParam::to_x509_extension)
            .collect::<Result<Vec<_>>>()?;

        let validity = x509_cert::time::Validity {
            not_before: to_x509_time(self.validity.not_before)?,
            not_after: to_x509_time(self.validity.not_after)?,
        };

        let serial_number = SerialNumber::new(self.serial_number.as_slice())
            .map_err(|e| CaError::EncodingError(format!("serial number: {e}")))?;

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: self.signature_algorithm.into(),
            issuer: self.issuer.clone(),
            validity,
            subject: self.subject.clone(),
            subject_public_key_info: self.subject_public_key_info.clone(),
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: (!extensions.is_empty()).then_some(extensions),
        })
    }

    /// Creates a `TbsCertificate` from a `TbsCertificateInner`.
    pub fn from_tbs_certificate_inner(inner: &TbsCertificateInner) -> Result<Self> {
        let signature_algorithm = SignatureAlgorithm::from_oid(&inner.signature.oid)?;

        let extensions = inner
            .extensions
            .iter()
            .flatten()
            .map(ExtensionParam::from)
            .collect();

        Ok(Self {
            serial_number: inner.serial_number.as_bytes().to_vec(),
            signature_algorithm,
            issuer: inner.issuer.clone(),
            validity: Validity {
                not_before: from_x509_time(&inner.validity.not_before),
                not_after: from_x509_time(&inner.validity.not_after),
            },
            subject: inner.subject.clone(),
            subject_public_key_info: inner.subject_public_key_info.clone(),
            extensions,
        })
    }
}

/// Draws a serial number from `rng`.
///
/// 64 random bits with the sign bit cleared, so the DER INTEGER is always
/// positive; zero is redrawn.
pub fn random_serial_number(rng: &mut impl CryptoRngCore) -> u64 {
    loop {
        let serial = rng.next_u64() & (i64::MAX as u64);
        if serial != 0 {
            return serial;
        }
    }
}

/// UTCTime through 2049, GeneralizedTime from 2050 on (RFC 5280 4.1.2.5).
pub fn to_x509_time(at: OffsetDateTime) -> Result<Time> {
    let system_time = SystemTime::from(at);
    let time = if at.year() < 2050 {
        Time::UtcTime(
            UtcTime::from_system_time(system_time)
                .map_err(|e| CaError::EncodingError(e.to_string()))?,
        )
    } else {
        Time::GeneralTime(
            GeneralizedTime::from_system_time(system_time)
                .map_err(|e| CaError::EncodingError(e.to_string()))?,
        )
    };
    Ok(time)
}

pub fn from_x509_time(time: &Time) -> OffsetDateTime {
    match time {
        Time::UtcTime(ut) => OffsetDateTime::from(ut.to_system_time()),
        Time::GeneralTime(gt) => OffsetDateTime::from(gt.to_system_time()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeyPair;
    use crate::subject::parse_name;
    use rand_chacha::ChaCha20Rng;
    use rand_core::{RngCore, SeedableRng};
    use time::macros::datetime;

    struct HighBitRng(ChaCha20Rng);

    impl RngCore for HighBitRng {
        fn next_u32(&mut self) -> u32 {
            self.0.next_u32() | 0x8000_0000
        }
        fn next_u64(&mut self) -> u64 {
            self.0.next_u64() | 0x8000_0000_0000_0000
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            self.0.fill_bytes(dest)
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
            self.0.try_fill_bytes(dest)
        }
    }

    impl rand_core::CryptoRng for HighBitRng {}

    #[test]
    fn test_serial_number_is_never_negative() {
        let mut rng = HighBitRng(ChaCha20Rng::seed_from_u64(1));
        for _ in 0..32 {
            let serial = random_serial_number(&mut rng);
            assert!(serial > 0);
            assert!(serial <= i64::MAX as u64);

            let encoded: SerialNumber = SerialNumber::new(&serial.to_be_bytes()).unwrap();
            // A positive INTEGER never has the top bit of its first octet set.
            assert_eq!(encoded.as_bytes()[0] & 0x80, 0);
        }
    }

    #[test]
    fn test_time_encoding_switches_at_2050() {
        assert!(matches!(
            to_x509_time(datetime!(2049-12-31 23:59:59 UTC)).unwrap(),
            Time::UtcTime(_)
        ));
        let late = datetime!(2050-01-01 00:00:00 UTC);
        let encoded = to_x509_time(late).unwrap();
        assert!(matches!(encoded, Time::GeneralTime(_)));
        assert_eq!(from_x509_time(&encoded), late);
    }

    #[test]
    fn test_inner_roundtrip_keeps_extension_order() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let key = KeyPair::generate_ed25519(&mut rng);
        let name = parse_name("CN=example,O=Example").unwrap();
        let mut tbs = TbsCertificate::new(
            random_serial_number(&mut rng).to_be_bytes().to_vec(),
            SignatureAlgorithm::Ed25519,
            name.clone(),
            Validity::one_year_from(datetime!(2024-05-01 10:00:00 UTC)),
            name,
            key.as_spki().unwrap(),
        );
        for oid in ["2.5.29.31", "1.3.6.1.5.5.7.1.1"] {
            tbs.add_extension(ExtensionParam {
                oid: const_oid::ObjectIdentifier::new_unwrap(oid),
                critical: false,
                value: vec![0x30, 0x00],
            });
        }

        let inner = tbs.to_tbs_certificate_inner().unwrap();
        let back = TbsCertificate::from_tbs_certificate_inner(&inner).unwrap();
        assert_eq!(back.extensions, tbs.extensions);
        assert_eq!(back.validity, tbs.validity);
        assert_eq!(back.signature_algorithm, SignatureAlgorithm::Ed25519);
    }

    #[test]
    fn test_no_extensions_are_omitted() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let key = KeyPair::generate_ed25519(&mut rng);
        let name = parse_name("CN=example,O=Example").unwrap();
        let tbs = TbsCertificate::new(
            vec![1],
            SignatureAlgorithm::Ed25519,
            name.clone(),
            Validity::one_year_from_now(),
            name,
            key.as_spki().unwrap(),
        );
        assert!(tbs.to_tbs_certificate_inner().unwrap().extensions.is_none());
    }
}
