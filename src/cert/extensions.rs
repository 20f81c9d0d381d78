use std::net::IpAddr;

use const_oid::AssociatedOid;
use der::{
    Decode, Encode,
    asn1::{Ia5String, OctetString},
    oid::ObjectIdentifier,
};
use x509_cert::ext::pkix::crl::dp::DistributionPoint;
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName};
use x509_cert::ext::pkix::{AccessDescription, AuthorityInfoAccessSyntax, CrlDistributionPoints};
use x509_cert::name::Name;

pub use der::flagset::FlagSet;
use x509_cert::ext::pkix::KeyUsage as X509KeyUsage;
pub use x509_cert::ext::pkix::KeyUsages;

use super::params::ExtensionParam;
use crate::error::{CaError, Result};

/// Trait for converting to and from X.509 extensions.
///
/// This trait provides methods to encode and decode X.509 extension values.
///
/// # Example
/// ```
/// use certforge::cert::extensions::{SanEntry, SubjectAltName};
/// use certforge::cert::extensions::ToAndFromX509Extension;
/// let san = SubjectAltName { names: vec![SanEntry::Dns("example.com".to_string())] };
/// let encoded = san.to_x509_extension_value().unwrap();
/// let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
/// assert_eq!(san.names, decoded.names);
/// ```
pub trait ToAndFromX509Extension {
    /// The Object Identifier (OID) for the extension.
    const OID: ObjectIdentifier;

    /// Encodes the extension into a DER-encoded byte vector.
    fn to_x509_extension_value(&self) -> Result<Vec<u8>>;

    /// Decodes the extension from a DER-encoded byte slice.
    fn from_x509_extension_value(extension: &[u8]) -> Result<Self>
    where
        Self: Sized;
}

fn ia5(value: &str) -> Result<Ia5String> {
    Ia5String::new(value).map_err(|e| CaError::ExtensionError(format!("{value:?}: {e}")))
}

/// One identity in a Subject Alternative Name extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanEntry {
    Dns(String),
    Email(String),
    Uri(String),
    Ip(IpAddr),
}

impl SanEntry {
    fn to_general_name(&self) -> Result<GeneralName> {
        Ok(match self {
            SanEntry::Dns(name) => GeneralName::DnsName(ia5(name)?),
            SanEntry::Email(email) => GeneralName::Rfc822Name(ia5(email)?),
            SanEntry::Uri(uri) => GeneralName::UniformResourceIdentifier(ia5(uri)?),
            SanEntry::Ip(ip) => {
                let octets = match ip {
                    IpAddr::V4(v4) => v4.octets().to_vec(),
                    IpAddr::V6(v6) => v6.octets().to_vec(),
                };
                GeneralName::IpAddress(
                    OctetString::new(octets).map_err(|e| CaError::ExtensionError(e.to_string()))?,
                )
            }
        })
    }

    fn from_general_name(name: &GeneralName) -> Result<Self> {
        match name {
            GeneralName::DnsName(dns) => Ok(SanEntry::Dns(dns.to_string())),
            GeneralName::Rfc822Name(email) => Ok(SanEntry::Email(email.to_string())),
            GeneralName::UniformResourceIdentifier(uri) => Ok(SanEntry::Uri(uri.to_string())),
            GeneralName::IpAddress(octets) => match octets.as_bytes().len() {
                4 => {
                    let mut v4 = [0u8; 4];
                    v4.copy_from_slice(octets.as_bytes());
                    Ok(SanEntry::Ip(IpAddr::from(v4)))
                }
                16 => {
                    let mut v6 = [0u8; 16];
                    v6.copy_from_slice(octets.as_bytes());
                    Ok(SanEntry::Ip(IpAddr::from(v6)))
                }
                len => Err(CaError::DecodingError(format!(
                    "IP address SAN with {len} octets"
                ))),
            },
            _ => Err(CaError::DecodingError(
                "Unsupported general name type".to_string(),
            )),
        }
    }
}

/// Represents the Subject Alternative Name (SAN) extension.
///
/// This extension specifies additional identities for the subject of the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName {
    pub names: Vec<SanEntry>,
}

impl ToAndFromX509Extension for SubjectAltName {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::SubjectAltName::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let san = x509_cert::ext::pkix::SubjectAltName(
            self.names
                .iter()
                .map(SanEntry::to_general_name)
                .collect::<Result<Vec<_>>>()?,
        );

        Ok(san.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let san = x509_cert::ext::pkix::SubjectAltName::from_der(extension)?;
        let names = san
            .0
            .iter()
            .map(SanEntry::from_general_name)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { names })
    }
}

/// Represents the CRL Distribution Points extension with a single point.
///
/// # Fields
/// * `uri` - Where the CRL can be fetched.
/// * `crl_issuer` - Directory name of the CRL issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlDistributionPoint {
    pub uri: String,
    pub crl_issuer: Name,
}

impl ToAndFromX509Extension for CrlDistributionPoint {
    const OID: ObjectIdentifier = CrlDistributionPoints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let point = DistributionPoint {
            distribution_point: Some(DistributionPointName::FullName(vec![
                GeneralName::UniformResourceIdentifier(ia5(&self.uri)?),
            ])),
            reasons: None,
            crl_issuer: Some(vec![GeneralName::DirectoryName(self.crl_issuer.clone())]),
        };
        Ok(CrlDistributionPoints(vec![point]).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let points = CrlDistributionPoints::from_der(extension)?;
        let point = points
            .0
            .first()
            .ok_or_else(|| CaError::DecodingError("no distribution point".to_string()))?;

        let uri = match &point.distribution_point {
            Some(DistributionPointName::FullName(names)) => {
                names.iter().find_map(|name| match name {
                    GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
                    _ => None,
                })
            }
            _ => None,
        }
        .ok_or_else(|| CaError::DecodingError("distribution point has no URI".to_string()))?;

        let crl_issuer = point
            .crl_issuer
            .iter()
            .flatten()
            .find_map(|name| match name {
                GeneralName::DirectoryName(dn) => Some(dn.clone()),
                _ => None,
            })
            .ok_or_else(|| CaError::DecodingError("distribution point has no issuer".to_string()))?;

        Ok(Self { uri, crl_issuer })
    }
}

/// Represents the Authority Information Access extension.
///
/// # Fields
/// * `ca_issuers` - Where the issuing CA certificate can be fetched.
/// * `ocsp` - The OCSP responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityInfoAccess {
    pub ca_issuers: String,
    pub ocsp: String,
}

impl ToAndFromX509Extension for AuthorityInfoAccess {
    const OID: ObjectIdentifier = AuthorityInfoAccessSyntax::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let aia = AuthorityInfoAccessSyntax(vec![
            AccessDescription {
                access_method: const_oid::db::rfc5912::ID_AD_CA_ISSUERS,
                access_location: GeneralName::UniformResourceIdentifier(ia5(&self.ca_issuers)?),
            },
            AccessDescription {
                access_method: const_oid::db::rfc5912::ID_AD_OCSP,
                access_location: GeneralName::UniformResourceIdentifier(ia5(&self.ocsp)?),
            },
        ]);
        Ok(aia.to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let aia = AuthorityInfoAccessSyntax::from_der(extension)?;
        let location = |method: ObjectIdentifier| {
            aia.0
                .iter()
                .find(|desc| desc.access_method == method)
                .and_then(|desc| match &desc.access_location {
                    GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
                    _ => None,
                })
                .ok_or_else(|| CaError::DecodingError(format!("no access description for {method}")))
        };
        Ok(Self {
            ca_issuers: location(const_oid::db::rfc5912::ID_AD_CA_ISSUERS)?,
            ocsp: location(const_oid::db::rfc5912::ID_AD_OCSP)?,
        })
    }
}

/// Represents the Basic Constraints extension.
///
/// This extension indicates whether the certificate is a CA certificate and its path length.
///
/// # Fields
/// * `is_ca` - Indicates if the certificate is a CA.
/// * `max_path_length` - The maximum number of intermediate CAs allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub max_path_length: Option<u8>,
}

impl ToAndFromX509Extension for BasicConstraints {
    const OID: ObjectIdentifier = x509_cert::ext::pkix::BasicConstraints::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        let bc = x509_cert::ext::pkix::BasicConstraints {
            ca: self.is_ca,
            path_len_constraint: self.max_path_length,
        };

        Ok(bc.to_der()?)
    }

    fn from_x509_extension_value(der_bytes: &[u8]) -> Result<Self> {
        let bc = x509_cert::ext::pkix::BasicConstraints::from_der(der_bytes)?;
        Ok(Self {
            is_ca: bc.ca,
            max_path_length: bc.path_len_constraint,
        })
    }
}

/// Represents the Key Usage extension.
///
/// This extension defines the purpose of the key contained in the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(pub FlagSet<KeyUsages>);

impl ToAndFromX509Extension for KeyUsage {
    const OID: ObjectIdentifier = <X509KeyUsage as AssociatedOid>::OID;

    fn to_x509_extension_value(&self) -> Result<Vec<u8>> {
        Ok(X509KeyUsage(self.0).to_der()?)
    }

    fn from_x509_extension_value(extension: &[u8]) -> Result<Self> {
        let ku = X509KeyUsage::from_der(extension)?;
        Ok(Self(ku.0))
    }
}

/// One step of the extension sequence applied to a certificate being issued.
///
/// Descriptors are applied in list order, which is also the order the
/// extensions appear in the certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionDescriptor {
    /// A SAN extension copied verbatim from a signing request.
    SubjectAltName(ExtensionParam),
    CrlDistributionPoint(CrlDistributionPoint),
    AuthorityInfoAccess(AuthorityInfoAccess),
    BasicConstraints(BasicConstraints),
    KeyUsage(KeyUsage),
}

impl ExtensionDescriptor {
    /// Encodes the descriptor.
    ///
    /// CRL distribution point and AIA are non-critical; basic constraints and
    /// key usage are critical.
    pub fn to_param(&self) -> Result<ExtensionParam> {
        match self {
            ExtensionDescriptor::SubjectAltName(param) => Ok(param.clone()),
            ExtensionDescriptor::CrlDistributionPoint(ext) => {
                ExtensionParam::from_extension(ext, false)
            }
            ExtensionDescriptor::AuthorityInfoAccess(ext) => {
                ExtensionParam::from_extension(ext, false)
            }
            ExtensionDescriptor::BasicConstraints(ext) => ExtensionParam::from_extension(ext, true),
            ExtensionDescriptor::KeyUsage(ext) => ExtensionParam::from_extension(ext, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::parse_name;

    #[test]
    fn test_basic_constraints_encoding_decoding() {
        let original = BasicConstraints {
            is_ca: true,
            max_path_length: Some(3),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = BasicConstraints::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_key_usage_encoding_decoding() {
        let original = KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign);
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = KeyUsage::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_subject_alt_name_mixed_entries() {
        let original = SubjectAltName {
            names: vec![
                SanEntry::Dns("example.com".to_string()),
                SanEntry::Email("ops@example.com".to_string()),
                SanEntry::Uri("spiffe://example/ns/a".to_string()),
                SanEntry::Ip("6.6.6.6".parse().unwrap()),
                SanEntry::Ip("::1".parse().unwrap()),
            ],
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = SubjectAltName::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_non_ascii_dns_name_is_extension_error() {
        let san = SubjectAltName {
            names: vec![SanEntry::Dns("例子.中国".to_string())],
        };
        assert!(matches!(
            san.to_x509_extension_value(),
            Err(CaError::ExtensionError(_))
        ));
        assert!(matches!(
            ExtensionParam::from_extension(&san, false),
            Err(CaError::ExtensionError(_))
        ));
    }

    #[test]
    fn test_crl_distribution_point() {
        let original = CrlDistributionPoint {
            uri: "http://www.ca.com/crl".to_string(),
            crl_issuer: parse_name("CN=Issuer,O=Example").unwrap(),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let decoded = CrlDistributionPoint::from_x509_extension_value(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_authority_info_access_order() {
        let original = AuthorityInfoAccess {
            ca_issuers: "http://www.ca.com/root.crt".to_string(),
            ocsp: "http://ocsp.com/".to_string(),
        };
        let encoded = original.to_x509_extension_value().unwrap();
        let raw = AuthorityInfoAccessSyntax::from_der(&encoded).unwrap();
        assert_eq!(raw.0[0].access_method, const_oid::db::rfc5912::ID_AD_CA_ISSUERS);
        assert_eq!(raw.0[1].access_method, const_oid::db::rfc5912::ID_AD_OCSP);
        assert_eq!(
            AuthorityInfoAccess::from_x509_extension_value(&encoded).unwrap(),
            original
        );
    }

    #[test]
    fn test_descriptor_criticality() {
        let aia = ExtensionDescriptor::AuthorityInfoAccess(AuthorityInfoAccess {
            ca_issuers: "http://a/".to_string(),
            ocsp: "http://b/".to_string(),
        })
        .to_param()
        .unwrap();
        assert!(!aia.critical);
        assert_eq!(aia.oid, AuthorityInfoAccess::OID);

        let bc = ExtensionDescriptor::BasicConstraints(BasicConstraints {
            is_ca: true,
            max_path_length: Some(0),
        })
        .to_param()
        .unwrap();
        assert!(bc.critical);

        let passthrough = ExtensionParam {
            oid: SubjectAltName::OID,
            critical: true,
            value: vec![0x30, 0x00],
        };
        assert_eq!(
            ExtensionDescriptor::SubjectAltName(passthrough.clone())
                .to_param()
                .unwrap(),
            passthrough
        );
    }
}
