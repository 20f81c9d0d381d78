use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::OctetString;
use time::{Month, OffsetDateTime};

use super::extensions::ToAndFromX509Extension;
use crate::error::{CaError, Result};

/// Default CRL distribution point.
pub const DEFAULT_CRL_URI: &str = "http://www.ca.com/crl";
/// Default location of the issuing CA certificate.
pub const DEFAULT_CA_ISSUERS_URI: &str = "http://www.ca.com/root.crt";
/// Default OCSP responder.
pub const DEFAULT_OCSP_URI: &str = "http://ocsp.com/";

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// One calendar year starting now, truncated to whole seconds.
    pub fn one_year_from_now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self::one_year_from(now.replace_nanosecond(0).unwrap_or(now))
    }

    /// One calendar year starting at `not_before`.
    ///
    /// February 29 maps to February 28 of the following year.
    pub fn one_year_from(not_before: OffsetDateTime) -> Self {
        Self {
            not_before,
            not_after: add_years(not_before, 1),
        }
    }
}

/// Adds calendar years, clamping February 29 to February 28.
pub fn add_years(at: OffsetDateTime, years: i32) -> OffsetDateTime {
    let year = at.year() + years;
    match at.replace_year(year) {
        Ok(shifted) => shifted,
        Err(_) if at.month() == Month::February && at.day() == 29 => at
            .replace_day(28)
            .and_then(|day| day.replace_year(year))
            .unwrap_or(at),
        Err(_) => at,
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Errors
    /// [`CaError::ExtensionError`] if the value cannot be encoded.
    pub fn from_extension<E: ToAndFromX509Extension>(extension: &E, critical: bool) -> Result<Self> {
        let value = extension
            .to_x509_extension_value()
            .map_err(|e| CaError::ExtensionError(format!("{}: {e}", E::OID)))?;
        Ok(Self {
            oid: E::OID,
            critical,
            value,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E> {
        E::from_x509_extension_value(&self.value)
    }

    /// Wraps the parameter as an `x509_cert` extension.
    pub fn to_x509_extension(&self) -> Result<x509_cert::ext::Extension> {
        Ok(x509_cert::ext::Extension {
            extn_id: self.oid,
            critical: self.critical,
            extn_value: OctetString::new(self.value.clone())
                .map_err(|e| CaError::ExtensionError(e.to_string()))?,
        })
    }
}

impl From<&x509_cert::ext::Extension> for ExtensionParam {
    fn from(ext: &x509_cert::ext::Extension) -> Self {
        Self {
            oid: ext.extn_id,
            critical: ext.critical,
            value: ext.extn_value.as_bytes().to_vec(),
        }
    }
}

/// URIs written into the CRL distribution point and Authority Information
/// Access extensions of every issued certificate.
#[derive(Clone, Debug, PartialEq, Eq, Builder)]
pub struct DistributionUris {
    #[builder(into, default = DEFAULT_CRL_URI.to_string())]
    pub crl: String,
    #[builder(into, default = DEFAULT_CA_ISSUERS_URI.to_string())]
    pub ca_issuers: String,
    #[builder(into, default = DEFAULT_OCSP_URI.to_string())]
    pub ocsp: String,
}

impl Default for DistributionUris {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Marks an issued certificate as a CA.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CaConstraints {
    /// Maximum number of intermediate CAs below the certificate.
    pub path_len: Option<u8>,
}

/// Knobs of the issuance algorithm that are not part of the request.
///
/// The default profile adds no basic-constraints or key-usage extension.
#[derive(Clone, Debug, PartialEq, Eq, Default, Builder)]
pub struct IssuanceProfile {
    #[builder(default)]
    pub uris: DistributionUris,
    /// When set, issued certificates carry critical `basicConstraints`
    /// (CA:TRUE) and `keyUsage` (keyCertSign, cRLSign).
    pub ca_constraints: Option<CaConstraints>,
}
