//! Validated distinguished-name subjects.
//!
//! A [`Subject`] holds the optional attributes of a certificate subject and
//! converts to and from an X.509 [`Name`]. Attribute order is preserved as
//! built: [`format_name`] and [`parse_name`] read and write the
//! comma-separated `TYPE=value` form in RDN order rather than the reversed
//! RFC 4514 order.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use bon::bon;
use const_oid::ObjectIdentifier;
use der::{Tag, Tagged};
use der::asn1::{
    Any, Ia5StringRef, PrintableStringRef, SetOfVec, TeletexStringRef, Utf8StringRef,
};
use regex::Regex;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use crate::error::{CaError, Result};

static LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S.{0,63}$").expect("valid line pattern"));
static SERIAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S{1,64}$").expect("valid serial pattern"));
static COUNTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid country pattern"));

/// RDN order written by [`Subject::to_name`], with the required flag.
const NAME_ORDER: [(Attribute, bool); 9] = [
    (Attribute::CommonName, true),
    (Attribute::Country, false),
    (Attribute::Locality, false),
    (Attribute::State, false),
    (Attribute::Street, false),
    (Attribute::Organization, true),
    (Attribute::OrganizationalUnit, false),
    (Attribute::Title, false),
    (Attribute::Description, false),
];

/// Name attributes a [`Subject`] understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    CommonName,
    SerialNumber,
    Country,
    Locality,
    State,
    Street,
    Organization,
    OrganizationalUnit,
    Title,
    Description,
}

impl Attribute {
    const ALL: [Attribute; 10] = [
        Attribute::CommonName,
        Attribute::SerialNumber,
        Attribute::Country,
        Attribute::Locality,
        Attribute::State,
        Attribute::Street,
        Attribute::Organization,
        Attribute::OrganizationalUnit,
        Attribute::Title,
        Attribute::Description,
    ];

    /// X.520 attribute type.
    pub const fn oid(self) -> ObjectIdentifier {
        match self {
            Attribute::CommonName => ObjectIdentifier::new_unwrap("2.5.4.3"),
            Attribute::SerialNumber => ObjectIdentifier::new_unwrap("2.5.4.5"),
            Attribute::Country => ObjectIdentifier::new_unwrap("2.5.4.6"),
            Attribute::Locality => ObjectIdentifier::new_unwrap("2.5.4.7"),
            Attribute::State => ObjectIdentifier::new_unwrap("2.5.4.8"),
            Attribute::Street => ObjectIdentifier::new_unwrap("2.5.4.9"),
            Attribute::Organization => ObjectIdentifier::new_unwrap("2.5.4.10"),
            Attribute::OrganizationalUnit => ObjectIdentifier::new_unwrap("2.5.4.11"),
            Attribute::Title => ObjectIdentifier::new_unwrap("2.5.4.12"),
            Attribute::Description => ObjectIdentifier::new_unwrap("2.5.4.13"),
        }
    }

    /// Short label used in name strings.
    pub const fn label(self) -> &'static str {
        match self {
            Attribute::CommonName => "CN",
            Attribute::SerialNumber => "SERIALNUMBER",
            Attribute::Country => "C",
            Attribute::Locality => "L",
            Attribute::State => "ST",
            Attribute::Street => "STREET",
            Attribute::Organization => "O",
            Attribute::OrganizationalUnit => "OU",
            Attribute::Title => "T",
            Attribute::Description => "DESCRIPTION",
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        Self::ALL.into_iter().find(|attr| attr.oid() == *oid)
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| attr.label().eq_ignore_ascii_case(label))
    }

    fn pattern(self) -> Option<&'static Regex> {
        match self {
            Attribute::SerialNumber => Some(&*SERIAL),
            Attribute::Country => Some(&*COUNTRY),
            Attribute::Title | Attribute::Description => None,
            _ => Some(&*LINE),
        }
    }

    // C and SERIALNUMBER are PrintableString in X.520; everything else goes out as UTF8String.
    fn prefers_printable(self) -> bool {
        matches!(self, Attribute::Country | Attribute::SerialNumber)
    }
}

/// Distinguished name of a certificate subject.
///
/// Every field is optional. Setters validate eagerly and treat blank values
/// as unset. Common name and organization are only required when the subject
/// is converted with [`Subject::to_name`].
///
/// ```
/// use certforge::subject::Subject;
///
/// # fn main() -> Result<(), certforge::error::CaError> {
/// let subject = Subject::builder()
///     .common_name("云屹根证书-ROOT")
///     .country_code("CN")
///     .locality("普陀区")
///     .state("上海市")
///     .organization("上海云屹信息技术有限公司")
///     .organizational_unit("ROOT")
///     .build()?;
///
/// assert_eq!(
///     subject.to_name_string()?,
///     "CN=云屹根证书-ROOT,C=CN,L=普陀区,ST=上海市,O=上海云屹信息技术有限公司,OU=ROOT"
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    common_name: Option<String>,
    serial_number: Option<String>,
    country_code: Option<String>,
    locality: Option<String>,
    state: Option<String>,
    street: Option<String>,
    organization: Option<String>,
    organizational_unit: Option<String>,
    title: Option<String>,
    description: Option<String>,
}

#[bon]
impl Subject {
    /// Builds a subject, running every field through its validating setter.
    #[builder]
    pub fn new(
        #[builder(into)] common_name: Option<String>,
        #[builder(into)] serial_number: Option<String>,
        #[builder(into)] country_code: Option<String>,
        #[builder(into)] locality: Option<String>,
        #[builder(into)] state: Option<String>,
        #[builder(into)] street: Option<String>,
        #[builder(into)] organization: Option<String>,
        #[builder(into)] organizational_unit: Option<String>,
        #[builder(into)] title: Option<String>,
        #[builder(into)] description: Option<String>,
    ) -> Result<Self> {
        let fields = [
            (Attribute::CommonName, common_name),
            (Attribute::SerialNumber, serial_number),
            (Attribute::Country, country_code),
            (Attribute::Locality, locality),
            (Attribute::State, state),
            (Attribute::Street, street),
            (Attribute::Organization, organization),
            (Attribute::OrganizationalUnit, organizational_unit),
            (Attribute::Title, title),
            (Attribute::Description, description),
        ];

        let mut subject = Subject::default();
        for (attribute, value) in fields {
            if let Some(value) = value {
                subject.set(attribute, value)?;
            }
        }
        Ok(subject)
    }
}

impl Subject {
    /// Sets `attribute` after validating `value` against its constraint.
    pub fn set(&mut self, attribute: Attribute, value: impl Into<String>) -> Result<()> {
        let value = checked(attribute, value.into())?;
        *self.slot(attribute) = value;
        Ok(())
    }

    /// Returns the value of `attribute`, if set.
    pub fn get(&self, attribute: Attribute) -> Option<&str> {
        let value = match attribute {
            Attribute::CommonName => &self.common_name,
            Attribute::SerialNumber => &self.serial_number,
            Attribute::Country => &self.country_code,
            Attribute::Locality => &self.locality,
            Attribute::State => &self.state,
            Attribute::Street => &self.street,
            Attribute::Organization => &self.organization,
            Attribute::OrganizationalUnit => &self.organizational_unit,
            Attribute::Title => &self.title,
            Attribute::Description => &self.description,
        };
        value.as_deref()
    }

    fn slot(&mut self, attribute: Attribute) -> &mut Option<String> {
        match attribute {
            Attribute::CommonName => &mut self.common_name,
            Attribute::SerialNumber => &mut self.serial_number,
            Attribute::Country => &mut self.country_code,
            Attribute::Locality => &mut self.locality,
            Attribute::State => &mut self.state,
            Attribute::Street => &mut self.street,
            Attribute::Organization => &mut self.organization,
            Attribute::OrganizationalUnit => &mut self.organizational_unit,
            Attribute::Title => &mut self.title,
            Attribute::Description => &mut self.description,
        }
    }

    pub fn set_common_name(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::CommonName, value)
    }

    pub fn set_serial_number(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::SerialNumber, value)
    }

    pub fn set_country_code(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::Country, value)
    }

    pub fn set_locality(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::Locality, value)
    }

    pub fn set_state(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::State, value)
    }

    pub fn set_street(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::Street, value)
    }

    pub fn set_organization(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::Organization, value)
    }

    pub fn set_organizational_unit(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::OrganizationalUnit, value)
    }

    pub fn set_title(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::Title, value)
    }

    pub fn set_description(&mut self, value: impl Into<String>) -> Result<()> {
        self.set(Attribute::Description, value)
    }

    pub fn common_name(&self) -> Option<&str> {
        self.get(Attribute::CommonName)
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.get(Attribute::SerialNumber)
    }

    pub fn country_code(&self) -> Option<&str> {
        self.get(Attribute::Country)
    }

    pub fn locality(&self) -> Option<&str> {
        self.get(Attribute::Locality)
    }

    pub fn state(&self) -> Option<&str> {
        self.get(Attribute::State)
    }

    pub fn street(&self) -> Option<&str> {
        self.get(Attribute::Street)
    }

    pub fn organization(&self) -> Option<&str> {
        self.get(Attribute::Organization)
    }

    pub fn organizational_unit(&self) -> Option<&str> {
        self.get(Attribute::OrganizationalUnit)
    }

    pub fn title(&self) -> Option<&str> {
        self.get(Attribute::Title)
    }

    pub fn description(&self) -> Option<&str> {
        self.get(Attribute::Description)
    }

    /// Converts the subject to an X.509 name.
    ///
    /// RDNs are emitted in the order CN, C, L, ST, STREET, O, OU, T,
    /// DESCRIPTION. The serial number is not part of the emitted name.
    ///
    /// # Errors
    /// [`CaError::ValidationError`] if the common name or organization is unset.
    pub fn to_name(&self) -> Result<Name> {
        let mut rdns = Vec::new();
        for (attribute, required) in NAME_ORDER {
            match self.get(attribute) {
                Some(value) => rdns.push(single_rdn(attribute.oid(), value)?),
                None if required => {
                    return Err(CaError::ValidationError(format!(
                        "{} is required",
                        attribute.label()
                    )));
                }
                None => {}
            }
        }
        Ok(RdnSequence(rdns))
    }

    /// Rebuilds a subject from an X.509 name.
    ///
    /// The first attribute of every RDN is applied through the matching
    /// setter, so invalid values fail. Attribute types the subject has no
    /// field for are logged and skipped.
    pub fn from_name(name: &Name) -> Result<Self> {
        let mut subject = Subject::default();
        for rdn in name.0.iter() {
            let Some(atv) = rdn.0.iter().next() else {
                continue;
            };
            let value = attribute_string(&atv.value);
            match Attribute::from_oid(&atv.oid) {
                Some(attribute) => subject.set(attribute, value)?,
                None => {
                    tracing::warn!(oid = %atv.oid, %value, "unknown X500Name RDN, skipping")
                }
            }
        }
        Ok(subject)
    }

    /// Formats [`Subject::to_name`] as a `TYPE=value,...` string.
    pub fn to_name_string(&self) -> Result<String> {
        Ok(format_name(&self.to_name()?))
    }

    /// Parses a `TYPE=value,...` string and applies it with [`Subject::from_name`].
    pub fn from_name_string(input: &str) -> Result<Self> {
        Self::from_name(&parse_name(input)?)
    }
}

/// Writes the populated fields in [`Subject::to_name`] order. Unlike
/// [`Subject::to_name_string`] this never fails on a missing CN or O.
impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (attribute, _) in NAME_ORDER {
            if let Some(value) = self.get(attribute) {
                if !first {
                    f.write_str(",")?;
                }
                write!(f, "{}={}", attribute.label(), escape_value(value))?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for Subject {
    type Err = CaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name_string(s)
    }
}

fn checked(attribute: Attribute, value: String) -> Result<Option<String>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    if let Some(pattern) = attribute.pattern() {
        if !pattern.is_match(&value) {
            return Err(CaError::ValidationError(format!(
                "{} value {:?} does not match {}",
                attribute.label(),
                value,
                pattern.as_str()
            )));
        }
    }
    Ok(Some(value))
}

fn attribute_value(oid: ObjectIdentifier, value: &str) -> Result<Any> {
    let printable = Attribute::from_oid(&oid).is_some_and(Attribute::prefers_printable)
        && PrintableStringRef::new(value).is_ok();
    let tag = if printable {
        Tag::PrintableString
    } else {
        Tag::Utf8String
    };
    Ok(Any::new(tag, value.as_bytes())?)
}

fn single_rdn(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    let mut set = SetOfVec::new();
    set.insert(AttributeTypeAndValue {
        oid,
        value: attribute_value(oid, value)?,
    })?;
    Ok(RelativeDistinguishedName::from(set))
}

/// Decodes a directory string value, falling back to a lossy view of the raw bytes.
fn attribute_string(value: &Any) -> String {
    let decoded = match value.tag() {
        Tag::Utf8String => value.decode_as::<Utf8StringRef<'_>>().map(|s| s.to_string()),
        Tag::PrintableString => value
            .decode_as::<PrintableStringRef<'_>>()
            .map(|s| s.to_string()),
        Tag::Ia5String => value.decode_as::<Ia5StringRef<'_>>().map(|s| s.to_string()),
        Tag::TeletexString => value
            .decode_as::<TeletexStringRef<'_>>()
            .map(|s| s.to_string()),
        _ => Ok(String::from_utf8_lossy(value.value()).into_owned()),
    };
    decoded.unwrap_or_else(|_| String::from_utf8_lossy(value.value()).into_owned())
}

/// Formats a name as comma-separated `TYPE=value` pairs in RDN order.
///
/// Multi-valued RDNs are joined with `+`. Unknown attribute types are
/// written as dotted OIDs.
pub fn format_name(name: &Name) -> String {
    name.0
        .iter()
        .map(|rdn| {
            rdn.0
                .iter()
                .map(|atv| {
                    let label = Attribute::from_oid(&atv.oid)
                        .map(|attr| attr.label().to_string())
                        .unwrap_or_else(|| atv.oid.to_string());
                    format!("{}={}", label, escape_value(&attribute_string(&atv.value)))
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses comma-separated `TYPE=value` pairs into a name, keeping their order.
///
/// `TYPE` is one of the [`Attribute`] labels (case-insensitive) or a dotted
/// OID. Backslash escapes the following character.
pub fn parse_name(input: &str) -> Result<Name> {
    let mut rdns = Vec::new();
    if input.trim().is_empty() {
        return Ok(RdnSequence(rdns));
    }

    for component in split_unescaped(input, ',') {
        let mut set = SetOfVec::new();
        for pair in split_unescaped(&component, '+') {
            let (kind, raw) = split_pair(&pair)?;
            let oid = match Attribute::from_label(kind) {
                Some(attribute) => attribute.oid(),
                None => ObjectIdentifier::new(kind).map_err(|_| {
                    CaError::ValidationError(format!("unknown attribute type {kind:?}"))
                })?,
            };
            let value = unescape_value(raw);
            set.insert(AttributeTypeAndValue {
                oid,
                value: attribute_value(oid, &value)?,
            })?;
        }
        rdns.push(RelativeDistinguishedName::from(set));
    }
    Ok(RdnSequence(rdns))
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    let mut escaped = false;
    for (index, c) in pair.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '=' if !escaped => {
                let kind = pair[..index].trim();
                if kind.is_empty() {
                    break;
                }
                return Ok((kind, &pair[index + 1..]));
            }
            _ => escaped = false,
        }
    }
    Err(CaError::ValidationError(format!(
        "malformed name component {pair:?}"
    )))
}

fn split_unescaped(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            current.push(c);
            escaped = true;
        } else if c == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

fn escape_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let leading = chars.iter().take_while(|c| c.is_whitespace()).count();
    let trailing = chars.len()
        - chars[leading..]
            .iter()
            .rev()
            .take_while(|c| c.is_whitespace())
            .count();
    let mut escaped = String::with_capacity(value.len());
    for (index, &c) in chars.iter().enumerate() {
        let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (index == 0 && c == '#')
            || index < leading
            || index >= trailing;
        if special {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Resolves backslash escapes, then drops whitespace at either end unless
/// it was escaped.
fn unescape_value(value: &str) -> String {
    let mut chars = Vec::with_capacity(value.len());
    let mut input = value.chars();
    while let Some(c) = input.next() {
        if c == '\\' {
            if let Some(next) = input.next() {
                chars.push((next, true));
            }
        } else {
            chars.push((c, false));
        }
    }
    let bare_space = |&(c, escaped): &(char, bool)| !escaped && c.is_whitespace();
    let start = chars.iter().take_while(|c| bare_space(*c)).count();
    let end = chars.len() - chars[start..].iter().rev().take_while(|c| bare_space(*c)).count();
    chars[start..end].iter().map(|(c, _)| c).collect()
}
