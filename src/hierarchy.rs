//! Declarative construction of a CA hierarchy.
//!
//! A [`HierarchySpec`] lists CA nodes by name and parent. [`HierarchyBuilder`]
//! builds them parents first, signing each child with its parent's key, and
//! hands the PEM artifacts of every CA to an [`ArtifactSink`].

use std::collections::{HashMap, HashSet};
use std::io::Write;

use bon::Builder;
use rand_core::CryptoRngCore;

use crate::authority::CertificationAuthority;
use crate::cert::params::{CaConstraints, IssuanceProfile};
use crate::cert::{Certificate, SignatureAlgorithm};
use crate::csr::CertificateSigningRequest;
use crate::error::{CaError, Result};
use crate::issuer::NamedIssuer;
use crate::key::{KeyPair, PemCipher, PemEncryption};
use crate::subject::Subject;

pub const DEFAULT_KEY_BITS: usize = 2048;

const ORGANIZATION: &str = "上海云屹信息技术有限公司";

/// Name string of a generated CA subject.
///
/// Root CAs are named `云屹根证书-{name}`, all others `云屹中间证书-{name}`.
pub fn ca_name_string(name: &str, is_root: bool) -> String {
    let prefix = if is_root { "云屹根证书" } else { "云屹中间证书" };
    format!("C=CN,ST=SH,L=SH,O={ORGANIZATION},OU={name},CN={prefix}-{name}")
}

/// One CA of a hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct CaNode {
    #[builder(into)]
    pub name: String,
    /// Name of the issuing CA; `None` for a self-signed root.
    #[builder(into)]
    pub parent: Option<String>,
    /// Path length written into basicConstraints when the issuance profile
    /// carries CA markings.
    pub path_len: Option<u8>,
    #[builder(default = DEFAULT_KEY_BITS)]
    pub key_bits: usize,
    /// Non-blank values encrypt the private-key PEM.
    #[builder(into)]
    pub passphrase: Option<String>,
}

/// An ordered list of CA nodes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HierarchySpec {
    pub nodes: Vec<CaNode>,
}

impl HierarchySpec {
    pub fn new(nodes: Vec<CaNode>) -> Self {
        Self { nodes }
    }

    /// ROOT, SERVER and CLIENT under ROOT, YeeCloud under CLIENT.
    pub fn demo() -> Self {
        Self::new(vec![
            CaNode::builder().name("ROOT").build(),
            CaNode::builder().name("SERVER").parent("ROOT").path_len(0).build(),
            CaNode::builder().name("CLIENT").parent("ROOT").path_len(1).build(),
            CaNode::builder()
                .name("YeeCloud")
                .parent("CLIENT")
                .path_len(0)
                .build(),
        ])
    }

    /// The nodes in build order: every parent before its children, otherwise
    /// list order.
    ///
    /// # Errors
    /// [`CaError::HierarchyError`] on duplicate names, unknown parents or cycles.
    pub fn ordered(&self) -> Result<Vec<&CaNode>> {
        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(CaError::HierarchyError(format!(
                    "duplicate CA name {}",
                    node.name
                )));
            }
        }
        for node in &self.nodes {
            if let Some(parent) = &node.parent {
                if !names.contains(parent.as_str()) {
                    return Err(CaError::HierarchyError(format!(
                        "CA {} names unknown parent {parent}",
                        node.name
                    )));
                }
            }
        }

        let mut built: HashSet<&str> = HashSet::new();
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut pending: Vec<&CaNode> = self.nodes.iter().collect();
        while !pending.is_empty() {
            let (ready, blocked): (Vec<&CaNode>, Vec<&CaNode>) =
                pending.into_iter().partition(|node| match &node.parent {
                    None => true,
                    Some(parent) => built.contains(parent.as_str()),
                });
            if ready.is_empty() {
                let names: Vec<&str> = blocked.iter().map(|node| node.name.as_str()).collect();
                return Err(CaError::HierarchyError(format!(
                    "cycle between CAs {}",
                    names.join(", ")
                )));
            }
            for node in ready {
                built.insert(node.name.as_str());
                ordered.push(node);
            }
            pending = blocked;
        }
        Ok(ordered)
    }
}

/// The three PEM artifacts produced for each CA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    PrivateKey,
    Csr,
    Certificate,
}

impl ArtifactKind {
    /// Conventional file extension, e.g. `ROOT.key`.
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactKind::PrivateKey => "key",
            ArtifactKind::Csr => "csr",
            ArtifactKind::Certificate => "cer",
        }
    }

    /// `<ca_name>.<extension>`
    pub fn file_name(self, ca_name: &str) -> String {
        format!("{ca_name}.{}", self.extension())
    }
}

/// Receives the PEM artifacts of each built CA.
pub trait ArtifactSink {
    fn accept(&mut self, ca_name: &str, kind: ArtifactKind, pem: &str) -> Result<()>;
}

/// Writes every artifact, in arrival order, to one writer.
pub struct WriterSink<W: Write> {
    out: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ArtifactSink for WriterSink<W> {
    fn accept(&mut self, _ca_name: &str, _kind: ArtifactKind, pem: &str) -> Result<()> {
        self.out.write_all(pem.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub ca_name: String,
    pub kind: ArtifactKind,
    pub pem: String,
}

/// Keeps artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    pub artifacts: Vec<Artifact>,
}

impl CollectingSink {
    pub fn get(&self, ca_name: &str, kind: ArtifactKind) -> Option<&str> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.ca_name == ca_name && artifact.kind == kind)
            .map(|artifact| artifact.pem.as_str())
    }
}

impl ArtifactSink for CollectingSink {
    fn accept(&mut self, ca_name: &str, kind: ArtifactKind, pem: &str) -> Result<()> {
        self.artifacts.push(Artifact {
            ca_name: ca_name.to_string(),
            kind,
            pem: pem.to_string(),
        });
        Ok(())
    }
}

/// Builds CAs from [`CaNode`]s.
#[derive(Debug, Clone, Builder)]
pub struct HierarchyBuilder {
    /// Base profile; a node's `path_len` replaces the CA constraints' path
    /// length when the profile has CA constraints.
    #[builder(default)]
    pub profile: IssuanceProfile,
    #[builder(default = SignatureAlgorithm::Sha256WithRsa)]
    pub signature_algorithm: SignatureAlgorithm,
    #[builder(default)]
    pub cipher: PemCipher,
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HierarchyBuilder {
    /// Builds one CA and sends its key, CSR and certificate to `sink`.
    ///
    /// Without `issuer` the certificate is self-signed; otherwise it is
    /// signed by `issuer`, whose CSR subject becomes the issuer name.
    pub fn build_one(
        &self,
        node: &CaNode,
        issuer: Option<&CertificationAuthority>,
        sink: &mut dyn ArtifactSink,
        rng: &mut impl CryptoRngCore,
    ) -> Result<CertificationAuthority> {
        let key_pair = KeyPair::generate_rsa(rng, node.key_bits)?;
        let subject = Subject::from_name_string(&ca_name_string(&node.name, issuer.is_none()))?;
        let csr =
            CertificateSigningRequest::generate(&key_pair, &subject, &[], self.signature_algorithm)?;

        let profile = self.profile_for(node);
        let certificate = match issuer {
            Some(parent) => {
                Certificate::issue(&csr, parent, self.signature_algorithm, &profile, rng)?
            }
            None => {
                let self_issuer = NamedIssuer {
                    name: csr.subject().clone(),
                    key: &key_pair,
                };
                Certificate::issue(&csr, &self_issuer, self.signature_algorithm, &profile, rng)?
            }
        };

        let authority =
            CertificationAuthority::new(node.name.clone(), key_pair, subject, csr, certificate);

        let encryption = PemEncryption::from_passphrase(self.cipher, node.passphrase.as_deref());
        let artifacts = [
            (
                ArtifactKind::PrivateKey,
                authority.key_pem(encryption.as_ref(), rng)?,
            ),
            (ArtifactKind::Csr, authority.csr().to_pem()?),
            (ArtifactKind::Certificate, authority.certificate().to_pem()?),
        ];
        for (kind, pem) in &artifacts {
            tracing::debug!(artifact = %kind.file_name(&node.name), "emitting artifact");
            sink.accept(&node.name, *kind, pem)?;
        }

        tracing::info!(
            ca = %node.name,
            parent = issuer.map(CertificationAuthority::name).unwrap_or("-"),
            key_bits = node.key_bits,
            encrypted = encryption.is_some(),
            "built certificate authority"
        );
        Ok(authority)
    }

    /// Builds every node of `spec`, parents first.
    ///
    /// Returns the authorities in build order. The first failure aborts the build.
    pub fn build(
        &self,
        spec: &HierarchySpec,
        sink: &mut dyn ArtifactSink,
        rng: &mut impl CryptoRngCore,
    ) -> Result<Vec<CertificationAuthority>> {
        let ordered = spec.ordered()?;
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut authorities: Vec<CertificationAuthority> = Vec::with_capacity(ordered.len());

        for node in ordered {
            let parent = match &node.parent {
                Some(name) => {
                    let position = index.get(name).copied().ok_or_else(|| {
                        CaError::HierarchyError(format!("parent {name} of {} not built", node.name))
                    })?;
                    Some(&authorities[position])
                }
                None => None,
            };
            let authority = self.build_one(node, parent, sink, rng)?;
            index.insert(node.name.clone(), authorities.len());
            authorities.push(authority);
        }
        Ok(authorities)
    }

    fn profile_for(&self, node: &CaNode) -> IssuanceProfile {
        let mut profile = self.profile.clone();
        if profile.ca_constraints.is_some() {
            profile.ca_constraints = Some(CaConstraints {
                path_len: node.path_len,
            });
        }
        profile
    }
}

/// Builds the demo hierarchy and writes every PEM artifact to `out`.
pub fn rebuild(
    out: &mut impl Write,
    rng: &mut impl CryptoRngCore,
) -> Result<Vec<CertificationAuthority>> {
    let mut sink = WriterSink::new(out);
    HierarchyBuilder::default().build(&HierarchySpec::demo(), &mut sink, rng)
}
