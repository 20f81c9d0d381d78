//! # certforge - A Small Certificate Authority Toolkit
//!
//! certforge models the pieces needed to run a small private CA with the
//! RustCrypto stack: validated subjects, PKCS#10 certificate signing
//! requests, X.509v3 issuance and multi-level CA hierarchies.
//!
//! ## Supported Key Types
//!
//! - **RSA**: any size accepted by the `rsa` crate, signing with SHA-256/384/512
//! - **ECDSA**: P-256 with SHA-256
//! - **Ed25519**
//!
//! ## Issuance
//!
//! An issued certificate takes its subject and public key from the request.
//! Extensions are written in a fixed order: the Subject Alternative Name the
//! request asked for (copied byte for byte), a CRL distribution point naming
//! the issuer, and Authority Information Access. CA markings
//! (`basicConstraints`, `keyUsage`) are only added when the
//! [`cert::params::IssuanceProfile`] asks for them.
//!
//! ## Quick Start
//!
//! ### Self-signed root and an intermediate
//!
//! ```rust,no_run
//! use certforge::{
//!     authority::CertificationAuthority,
//!     cert::{Certificate, SignatureAlgorithm},
//!     csr::CertificateSigningRequest,
//!     key::KeyPair,
//!     subject::Subject,
//! };
//! use rand_core::OsRng;
//!
//! # fn main() -> Result<(), certforge::error::CaError> {
//! let root_key = KeyPair::generate_rsa(&mut OsRng, 2048)?;
//! let root_subject = Subject::from_name_string("CN=Example Root,O=Example Corp,C=US")?;
//! let root_csr = CertificateSigningRequest::generate(
//!     &root_key,
//!     &root_subject,
//!     &[],
//!     SignatureAlgorithm::Sha256WithRsa,
//! )?;
//! let root_cert = Certificate::self_signed(
//!     &root_csr,
//!     &root_key,
//!     SignatureAlgorithm::Sha256WithRsa,
//!     &mut OsRng,
//! )?;
//! let root = CertificationAuthority::new("ROOT", root_key, root_subject, root_csr, root_cert);
//!
//! let key = KeyPair::generate_ecdsa_p256(&mut OsRng);
//! let subject = Subject::builder()
//!     .common_name("Example Issuing CA")
//!     .organization("Example Corp")
//!     .build()?;
//! let csr = CertificateSigningRequest::generate(
//!     &key,
//!     &subject,
//!     &[],
//!     SignatureAlgorithm::EcdsaWithSha256,
//! )?;
//! let cert = Certificate::generate_by(&csr, &root, SignatureAlgorithm::Sha256WithRsa, &mut OsRng)?;
//! println!("{}", cert.to_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ### Whole hierarchies
//!
//! ```rust,no_run
//! use certforge::hierarchy::{CaNode, CollectingSink, HierarchyBuilder, HierarchySpec};
//! use rand_core::OsRng;
//!
//! # fn main() -> Result<(), certforge::error::CaError> {
//! let spec = HierarchySpec::new(vec![
//!     CaNode::builder().name("ROOT").build(),
//!     CaNode::builder().name("ISSUING").parent("ROOT").path_len(0).passphrase("s3cret").build(),
//! ]);
//! let mut sink = CollectingSink::default();
//! let authorities = HierarchyBuilder::default().build(&spec, &mut sink, &mut OsRng)?;
//! assert_eq!(authorities.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`subject`]: Validated distinguished names and the name string form
//! - [`csr`]: PKCS#10 certificate signing requests
//! - [`cert`]: Certificate issuance, encoding/decoding and extensions
//! - [`authority`]: CA record (key, request, certificate) and its PEM writers
//! - [`hierarchy`]: Declarative CA hierarchies
//! - [`key`]: Key generation, signing and private-key PEM
//! - [`issuer`]: The issuer seam used by issuance
//! - [`tbs_certificate`]: Low-level certificate structure assembly
//! - [`error`]: Error types

pub mod authority;
pub mod cert;
pub mod csr;
pub mod error;
pub mod hierarchy;
pub mod issuer;
pub mod key;
pub mod pem_utils;
pub mod subject;
pub mod tbs_certificate;
