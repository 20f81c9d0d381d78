use const_oid::AssociatedOid;
use der::Encode;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use pkcs8::pkcs5::pbes2;
use pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncryptedPrivateKeyInfo, LineEnding,
    PrivateKeyInfo, SecretDocument,
};
use rand_core::CryptoRngCore;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{CaError, Result};
use crate::pem_utils;

/// PEM label of an unencrypted PKCS#8 private key.
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
/// PEM label of a PBES2-encrypted PKCS#8 private key.
pub const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";

const PBKDF2_ITERATIONS: u32 = 100_000;

/// Supported key types for certificate operations.
#[derive(Debug, Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    Ed25519 {
        signing_key: Ed25519SigningKey,
    },
}

impl KeyPair {
    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(rng: &mut impl CryptoRngCore, bits: usize) -> Result<Self> {
        let private = RsaPrivateKey::new(rng, bits)?;
        let public = RsaPublicKey::from(&private);
        Ok(KeyPair::Rsa {
            private: Box::new(private),
            public,
        })
    }

    /// Generate an ECDSA P-256 key pair.
    pub fn generate_ecdsa_p256(rng: &mut impl CryptoRngCore) -> Self {
        let signing_key = P256SigningKey::random(rng);
        let verifying_key = signing_key.verifying_key().to_owned();
        KeyPair::EcdsaP256 {
            signing_key,
            verifying_key,
        }
    }

    /// Generate an Ed25519 key pair.
    pub fn generate_ed25519(rng: &mut impl CryptoRngCore) -> Self {
        let signing_key = Ed25519SigningKey::generate(rng);
        KeyPair::Ed25519 { signing_key }
    }

    /// Short name of the key algorithm, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            KeyPair::Rsa { .. } => "RSA",
            KeyPair::EcdsaP256 { .. } => "ECDSA P-256",
            KeyPair::Ed25519 { .. } => "Ed25519",
        }
    }

    /// The signature algorithm this key signs with when the caller has no preference.
    pub fn default_signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRsa,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::EcdsaWithSha256,
            KeyPair::Ed25519 { .. } => SignatureAlgorithm::Ed25519,
        }
    }

    /// Returns the public half as a `SubjectPublicKeyInfo`.
    pub fn as_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            KeyPair::Rsa { public, .. } => SubjectPublicKeyInfoOwned::from_key(public.clone())?,
            KeyPair::EcdsaP256 { verifying_key, .. } => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)?
            }
            KeyPair::Ed25519 { signing_key } => {
                SubjectPublicKeyInfoOwned::from_key(signing_key.verifying_key())?
            }
        };
        Ok(spki)
    }

    /// Signs `data` with `algorithm`.
    ///
    /// Fails with [`CaError::SigningError`] when the algorithm does not belong
    /// to this key type.
    pub fn sign_data(&self, data: &[u8], algorithm: SignatureAlgorithm) -> Result<Vec<u8>> {
        match (self, algorithm) {
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha256WithRsa) => {
                sign_rsa::<Sha256>(private, data)
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha384WithRsa) => {
                sign_rsa::<Sha384>(private, data)
            }
            (KeyPair::Rsa { private, .. }, SignatureAlgorithm::Sha512WithRsa) => {
                sign_rsa::<Sha512>(private, data)
            }
            (KeyPair::EcdsaP256 { signing_key, .. }, SignatureAlgorithm::EcdsaWithSha256) => {
                let signature: p256::ecdsa::Signature = signing_key
                    .try_sign(data)
                    .map_err(|e| CaError::SigningError(e.to_string()))?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            (KeyPair::Ed25519 { signing_key }, SignatureAlgorithm::Ed25519) => {
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| CaError::SigningError(e.to_string()))?;
                Ok(signature.to_bytes().to_vec())
            }
            (key, algorithm) => Err(CaError::SigningError(format!(
                "cannot construct a {algorithm} signer for a {} key",
                key.kind()
            ))),
        }
    }

    /// Encodes the private key as a PKCS#8 document.
    pub fn to_pkcs8_der(&self) -> Result<SecretDocument> {
        let document = match self {
            KeyPair::Rsa { private, .. } => private.to_pkcs8_der()?,
            KeyPair::EcdsaP256 { signing_key, .. } => signing_key.to_pkcs8_der()?,
            KeyPair::Ed25519 { signing_key } => signing_key.to_pkcs8_der()?,
        };
        Ok(document)
    }

    /// Encodes the private key as an unencrypted `PRIVATE KEY` PEM block.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        let document = self.to_pkcs8_der()?;
        let pem = document
            .to_pem(PRIVATE_KEY_LABEL, LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(pem.as_str().to_owned())
    }

    /// Encodes the private key as an `ENCRYPTED PRIVATE KEY` PEM block.
    ///
    /// The key is wrapped with PBES2 (PBKDF2-HMAC-SHA256 and the cipher named
    /// by `encryption`); salt and IV are drawn from `rng`.
    pub fn to_encrypted_pkcs8_pem(
        &self,
        encryption: &PemEncryption,
        rng: &mut impl CryptoRngCore,
    ) -> Result<String> {
        let document = self.to_pkcs8_der()?;
        let info = PrivateKeyInfo::try_from(document.as_bytes())?;

        let mut salt = [0u8; 16];
        rng.fill_bytes(&mut salt);
        let mut iv = [0u8; 16];
        rng.fill_bytes(&mut iv);

        let params = encryption.cipher.pbes2_params(&salt, &iv)?;
        let encrypted = info.encrypt_with_params(params, encryption.passphrase.as_bytes())?;
        let pem = encrypted
            .to_pem(ENCRYPTED_PRIVATE_KEY_LABEL, LineEnding::LF)
            .map_err(|e| CaError::EncodingError(e.to_string()))?;
        Ok(pem.as_str().to_owned())
    }

    /// Imports a key pair from a PKCS#8 DER document.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        let info = PrivateKeyInfo::try_from(der)?;
        match info.algorithm.oid {
            const_oid::db::rfc5912::RSA_ENCRYPTION => {
                let private = RsaPrivateKey::from_pkcs8_der(der)
                    .map_err(|e| CaError::DecodingError(e.to_string()))?;
                let public = RsaPublicKey::from(&private);
                Ok(KeyPair::Rsa {
                    private: Box::new(private),
                    public,
                })
            }
            const_oid::db::rfc5912::ID_EC_PUBLIC_KEY => {
                let signing_key = P256SigningKey::from_pkcs8_der(der)
                    .map_err(|e| CaError::DecodingError(e.to_string()))?;
                let verifying_key = signing_key.verifying_key().to_owned();
                Ok(KeyPair::EcdsaP256 {
                    signing_key,
                    verifying_key,
                })
            }
            const_oid::db::rfc8410::ID_ED_25519 => {
                let signing_key = Ed25519SigningKey::from_pkcs8_der(der)
                    .map_err(|e| CaError::DecodingError(e.to_string()))?;
                Ok(KeyPair::Ed25519 { signing_key })
            }
            other => Err(CaError::DecodingError(format!(
                "unsupported private key algorithm {other}"
            ))),
        }
    }

    /// Reads a key pair from PEM text.
    ///
    /// Encrypted blocks require `passphrase`.
    pub fn read_pem(input: &str, passphrase: Option<&str>) -> Result<Self> {
        let block = pem_utils::first_block(input)?;
        match block.tag() {
            PRIVATE_KEY_LABEL => Self::from_pkcs8_der(block.contents()),
            ENCRYPTED_PRIVATE_KEY_LABEL => {
                let passphrase = passphrase.ok_or_else(|| {
                    CaError::FormatError("encrypted private key requires a passphrase".to_string())
                })?;
                let encrypted = EncryptedPrivateKeyInfo::try_from(block.contents())?;
                let document = encrypted
                    .decrypt(passphrase)
                    .map_err(|e| CaError::DecodingError(e.to_string()))?;
                Self::from_pkcs8_der(document.as_bytes())
            }
            _ => Err(CaError::FormatError("not a private key".to_string())),
        }
    }
}

fn sign_rsa<D>(private: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>>
where
    D: Digest + AssociatedOid,
{
    let signing_key = rsa::pkcs1v15::SigningKey::<D>::new(private.clone());
    let signature = signing_key
        .try_sign(data)
        .map_err(|e| CaError::SigningError(e.to_string()))?;
    Ok(signature.to_vec())
}

fn verify_rsa<D>(public: RsaPublicKey, data: &[u8], signature: &[u8]) -> Result<()>
where
    D: Digest + AssociatedOid,
{
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(public);
    let signature = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| CaError::SigningError(e.to_string()))?;
    verifying_key
        .verify(data, &signature)
        .map_err(|e| CaError::SigningError(e.to_string()))
}

/// Verifies `signature` over `data` with the public key in `spki`.
pub fn verify_signature(
    spki: &SubjectPublicKeyInfoOwned,
    algorithm: SignatureAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> Result<()> {
    let spki_der = spki.to_der()?;
    let decode_err = |e: x509_cert::spki::Error| CaError::SigningError(e.to_string());
    match algorithm {
        SignatureAlgorithm::Sha256WithRsa
        | SignatureAlgorithm::Sha384WithRsa
        | SignatureAlgorithm::Sha512WithRsa => {
            let public = RsaPublicKey::from_public_key_der(&spki_der).map_err(decode_err)?;
            match algorithm {
                SignatureAlgorithm::Sha384WithRsa => verify_rsa::<Sha384>(public, data, signature),
                SignatureAlgorithm::Sha512WithRsa => verify_rsa::<Sha512>(public, data, signature),
                _ => verify_rsa::<Sha256>(public, data, signature),
            }
        }
        SignatureAlgorithm::EcdsaWithSha256 => {
            let verifying_key =
                P256VerifyingKey::from_public_key_der(&spki_der).map_err(decode_err)?;
            let signature = p256::ecdsa::Signature::from_der(signature)
                .map_err(|e| CaError::SigningError(e.to_string()))?;
            verifying_key
                .verify(data, &signature)
                .map_err(|e| CaError::SigningError(e.to_string()))
        }
        SignatureAlgorithm::Ed25519 => {
            let verifying_key =
                ed25519_dalek::VerifyingKey::from_public_key_der(&spki_der).map_err(decode_err)?;
            let signature = ed25519_dalek::Signature::from_slice(signature)
                .map_err(|e| CaError::SigningError(e.to_string()))?;
            verifying_key
                .verify(data, &signature)
                .map_err(|e| CaError::SigningError(e.to_string()))
        }
    }
}

/// Symmetric cipher protecting an encrypted private-key PEM block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PemCipher {
    Aes128Cbc,
    #[default]
    Aes256Cbc,
}

impl PemCipher {
    fn pbes2_params<'a>(&self, salt: &'a [u8], iv: &'a [u8; 16]) -> Result<pbes2::Parameters<'a>> {
        let params = match self {
            PemCipher::Aes128Cbc => {
                pbes2::Parameters::pbkdf2_sha256_aes128cbc(PBKDF2_ITERATIONS, salt, iv)
            }
            PemCipher::Aes256Cbc => {
                pbes2::Parameters::pbkdf2_sha256_aes256cbc(PBKDF2_ITERATIONS, salt, iv)
            }
        };
        params.map_err(|e| CaError::EncodingError(e.to_string()))
    }
}

impl std::fmt::Display for PemCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PemCipher::Aes128Cbc => f.write_str("AES-128-CBC"),
            PemCipher::Aes256Cbc => f.write_str("AES-256-CBC"),
        }
    }
}

/// Passphrase and cipher used when writing a private key.
#[derive(Clone)]
pub struct PemEncryption {
    pub cipher: PemCipher,
    pub passphrase: String,
}

impl PemEncryption {
    /// AES-256-CBC under `passphrase`.
    pub fn aes256(passphrase: impl Into<String>) -> Self {
        Self {
            cipher: PemCipher::Aes256Cbc,
            passphrase: passphrase.into(),
        }
    }

    /// Returns `None` for a blank passphrase, so callers can pass optional
    /// passphrases through unchanged.
    pub fn from_passphrase(cipher: PemCipher, passphrase: Option<&str>) -> Option<Self> {
        passphrase
            .filter(|p| !p.trim().is_empty())
            .map(|p| Self {
                cipher,
                passphrase: p.to_string(),
            })
    }
}

impl std::fmt::Debug for PemEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PemEncryption")
            .field("cipher", &self.cipher)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}
