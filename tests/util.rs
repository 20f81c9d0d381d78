#![allow(dead_code)]

use certforge::authority::CertificationAuthority;
use certforge::cert::extensions::SanEntry;
use certforge::cert::{Certificate, SignatureAlgorithm};
use certforge::csr::CertificateSigningRequest;
use certforge::key::KeyPair;
use certforge::subject::Subject;
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

/// RSA size for test CAs; small to keep debug builds fast.
pub const TEST_KEY_BITS: usize = 1024;

pub fn rng(seed: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(seed)
}

pub fn subject(common_name: &str) -> Subject {
    Subject::builder()
        .common_name(common_name)
        .country_code("CN")
        .state("SH")
        .locality("SH")
        .organization("Example Corp")
        .build()
        .unwrap()
}

/// A self-signed RSA root CA named `myca.local`.
pub fn generate_ca(rng: &mut ChaCha20Rng) -> CertificationAuthority {
    let key = KeyPair::generate_rsa(rng, TEST_KEY_BITS).unwrap();
    let subject = subject("myca.local");
    let csr =
        CertificateSigningRequest::generate(&key, &subject, &[], SignatureAlgorithm::Sha256WithRsa)
            .unwrap();
    let cert =
        Certificate::self_signed(&csr, &key, SignatureAlgorithm::Sha256WithRsa, rng).unwrap();
    CertificationAuthority::new("ROOT", key, subject, csr, cert)
}

/// An ECDSA P-256 request for `common_name` asking for `san`.
pub fn leaf_request(
    rng: &mut ChaCha20Rng,
    common_name: &str,
    san: &[SanEntry],
) -> (KeyPair, CertificateSigningRequest) {
    let key = KeyPair::generate_ecdsa_p256(rng);
    let csr = CertificateSigningRequest::generate(
        &key,
        &subject(common_name),
        san,
        SignatureAlgorithm::EcdsaWithSha256,
    )
    .unwrap();
    (key, csr)
}
