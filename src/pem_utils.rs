use crate::error::{CaError, Result};

/// Convert DER‑encoded data into a PEM‑encoded string with the provided label.
pub fn der_to_pem(der: &[u8], label: &str) -> String {
    let pem = pem::Pem::new(label, der);
    pem::encode_config(
        &pem,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Returns the first PEM block of `input`.
///
/// Fails with `FormatError("no objects left")` when the input holds no block.
pub fn first_block(input: &str) -> Result<pem::Pem> {
    pem::parse_many(input)?
        .into_iter()
        .next()
        .ok_or_else(|| CaError::FormatError("no objects left".to_string()))
}

/// Returns the DER contents of the first PEM block of `input` if its label is
/// one of `labels`, otherwise fails with `FormatError(mismatch)`.
pub fn expect_block(input: &str, labels: &[&str], mismatch: &str) -> Result<Vec<u8>> {
    let block = first_block(input)?;
    if labels.contains(&block.tag()) {
        Ok(block.into_contents())
    } else {
        Err(CaError::FormatError(mismatch.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_has_no_objects() {
        for input in ["", "   \n", "not pem at all"] {
            let err = first_block(input).unwrap_err();
            assert_eq!(err, CaError::FormatError("no objects left".to_string()));
        }
    }

    #[test]
    fn test_expect_block_checks_label() {
        let pem = der_to_pem(&[0x30, 0x00], "CERTIFICATE");
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert_eq!(
            expect_block(&pem, &["CERTIFICATE"], "wrong").unwrap(),
            vec![0x30, 0x00]
        );
        assert_eq!(
            expect_block(&pem, &["CERTIFICATE REQUEST"], "wrong").unwrap_err(),
            CaError::FormatError("wrong".to_string())
        );
    }
}
