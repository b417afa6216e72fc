use super::des::des7_encrypt;
use super::nt::{ntowfv2, NtHash};
use crate::error::Result;

pub type LmHash = [u8; 16];

const LM_MAGIC: &[u8; 8] = b"KGS!@#$%";

/// LMOWFv1: the ASCII-uppercased password, zero-padded or truncated to 14
/// bytes, keys two DES encryptions of the magic constant.
pub fn lmowfv1(password: &str) -> Result<LmHash> {
    let upper = password.to_ascii_uppercase();
    let bytes = upper.as_bytes();

    let mut key = [0u8; 14];
    let n = bytes.len().min(key.len());
    key[..n].copy_from_slice(&bytes[..n]);

    let mut lm_hash = LmHash::default();
    lm_hash[..8].copy_from_slice(&des7_encrypt(&key[..7], LM_MAGIC)?);
    lm_hash[8..].copy_from_slice(&des7_encrypt(&key[7..], LM_MAGIC)?);

    Ok(lm_hash)
}

/// LMOWFv2 is defined to be NTOWFv2.
pub fn lmowfv2(user: &str, password: &str, domain: &str) -> NtHash {
    ntowfv2(user, password, domain)
}

#[cfg(test)]
mod tests {
    use crate::crypto::tests::LM_HASH;

    #[test]
    fn lmowfv1_reference_vector() {
        pretty_assertions::assert_eq!(super::lmowfv1("Password").unwrap(), LM_HASH);
    }

    #[test]
    fn lmowfv1_truncates_long_passwords() {
        // only the first 14 bytes take part
        pretty_assertions::assert_eq!(
            super::lmowfv1("abcdefghijklmnopqrstuvwxyz").unwrap(),
            super::lmowfv1("ABCDEFGHIJKLMN").unwrap(),
        );
    }
}
