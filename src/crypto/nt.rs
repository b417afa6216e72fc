use super::{hmac_md5, md4, utf16le};

pub type NtHash = [u8; 16];

/// NTOWFv1: MD4 over the UTF-16LE password.
pub fn ntowfv1(password: &str) -> NtHash {
    md4(&utf16le(password))
}

/// NTOWFv2: HMAC-MD5 keyed by the v1 hash over UPPER(user) || domain. The
/// user name is uppercased, the domain is not.
pub fn ntowfv2(user: &str, password: &str, domain: &str) -> NtHash {
    let identity = format!("{}{}", user.to_uppercase(), domain);
    hmac_md5(&ntowfv1(password), &utf16le(&identity))
}
