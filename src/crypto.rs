use hmac::{Hmac, Mac};
use md4::Md4;
use md5::{Digest, Md5};
use rc4::consts::{U16, U8};
use rc4::{KeyInit, Rc4, StreamCipher};

use crate::error::{Error, Result};
use crate::messages::structures::Response24;

pub mod des;
pub mod keys;
pub mod lm;
pub mod mac;
pub mod nt;
pub mod ntlmv1;
pub mod ntlmv2;

/// Little-endian UTF-16 without BOM or terminator, as every NTLM string
/// payload is encoded.
pub fn utf16le(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

pub fn utf16le_decode(data: &[u8]) -> Result<String> {
    if data.len() % 2 != 0 {
        return Err(Error::MalformedMessage("odd-length UTF-16 payload"));
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::MalformedMessage("invalid UTF-16 payload"))
}

pub fn md4(input: &[u8]) -> [u8; 16] {
    let mut hasher = Md4::new();
    hasher.update(input);
    hasher.finalize().into()
}

pub fn md5(input: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(input);
    hasher.finalize().into()
}

pub fn hmac_md5(key: &[u8], input: &[u8]) -> [u8; 16] {
    // HMAC-MD5 accepts keys of any length
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(input);
    mac.finalize().into_bytes().into()
}

/// DESL(K, D): the key is right-zero-padded to 21 bytes, split into three
/// 7-byte DES keys and each one encrypts the same 8-byte block.
pub fn desl(key: &[u8; 16], data: &[u8; 8]) -> Result<Response24> {
    let mut extended = [0u8; 21];
    extended[..16].copy_from_slice(key);

    let mut response = [0u8; 24];
    response[..8].copy_from_slice(&des::des7_encrypt(&extended[..7], data)?);
    response[8..16].copy_from_slice(&des::des7_encrypt(&extended[7..14], data)?);
    response[16..].copy_from_slice(&des::des7_encrypt(&extended[14..], data)?);

    Ok(response.into())
}

/// A running RC4 stream. Sealing keys are 16 bytes under extended session
/// security and 8 bytes on the legacy 40/56-bit paths.
pub enum Rc4State {
    Short(Rc4<U8>),
    Long(Rc4<U16>),
}

impl Rc4State {
    pub fn init(key: &[u8]) -> Result<Self> {
        match key.len() {
            8 => {
                let mut k = [0u8; 8];
                k.copy_from_slice(key);
                Ok(Self::Short(Rc4::new(&k.into())))
            }
            16 => {
                let mut k = [0u8; 16];
                k.copy_from_slice(key);
                Ok(Self::Long(Rc4::new(&k.into())))
            }
            _ => Err(Error::CryptoFailure("RC4 key must be 8 or 16 bytes")),
        }
    }

    pub fn apply(&mut self, data: &mut [u8]) {
        match self {
            Self::Short(cipher) => cipher.apply_keystream(data),
            Self::Long(cipher) => cipher.apply_keystream(data),
        }
    }

    pub fn transform(&mut self, data: &[u8]) -> Vec<u8> {
        let mut out = data.to_vec();
        self.apply(&mut out);
        out
    }
}

impl std::fmt::Debug for Rc4State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Rc4State(..)")
    }
}

/// One-shot RC4: init, encrypt, discard the state.
pub fn rc4k(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut state = Rc4State::init(key)?;
    Ok(state.transform(data))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::lm::LmHash;
    use super::nt::NtHash;

    pub const NT_HASH: NtHash = [
        0xa4, 0xf4, 0x9c, 0x40, 0x65, 0x10, 0xbd, 0xca, 0xb6, 0x82, 0x4e, 0xe7, 0xc3, 0x0f, 0xd8,
        0x52,
    ];
    pub const LM_HASH: LmHash = [
        0xe5, 0x2c, 0xac, 0x67, 0x41, 0x9a, 0x9a, 0x22, 0x4a, 0x3b, 0x10, 0x8f, 0x3f, 0xa6, 0xcb,
        0x6d,
    ];
    pub const NT_V2_HASH: NtHash = [
        0x0c, 0x86, 0x8a, 0x40, 0x3b, 0xfd, 0x7a, 0x93, 0xa3, 0x00, 0x1e, 0xf2, 0x2e, 0xf0, 0x2e,
        0x3f,
    ];
    pub const SERVER_CHALLENGE: [u8; 8] = [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef];
    pub const CLIENT_CHALLENGE: [u8; 8] = [0xaa; 8];
    pub const SESSION_BASE_KEY: [u8; 16] = [
        0xd8, 0x72, 0x62, 0xb0, 0xcd, 0xe4, 0xb1, 0xcb, 0x74, 0x99, 0xbe, 0xcc, 0xcd, 0xf1, 0x07,
        0x84,
    ];
    pub const RANDOM_SESSION_KEY: [u8; 16] = [0x55; 16];

    #[test]
    fn utf16le_encoding() {
        pretty_assertions::assert_eq!(
            super::utf16le("Password"),
            [
                0x50, 0x00, 0x61, 0x00, 0x73, 0x00, 0x73, 0x00, 0x77, 0x00, 0x6f, 0x00, 0x72,
                0x00, 0x64, 0x00
            ]
        );
        assert!(super::utf16le("").is_empty());
    }

    #[test]
    fn utf16le_round_trip() {
        let encoded = super::utf16le("Domain");
        pretty_assertions::assert_eq!(super::utf16le_decode(&encoded).unwrap(), "Domain");
    }

    #[test]
    fn rc4_one_shot_matches_streaming() {
        let key = RANDOM_SESSION_KEY;
        let data = b"some application payload";

        let oneshot = super::rc4k(&key, data).unwrap();
        let mut state = super::Rc4State::init(&key).unwrap();
        pretty_assertions::assert_eq!(oneshot, state.transform(data));

        // the keystream advances across calls
        assert_ne!(state.transform(data), oneshot);
    }

    #[test]
    fn rc4_rejects_odd_key_sizes() {
        assert!(super::Rc4State::init(&[0u8; 5]).is_err());
    }
}
