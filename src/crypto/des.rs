use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockEncrypt, KeyInit};
use des::Des;

use crate::error::{Error, Result};

/// Spreads a 56-bit key across the high 7 bits of each output byte. The
/// parity bit stays low; DES ignores it.
pub fn expand_des_key(key7: &[u8]) -> [u8; 8] {
    debug_assert_eq!(key7.len(), 7);

    let mut key8 = [0u8; 8];
    key8[0] = key7[0];
    for i in 1..7 {
        key8[i] = (key7[i - 1] << (8 - i)) | (key7[i] >> i);
    }
    key8[7] = key7[6] << 1;

    for b in &mut key8 {
        *b &= 0xfe;
    }
    key8
}

pub fn des7_encrypt(key7: &[u8], plain: &[u8; 8]) -> Result<[u8; 8]> {
    des_encrypt(&expand_des_key(key7), plain)
}

pub fn des_encrypt(key8: &[u8; 8], plain: &[u8; 8]) -> Result<[u8; 8]> {
    let cipher =
        Des::new_from_slice(key8).map_err(|_| Error::CryptoFailure("invalid DES key"))?;
    let mut block = GenericArray::clone_from_slice(plain);
    cipher.encrypt_block(&mut block);
    Ok(block.into())
}
