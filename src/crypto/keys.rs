use super::des::des7_encrypt;
use super::{hmac_md5, md5, Rc4State};
use crate::error::{Error, Result};
use crate::messages::flags::{
    Flags, NTLMSSP_NEGOTIATE_128, NTLMSSP_NEGOTIATE_56, NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY,
    NTLMSSP_NEGOTIATE_LM_KEY, NTLMSSP_REQUEST_NON_NT_SESSION_KEY,
};
use crate::messages::structures::{
    ExportedSessionKey, KeyExchangeKey, ServerChallenge, SessionBaseKey, SigningKey,
};

/// Which half of the conversation a key protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

const CLIENT_SIGNING_MAGIC: &[u8] =
    b"session key to client-to-server signing key magic constant\0";
const SERVER_SIGNING_MAGIC: &[u8] =
    b"session key to server-to-client signing key magic constant\0";
const CLIENT_SEALING_MAGIC: &[u8] =
    b"session key to client-to-server sealing key magic constant\0";
const SERVER_SEALING_MAGIC: &[u8] =
    b"session key to server-to-client sealing key magic constant\0";

/// SIGNKEY. Only extended session security signs with a dedicated key; the
/// legacy MAC draws everything from the RC4 stream.
pub fn sign_key(
    flags: Flags,
    exported_session_key: &ExportedSessionKey,
    side: Side,
) -> Option<SigningKey> {
    if !flags.has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY) {
        return None;
    }

    let magic = match side {
        Side::Client => CLIENT_SIGNING_MAGIC,
        Side::Server => SERVER_SIGNING_MAGIC,
    };
    let mut input = Vec::with_capacity(exported_session_key.len() + magic.len());
    input.extend_from_slice(&exported_session_key[..]);
    input.extend_from_slice(magic);

    Some(md5(&input).into())
}

/// SEALKEY. Extended session security hashes a strength-limited prefix of
/// the exported session key with a per-side magic constant; the legacy modes
/// truncate and pad it instead (MS-NLMP 3.4.5.3).
pub fn seal_key(flags: Flags, exported_session_key: &ExportedSessionKey, side: Side) -> Vec<u8> {
    if flags.has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY) {
        let prefix = if flags.has_flag(NTLMSSP_NEGOTIATE_128) {
            &exported_session_key[..]
        } else if flags.has_flag(NTLMSSP_NEGOTIATE_56) {
            &exported_session_key[..7]
        } else {
            &exported_session_key[..5]
        };
        let magic = match side {
            Side::Client => CLIENT_SEALING_MAGIC,
            Side::Server => SERVER_SEALING_MAGIC,
        };
        let mut input = Vec::with_capacity(prefix.len() + magic.len());
        input.extend_from_slice(prefix);
        input.extend_from_slice(magic);
        md5(&input).to_vec()
    } else if flags.has_flag(NTLMSSP_NEGOTIATE_LM_KEY) {
        let mut key = Vec::with_capacity(8);
        if flags.has_flag(NTLMSSP_NEGOTIATE_56) {
            key.extend_from_slice(&exported_session_key[..7]);
            key.push(0xa0);
        } else {
            key.extend_from_slice(&exported_session_key[..5]);
            key.extend_from_slice(&[0xe5, 0x38, 0xb0]);
        }
        key
    } else {
        exported_session_key.to_vec()
    }
}

/// KXKEY. Under extended session security the key-exchange key mixes in both
/// challenges; otherwise it is the classic NTLMv1 construction.
pub fn kx_key(
    flags: Flags,
    session_base_key: &SessionBaseKey,
    lm_challenge_response: &[u8],
    server_challenge: &ServerChallenge,
    response_key_lm: &[u8; 16],
) -> Result<KeyExchangeKey> {
    let lm_prefix: &[u8; 8] = lm_challenge_response
        .get(..8)
        .and_then(|p| p.try_into().ok())
        .ok_or(Error::MalformedMessage("LM challenge response too short"))?;

    let mut key_exchange_key = KeyExchangeKey::default();
    if flags.has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY) {
        let mut input = [0u8; 16];
        input[..8].copy_from_slice(&server_challenge[..]);
        input[8..].copy_from_slice(lm_prefix);
        key_exchange_key.copy_from_slice(&hmac_md5(&session_base_key[..], &input));
    } else if flags.has_flag(NTLMSSP_NEGOTIATE_LM_KEY) {
        key_exchange_key[..8].copy_from_slice(&des7_encrypt(&response_key_lm[..7], lm_prefix)?);
        let key = [
            response_key_lm[7],
            0xbd,
            0xbd,
            0xbd,
            0xbd,
            0xbd,
            0xbd,
        ];
        key_exchange_key[8..].copy_from_slice(&des7_encrypt(&key, lm_prefix)?);
    } else if flags.has_flag(NTLMSSP_REQUEST_NON_NT_SESSION_KEY) {
        key_exchange_key[..8].copy_from_slice(&response_key_lm[..8]);
    } else {
        key_exchange_key.copy_from_slice(&session_base_key[..]);
    }

    Ok(key_exchange_key)
}

/// Connectionless mode re-keys RC4 for every message: the per-message key is
/// HMAC-MD5 of the sealing key over the little-endian sequence number.
pub fn reinit_sealing_key(sealing_key: &[u8], sequence_number: u32) -> Result<Rc4State> {
    let per_message = hmac_md5(sealing_key, &sequence_number.to_le_bytes());
    Rc4State::init(&per_message)
}
