use super::keys::reinit_sealing_key;
use super::{hmac_md5, Rc4State};
use crate::error::{Error, Result};
use crate::messages::flags::{
    Flags, NTLMSSP_NEGOTIATE_DATAGRAM, NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY,
    NTLMSSP_NEGOTIATE_KEY_EXCH,
};
use crate::messages::structures::{MessageSignature, SigningKey};

/// Computes the 16-byte signature for one application message.
///
/// Connectionless (datagram) mode never trusts the running handle: with
/// extended session security a per-sequence handle is derived from the
/// sealing key, without it the handle is re-initialized from the sealing key
/// directly. Connection mode keeps drawing from the session handle.
// TODO: track the sequence number internally for connection-oriented sessions
pub fn sign_message(
    flags: Flags,
    handle: &mut Rc4State,
    sealing_key: &[u8],
    signing_key: Option<&SigningKey>,
    sequence_number: u32,
    message: &[u8],
) -> Result<MessageSignature> {
    let mut per_message;
    let handle = if flags.has_flag(NTLMSSP_NEGOTIATE_DATAGRAM)
        && flags.has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY)
    {
        per_message = reinit_sealing_key(sealing_key, sequence_number)?;
        &mut per_message
    } else if flags.has_flag(NTLMSSP_NEGOTIATE_DATAGRAM) {
        per_message = Rc4State::init(sealing_key)?;
        &mut per_message
    } else {
        handle
    };

    if flags.has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY) {
        with_extended_session_security(flags, handle, signing_key, sequence_number, message)
    } else {
        Ok(without_extended_session_security(
            handle,
            sequence_number,
            message,
        ))
    }
}

/// version || HMAC-MD5(SigningKey, SeqNum || Message)[0..8] || SeqNum, with
/// the checksum RC4-encrypted only when a key exchange was negotiated.
fn with_extended_session_security(
    flags: Flags,
    handle: &mut Rc4State,
    signing_key: Option<&SigningKey>,
    sequence_number: u32,
    message: &[u8],
) -> Result<MessageSignature> {
    let signing_key =
        signing_key.ok_or(Error::CryptoFailure("no signing key was derived"))?;

    let mut input = Vec::with_capacity(4 + message.len());
    input.extend_from_slice(&sequence_number.to_le_bytes());
    input.extend_from_slice(message);
    let digest = hmac_md5(&signing_key[..], &input);

    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&digest[..8]);
    if flags.has_flag(NTLMSSP_NEGOTIATE_KEY_EXCH) {
        handle.apply(&mut checksum);
    }

    Ok(MessageSignature::Extended {
        checksum,
        seq_num: sequence_number,
    })
}

/// version || RC4(CRC32(Message)) || RC4(0) xor SeqNum || RC4(0). The random
/// pad input is zero; both peers must draw the same 12 bytes of keystream
/// per signature to stay aligned.
fn without_extended_session_security(
    handle: &mut Rc4State,
    sequence_number: u32,
    message: &[u8],
) -> MessageSignature {
    let mut checksum = crc32fast::hash(message).to_le_bytes();
    handle.apply(&mut checksum);

    let mut seq_num = [0u8; 4];
    handle.apply(&mut seq_num);
    for (byte, seq) in seq_num.iter_mut().zip(sequence_number.to_le_bytes()) {
        *byte ^= seq;
    }

    let mut random_pad = [0u8; 4];
    handle.apply(&mut random_pad);

    MessageSignature::Legacy {
        checksum,
        seq_num,
        random_pad,
    }
}
