use super::hmac_md5;
use super::lm::LmHash;
use super::nt::NtHash;
use crate::error::Result;
use crate::messages::structures::{
    ClientChallenge, FileTime, Lmv2Challenge, NtProofStr, Ntv2Challenge, Response16,
    ServerChallenge, SessionBaseKey,
};
use crate::messages::Wire;

/// NTLMv2 challenge responses and session base key.
///
/// `av_pairs_payload` is the AV_PAIR list exactly as it travels on the wire
/// (the server's TargetInfo payload, echoed back by the client inside the
/// response blob); the core never reinterprets it.
pub fn compute_response(
    response_key_nt: &NtHash,
    response_key_lm: &LmHash,
    server_challenge: &ServerChallenge,
    client_challenge: &ClientChallenge,
    timestamp: FileTime,
    av_pairs_payload: &[u8],
) -> Result<(NtProofStr, Lmv2Challenge, Ntv2Challenge, SessionBaseKey)> {
    let nt_challenge = Ntv2Challenge {
        timestamp,
        challenge_from_client: client_challenge.clone(),
        av_pairs_payload: av_pairs_payload.to_vec(),
    };
    let mut temp = nt_challenge.serialize();
    temp.extend_from_slice(&[0, 0, 0, 0]);

    let mut input = Vec::with_capacity(8 + temp.len());
    input.extend_from_slice(&server_challenge[..]);
    input.extend_from_slice(&temp);
    let nt_proof_str: NtProofStr = hmac_md5(&response_key_nt[..], &input).into();

    let mut challenges = [0u8; 16];
    challenges[..8].copy_from_slice(&server_challenge[..]);
    challenges[8..].copy_from_slice(&client_challenge[..]);
    let response: Response16 = hmac_md5(&response_key_lm[..], &challenges).into();

    let lm_challenge = Lmv2Challenge {
        response,
        challenge_from_client: client_challenge.clone(),
    };

    let session_base_key: SessionBaseKey =
        hmac_md5(&response_key_nt[..], &nt_proof_str[..]).into();

    Ok((nt_proof_str, lm_challenge, nt_challenge, session_base_key))
}
