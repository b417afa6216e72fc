use super::lm::LmHash;
use super::nt::NtHash;
use super::{desl, md4, md5};
use crate::error::Result;
use crate::messages::flags::{Flags, NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY};
use crate::messages::structures::{
    ClientChallenge, Lmv1Challenge, Ntv1Challenge, ServerChallenge, SessionBaseKey,
};

/// NTLMv1 challenge responses and session base key.
///
/// With extended session security the NT response covers a hash of both
/// challenges and the LM response degrades to the bare client challenge;
/// the classic path DES-encrypts the server challenge directly.
/// `no_lm_response` substitutes the NT response for the LM response on the
/// classic path (MS-NLMP `NoLMResponseNTLMv1`).
pub fn compute_response(
    flags: Flags,
    response_key_nt: &NtHash,
    response_key_lm: &LmHash,
    server_challenge: &ServerChallenge,
    client_challenge: &ClientChallenge,
    no_lm_response: bool,
) -> Result<(Lmv1Challenge, Ntv1Challenge, SessionBaseKey)> {
    let session_base_key: SessionBaseKey = md4(&response_key_nt[..]).into();

    if flags.has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY) {
        let mut challenges = [0u8; 16];
        challenges[..8].copy_from_slice(&server_challenge[..]);
        challenges[8..].copy_from_slice(&client_challenge[..]);
        let digest = md5(&challenges);

        let mut data = [0u8; 8];
        data.copy_from_slice(&digest[..8]);

        let nt_response = Ntv1Challenge {
            response: desl(response_key_nt, &data)?,
        };
        let lm_response = Lmv1Challenge::from_client_challenge(client_challenge);
        Ok((lm_response, nt_response, session_base_key))
    } else {
        let nt_response = Ntv1Challenge {
            response: desl(response_key_nt, server_challenge.as_bytes())?,
        };
        let lm_response = if no_lm_response {
            Lmv1Challenge {
                response: nt_response.response.clone(),
            }
        } else {
            Lmv1Challenge {
                response: desl(response_key_lm, server_challenge.as_bytes())?,
            }
        };
        Ok((lm_response, nt_response, session_base_key))
    }
}
