//! NTLMv1 client and server sessions, including the NTLM2 session security
//! ("extended session security") variant.

use rand::RngCore;

use super::{default_rng, SessionData, SessionState};
use crate::crypto::keys::{kx_key, Side};
use crate::crypto::lm::lmowfv1;
use crate::crypto::nt::ntowfv1;
use crate::crypto::ntlmv1;
use crate::error::{Error, Result};
use crate::messages::flags::{
    Flags, NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY, NTLMSSP_NEGOTIATE_NTLM,
    NTLMSSP_NEGOTIATE_UNICODE,
};
use crate::messages::structures::{ClientChallenge, ServerChallenge, Version};
use crate::messages::{AuthenticateMessage, ChallengeMessage, NegotiateMessage, Wire};

fn fetch_response_keys(data: &mut SessionData) -> Result<()> {
    data.response_key_lm = lmowfv1(&data.password)?;
    data.response_key_nt = ntowfv1(&data.password);
    Ok(())
}

fn compute_expected_responses(data: &mut SessionData) -> Result<()> {
    let (lm, nt, session_base_key) = ntlmv1::compute_response(
        data.negotiate_flags,
        &data.response_key_nt,
        &data.response_key_lm,
        &data.server_challenge,
        &data.client_challenge,
        data.no_lm_response_ntlm_v1,
    )?;
    data.lm_challenge_response = lm.serialize();
    data.nt_challenge_response = nt.serialize();
    data.session_base_key = session_base_key;
    Ok(())
}

fn compute_key_exchange_key(data: &mut SessionData) -> Result<()> {
    data.key_exchange_key = kx_key(
        data.negotiate_flags,
        &data.session_base_key,
        &data.lm_challenge_response,
        &data.server_challenge,
        &data.response_key_lm,
    )?;
    Ok(())
}

pub struct V1ServerSession {
    data: SessionData,
    state: SessionState,
    rng: Box<dyn RngCore>,
}

impl Default for V1ServerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl V1ServerSession {
    pub fn new() -> Self {
        Self::with_rng(default_rng())
    }

    pub fn with_rng(rng: Box<dyn RngCore>) -> Self {
        Self {
            data: SessionData::default(),
            state: SessionState::default(),
            rng,
        }
    }

    pub fn session_data(&self) -> &SessionData {
        &self.data
    }

    pub fn session_data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    /// Seed the challenge out-of-band instead of generating one.
    pub fn set_server_challenge(&mut self, challenge: ServerChallenge) {
        self.data.server_challenge = challenge;
    }

    pub fn process_negotiate(&mut self, message: NegotiateMessage) -> Result<()> {
        if self.state != SessionState::New {
            return Err(Error::InvalidState("NEGOTIATE only opens a fresh session"));
        }
        self.data.negotiate_message = Some(message);
        self.state = SessionState::NegotiateReceived;
        Ok(())
    }

    /// A minimal v1 challenge: a fresh server challenge under the classic
    /// flag word, no target info.
    pub fn generate_challenge(&mut self) -> Result<ChallengeMessage> {
        match self.state {
            SessionState::New | SessionState::NegotiateReceived => {}
            _ => return Err(Error::InvalidState("challenge was already issued")),
        }

        self.data.server_challenge = ServerChallenge::random(&mut *self.rng);

        let mut flags = Flags(NTLMSSP_NEGOTIATE_UNICODE);
        flags.set_flag(NTLMSSP_NEGOTIATE_NTLM);

        self.state = SessionState::ChallengeSent;
        Ok(ChallengeMessage {
            negotiate_flags: flags,
            server_challenge: self.data.server_challenge.clone(),
            target_name: None,
            target_info: Vec::new(),
            target_info_payload: Vec::new(),
            version: Some(Version::default()),
        })
    }

    pub fn process_authenticate(&mut self, mut message: AuthenticateMessage) -> Result<()> {
        if self.state == SessionState::Authenticated {
            return Err(Error::InvalidState("session is already authenticated"));
        }

        self.data.negotiate_flags = message.negotiate_flags;
        self.data.client_challenge = message.client_challenge().unwrap_or_default();
        self.data.take_encrypted_session_key(&message)?;
        self.data.adopt_identity(&message);

        fetch_response_keys(&mut self.data)?;
        compute_expected_responses(&mut self.data)?;
        compute_key_exchange_key(&mut self.data)?;

        // Under extended session security both sides trivially agree on the
        // LM response, so falling back to it would accept anything.
        let disallow_lm_fallback = self
            .data
            .negotiate_flags
            .has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY);
        self.data.verify_responses(&message, disallow_lm_fallback)?;

        self.data.save_mic(&mut message);
        self.data.compute_exported_session_key()?;

        if message.version.is_none() {
            log::warn!("AUTHENTICATE carried no version, assuming the default");
            message.version = Some(Version::default());
        }

        self.data.calculate_keys();
        self.data.init_handles()?;
        self.data.authenticate_message = Some(message);
        self.state = SessionState::Authenticated;
        Ok(())
    }

    pub fn mac(&mut self, message: &[u8], sequence_number: u32) -> Result<[u8; 16]> {
        self.data.mac(Side::Server, message, sequence_number)
    }

    pub fn verify_mac(
        &mut self,
        message: &[u8],
        expected: &[u8],
        sequence_number: u32,
    ) -> Result<bool> {
        self.data
            .verify_mac(Side::Client, message, expected, sequence_number)
    }

    pub fn seal(&mut self, _message: &[u8]) -> Result<Vec<u8>> {
        Err(Error::UnsupportedMode("sealing is not implemented"))
    }

    pub fn sign(&mut self, _message: &[u8]) -> Result<Vec<u8>> {
        Err(Error::UnsupportedMode("use mac() with an explicit sequence number"))
    }
}

pub struct V1ClientSession {
    data: SessionData,
    state: SessionState,
    rng: Box<dyn RngCore>,
}

impl Default for V1ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl V1ClientSession {
    pub fn new() -> Self {
        Self::with_rng(default_rng())
    }

    pub fn with_rng(rng: Box<dyn RngCore>) -> Self {
        Self {
            data: SessionData::default(),
            state: SessionState::default(),
            rng,
        }
    }

    pub fn session_data(&self) -> &SessionData {
        &self.data
    }

    pub fn session_data_mut(&mut self) -> &mut SessionData {
        &mut self.data
    }

    pub fn generate_negotiate(&mut self) -> Result<NegotiateMessage> {
        Err(Error::UnsupportedMode(
            "client NEGOTIATE generation is not implemented",
        ))
    }

    pub fn process_challenge(&mut self, message: ChallengeMessage) -> Result<()> {
        if self.state != SessionState::New {
            return Err(Error::InvalidState("a challenge was already processed"));
        }

        self.data.server_challenge = message.server_challenge.clone();
        self.data.client_challenge = ClientChallenge::random(&mut *self.rng);
        self.data.negotiate_flags = message.negotiate_flags;

        fetch_response_keys(&mut self.data)?;
        compute_expected_responses(&mut self.data)?;
        compute_key_exchange_key(&mut self.data)?;
        self.data.compute_encrypted_session_key(&mut *self.rng)?;
        self.data.calculate_keys();
        self.data.init_handles()?;

        self.data.challenge_message = Some(message);
        self.state = SessionState::ChallengeReceived;
        Ok(())
    }

    pub fn generate_authenticate(&mut self) -> Result<AuthenticateMessage> {
        if self.state != SessionState::ChallengeReceived {
            return Err(Error::InvalidState(
                "AUTHENTICATE can only follow a processed challenge",
            ));
        }

        let message = AuthenticateMessage {
            negotiate_flags: self.data.negotiate_flags,
            lm_challenge_response: self.data.lm_challenge_response.clone(),
            nt_challenge_response: self.data.nt_challenge_response.clone(),
            domain: self.data.user_domain.clone(),
            user: self.data.user.clone(),
            workstation: self.data.workstation.clone(),
            encrypted_random_session_key: self.data.encrypted_random_session_key.to_vec(),
            version: Some(Version::default()),
            mic: [0u8; 16],
        };
        self.state = SessionState::Authenticated;
        Ok(message)
    }

    pub fn mac(&mut self, message: &[u8], sequence_number: u32) -> Result<[u8; 16]> {
        self.data.mac(Side::Client, message, sequence_number)
    }

    pub fn verify_mac(
        &mut self,
        message: &[u8],
        expected: &[u8],
        sequence_number: u32,
    ) -> Result<bool> {
        self.data
            .verify_mac(Side::Server, message, expected, sequence_number)
    }

    pub fn seal(&mut self, _message: &[u8]) -> Result<Vec<u8>> {
        Err(Error::UnsupportedMode("sealing is not implemented"))
    }

    pub fn sign(&mut self, _message: &[u8]) -> Result<Vec<u8>> {
        Err(Error::UnsupportedMode("use mac() with an explicit sequence number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::flags::NTLMSSP_NEGOTIATE_KEY_EXCH;
    use crate::session::tests::FixedRng;

    fn classic_challenge(flags: Flags) -> ChallengeMessage {
        ChallengeMessage {
            negotiate_flags: flags,
            server_challenge: [0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef].into(),
            ..Default::default()
        }
    }

    fn run_handshake(mut flags: Flags) -> (V1ClientSession, V1ServerSession) {
        flags.set_flag(NTLMSSP_NEGOTIATE_NTLM);
        flags.set_flag(NTLMSSP_NEGOTIATE_UNICODE);

        let mut client = V1ClientSession::with_rng(Box::new(FixedRng(0xaa)));
        client
            .session_data_mut()
            .set_user_info("User", "Password", "Domain", "COMPUTER");
        client.process_challenge(classic_challenge(flags)).unwrap();
        let authenticate = client.generate_authenticate().unwrap();

        let mut server = V1ServerSession::with_rng(Box::new(FixedRng(0x55)));
        server.set_server_challenge([0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef].into());
        server.session_data_mut().password = "Password".into();
        server.process_authenticate(authenticate).unwrap();

        (client, server)
    }

    #[test]
    fn classic_round_trip() {
        let (client, server) = run_handshake(Flags(0));
        let (c, s) = (client.session_data(), server.session_data());

        assert_eq!(c.nt_challenge_response.len(), 24);
        assert_eq!(c.lm_challenge_response.len(), 24);
        pretty_assertions::assert_eq!(c.nt_challenge_response, s.nt_challenge_response);
        pretty_assertions::assert_eq!(c.lm_challenge_response, s.lm_challenge_response);
        pretty_assertions::assert_eq!(c.key_exchange_key, s.key_exchange_key);
        pretty_assertions::assert_eq!(c.exported_session_key, s.exported_session_key);
        pretty_assertions::assert_eq!(c.client_sealing_key, s.client_sealing_key);
        pretty_assertions::assert_eq!(c.server_sealing_key, s.server_sealing_key);
    }

    #[test]
    fn key_exchange_round_trip() {
        let (client, server) = run_handshake(Flags(NTLMSSP_NEGOTIATE_KEY_EXCH));
        // the client picked the random session key, the server decrypted it
        pretty_assertions::assert_eq!(
            client.session_data().exported_session_key,
            server.session_data().exported_session_key,
        );
        pretty_assertions::assert_eq!(
            client.session_data().exported_session_key,
            [0xaa; 16].into(),
        );
    }

    #[test]
    fn extended_session_security_round_trip() {
        let mut flags = Flags(NTLMSSP_NEGOTIATE_KEY_EXCH);
        flags.set_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY);
        let (client, server) = run_handshake(flags);

        let (c, s) = (client.session_data(), server.session_data());
        pretty_assertions::assert_eq!(c.key_exchange_key, s.key_exchange_key);
        pretty_assertions::assert_eq!(c.client_signing_key, s.client_signing_key);
        pretty_assertions::assert_eq!(c.server_signing_key, s.server_signing_key);
        assert!(c.client_signing_key.is_some());
        // the LM response degrades to the padded client challenge
        pretty_assertions::assert_eq!(&c.lm_challenge_response[..8], &[0xaa; 8]);
        pretty_assertions::assert_eq!(&c.lm_challenge_response[8..], &[0u8; 16]);
    }

    #[test]
    fn legacy_mac_round_trip() {
        let (mut client, mut server) = run_handshake(Flags(0));

        let signature = client.mac(b"first message", 0).unwrap();
        assert!(server.verify_mac(b"first message", &signature, 0).unwrap());

        let signature = client.mac(b"second message", 1).unwrap();
        assert!(server.verify_mac(b"second message", &signature, 1).unwrap());

        let signature = server.mac(b"a reply", 0).unwrap();
        assert!(client.verify_mac(b"a reply", &signature, 0).unwrap());
    }

    #[test]
    fn legacy_mac_rejects_a_tampered_message() {
        let (mut client, mut server) = run_handshake(Flags(0));
        let signature = client.mac(b"first message", 0).unwrap();
        assert!(!server.verify_mac(b"fIrst message", &signature, 0).unwrap());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let mut client = V1ClientSession::with_rng(Box::new(FixedRng(0xaa)));
        client.session_data_mut().password = "Password".into();
        client.process_challenge(classic_challenge(Flags(NTLMSSP_NEGOTIATE_NTLM)))
            .unwrap();
        let authenticate = client.generate_authenticate().unwrap();

        let mut server = V1ServerSession::new();
        server.set_server_challenge([0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef].into());
        server.session_data_mut().password = "NotThePassword".into();
        pretty_assertions::assert_eq!(
            server.process_authenticate(authenticate).unwrap_err(),
            Error::AuthenticationFailed
        );
    }

    #[test]
    fn lm_fallback_is_disallowed_under_extended_session_security() {
        let mut flags = Flags(NTLMSSP_NEGOTIATE_NTLM);
        flags.set_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY);

        let mut client = V1ClientSession::with_rng(Box::new(FixedRng(0xaa)));
        client.session_data_mut().password = "Password".into();
        client.process_challenge(classic_challenge(flags)).unwrap();
        let mut authenticate = client.generate_authenticate().unwrap();
        // corrupt the NT response: the matching LM response must not save it
        authenticate.nt_challenge_response[0] ^= 1;

        let mut server = V1ServerSession::new();
        server.set_server_challenge([0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef].into());
        server.session_data_mut().password = "Password".into();
        pretty_assertions::assert_eq!(
            server.process_authenticate(authenticate).unwrap_err(),
            Error::AuthenticationFailed
        );
    }

    #[test]
    fn no_lm_response_option_mirrors_the_nt_response() {
        let mut client = V1ClientSession::with_rng(Box::new(FixedRng(0xaa)));
        client.session_data_mut().password = "Password".into();
        client.session_data_mut().no_lm_response_ntlm_v1 = true;
        client.process_challenge(classic_challenge(Flags(NTLMSSP_NEGOTIATE_NTLM)))
            .unwrap();

        let data = client.session_data();
        pretty_assertions::assert_eq!(data.lm_challenge_response, data.nt_challenge_response);
    }

    #[test]
    fn lifecycle_is_linear() {
        let mut client = V1ClientSession::new();
        assert!(matches!(
            client.generate_authenticate().unwrap_err(),
            Error::InvalidState(_)
        ));

        client.session_data_mut().password = "Password".into();
        client.process_challenge(classic_challenge(Flags(NTLMSSP_NEGOTIATE_NTLM)))
            .unwrap();
        assert!(matches!(
            client.process_challenge(classic_challenge(Flags(NTLMSSP_NEGOTIATE_NTLM))),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn negotiate_generation_is_a_stub() {
        let mut client = V1ClientSession::new();
        assert!(matches!(
            client.generate_negotiate().unwrap_err(),
            Error::UnsupportedMode(_)
        ));
    }

    #[test]
    fn minimal_challenge_generation() {
        let mut server = V1ServerSession::with_rng(Box::new(FixedRng(0x17)));
        let challenge = server.generate_challenge().unwrap();
        pretty_assertions::assert_eq!(challenge.server_challenge, [0x17; 8].into());
        assert!(challenge.negotiate_flags.has_flag(NTLMSSP_NEGOTIATE_NTLM));
        assert!(challenge.target_info_payload.is_empty());
    }
}
