//! NTLMv2 client and server sessions.

use rand::RngCore;

use super::{default_rng, SessionData, SessionState, SystemClock, TimeSource};
use crate::crypto::keys::Side;
use crate::crypto::lm::lmowfv2;
use crate::crypto::nt::ntowfv2;
use crate::crypto::ntlmv2;
use crate::error::{Error, Result};
use crate::messages::flags::{
    Flags, NTLMSSP_NEGOTIATE_128, NTLMSSP_NEGOTIATE_ALWAYS_SIGN, NTLMSSP_NEGOTIATE_DATAGRAM,
    NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY, NTLMSSP_NEGOTIATE_IDENTIFY,
    NTLMSSP_NEGOTIATE_KEY_EXCH, NTLMSSP_NEGOTIATE_NTLM, NTLMSSP_NEGOTIATE_SIGN,
    NTLMSSP_NEGOTIATE_TARGET_INFO, NTLMSSP_NEGOTIATE_UNICODE, NTLMSSP_NEGOTIATE_VERSION,
    NTLMSSP_REQUEST_TARGET,
};
use crate::messages::structures::{
    AvPair, ClientChallenge, FileTime, KeyExchangeKey, Ntv2Response, ServerChallenge, Version,
};
use crate::messages::{AuthenticateMessage, ChallengeMessage, NegotiateMessage, Wire};

fn fetch_response_keys(data: &mut SessionData) {
    data.response_key_lm = lmowfv2(&data.user, &data.password, &data.user_domain);
    data.response_key_nt = ntowfv2(&data.user, &data.password, &data.user_domain);
}

fn compute_expected_responses(
    data: &mut SessionData,
    timestamp: FileTime,
    av_pairs_payload: &[u8],
) -> Result<()> {
    let (nt_proof_str, lm, challenge, session_base_key) = ntlmv2::compute_response(
        &data.response_key_nt,
        &data.response_key_lm,
        &data.server_challenge,
        &data.client_challenge,
        timestamp,
        av_pairs_payload,
    )?;
    data.nt_challenge_response = Ntv2Response {
        nt_proof_str,
        challenge,
    }
    .serialize();
    data.lm_challenge_response = lm.serialize();
    data.session_base_key = session_base_key;
    Ok(())
}

/// v2 short-circuits the key-exchange key to the session base key.
fn compute_key_exchange_key(data: &mut SessionData) {
    data.key_exchange_key = KeyExchangeKey::from(*data.session_base_key.as_bytes());
}

pub struct V2ServerSession {
    data: SessionData,
    state: SessionState,
    target_info: Vec<AvPair>,
    rng: Box<dyn RngCore>,
}

impl Default for V2ServerSession {
    fn default() -> Self {
        Self::new()
    }
}

impl V2ServerSession {
    pub fn new() -> Self {
        Self::with_rng(default_rng())
    }

    pub fn with_rng(rng: Box<dyn RngCore>) -> Self {
        Self {
            data: SessionData::default(),
            state: SessionState::default(),
            target_info: Vec::new(),
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

    /// Appends one TargetInfo entry, keeping the list EOL-terminated.
    pub fn add_target_info(&mut self, pair: AvPair) -> &mut Self {
        if self.target_info.is_empty() {
            self.target_info.push(pair);
            self.target_info.push(AvPair::MsvAvEOL);
        } else {
            let index = self.target_info.len() - 1;
            self.target_info.insert(index, pair);
        }
        self
    }

    pub fn target_info_add_domain_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_target_info(AvPair::MsvAvNbDomainName(name.into()))
    }

    pub fn target_info_add_computer_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_target_info(AvPair::MsvAvNbComputerName(name.into()))
    }

    pub fn target_info_add_dns_domain_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_target_info(AvPair::MsvAvDnsDomainName(name.into()))
    }

    pub fn target_info_add_dns_computer_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_target_info(AvPair::MsvAvDnsComputerName(name.into()))
    }

    pub fn target_info_add_dns_tree_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_target_info(AvPair::MsvAvDnsTreeName(name.into()))
    }

    pub fn process_negotiate(&mut self, message: NegotiateMessage) -> Result<()> {
        if self.state != SessionState::New {
            return Err(Error::InvalidState("NEGOTIATE only opens a fresh session"));
        }
        self.data.negotiate_message = Some(message);
        self.state = SessionState::NegotiateReceived;
        Ok(())
    }

    pub fn generate_challenge(&mut self) -> Result<ChallengeMessage> {
        match self.state {
            SessionState::New | SessionState::NegotiateReceived => {}
            _ => return Err(Error::InvalidState("challenge was already issued")),
        }

        self.data.server_challenge = ServerChallenge::random(&mut *self.rng);

        let mut flags = Flags(NTLMSSP_NEGOTIATE_UNICODE);
        flags.set_flag(NTLMSSP_NEGOTIATE_KEY_EXCH);
        flags.set_flag(NTLMSSP_NEGOTIATE_VERSION);
        flags.set_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY);
        flags.set_flag(NTLMSSP_NEGOTIATE_TARGET_INFO);
        flags.set_flag(NTLMSSP_NEGOTIATE_IDENTIFY);
        flags.set_flag(NTLMSSP_NEGOTIATE_ALWAYS_SIGN);
        flags.set_flag(NTLMSSP_NEGOTIATE_NTLM);
        flags.set_flag(NTLMSSP_NEGOTIATE_DATAGRAM);
        flags.set_flag(NTLMSSP_NEGOTIATE_SIGN);
        flags.set_flag(NTLMSSP_REQUEST_TARGET);
        flags.set_flag(NTLMSSP_NEGOTIATE_128);

        let mut target_info = self.target_info.clone();
        if target_info.is_empty() {
            target_info.push(AvPair::MsvAvEOL);
        }
        let target_info_payload = target_info.serialize();

        self.state = SessionState::ChallengeSent;
        Ok(ChallengeMessage {
            negotiate_flags: flags,
            server_challenge: self.data.server_challenge.clone(),
            target_name: None,
            target_info,
            target_info_payload,
            version: Some(Version::default()),
        })
    }

    pub fn process_authenticate(&mut self, mut message: AuthenticateMessage) -> Result<()> {
        if self.state == SessionState::Authenticated {
            return Err(Error::InvalidState("session is already authenticated"));
        }

        self.data.negotiate_flags = message.negotiate_flags;

        // the client's timestamp and AV_PAIRs are echoed back from inside
        // the NTLMv2 response blob
        let response = message.ntlm_v2_response()?;
        self.data.client_challenge = response.challenge.challenge_from_client.clone();

        self.data.take_encrypted_session_key(&message)?;
        self.data.adopt_identity(&message);

        fetch_response_keys(&mut self.data);
        compute_expected_responses(
            &mut self.data,
            response.challenge.timestamp,
            &response.challenge.av_pairs_payload,
        )?;
        self.data.verify_responses(&message, false)?;

        compute_key_exchange_key(&mut self.data);
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

pub struct V2ClientSession {
    data: SessionData,
    state: SessionState,
    rng: Box<dyn RngCore>,
    clock: Box<dyn TimeSource>,
}

impl Default for V2ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl V2ClientSession {
    pub fn new() -> Self {
        Self::with_sources(default_rng(), Box::new(SystemClock))
    }

    pub fn with_sources(rng: Box<dyn RngCore>, clock: Box<dyn TimeSource>) -> Self {
        Self {
            data: SessionData::default(),
            state: SessionState::default(),
            rng,
            clock,
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

        fetch_response_keys(&mut self.data);

        let av_pairs_payload = if message
            .negotiate_flags
            .has_flag(NTLMSSP_NEGOTIATE_TARGET_INFO)
        {
            message.target_info_payload.clone()
        } else {
            Vec::new()
        };
        let timestamp = self.clock.now();
        compute_expected_responses(&mut self.data, timestamp, &av_pairs_payload)?;

        compute_key_exchange_key(&mut self.data);
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
            // the MIC slot stays zeroed; a caller computing the MIC
            // externally fills it in afterwards
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
    use crate::session::tests::{FixedClock, FixedRng};

    fn seeded_server() -> V2ServerSession {
        let mut server = V2ServerSession::with_rng(Box::new(FixedRng(0x01)));
        server
            .target_info_add_domain_name("Domain")
            .target_info_add_computer_name("Server");
        server.session_data_mut().password = "Password".into();
        server
    }

    fn seeded_client() -> V2ClientSession {
        let mut client = V2ClientSession::with_sources(
            Box::new(FixedRng(0xaa)),
            Box::new(FixedClock(FileTime::default())),
        );
        client
            .session_data_mut()
            .set_user_info("User", "Password", "Domain", "COMPUTER");
        client
    }

    fn run_handshake() -> (V2ClientSession, V2ServerSession) {
        let mut server = seeded_server();
        let challenge = server.generate_challenge().unwrap();

        let mut client = seeded_client();
        client.process_challenge(challenge).unwrap();
        let authenticate = client.generate_authenticate().unwrap();
        server.process_authenticate(authenticate).unwrap();

        (client, server)
    }

    #[test]
    fn challenge_carries_the_negotiated_defaults() {
        let mut server = seeded_server();
        let challenge = server.generate_challenge().unwrap();

        for flag in [
            NTLMSSP_NEGOTIATE_KEY_EXCH,
            NTLMSSP_NEGOTIATE_VERSION,
            NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY,
            NTLMSSP_NEGOTIATE_TARGET_INFO,
            NTLMSSP_NEGOTIATE_IDENTIFY,
            NTLMSSP_NEGOTIATE_ALWAYS_SIGN,
            NTLMSSP_NEGOTIATE_NTLM,
            NTLMSSP_NEGOTIATE_DATAGRAM,
            NTLMSSP_NEGOTIATE_SIGN,
            NTLMSSP_REQUEST_TARGET,
            NTLMSSP_NEGOTIATE_UNICODE,
            NTLMSSP_NEGOTIATE_128,
        ] {
            assert!(challenge.negotiate_flags.has_flag(flag));
        }

        pretty_assertions::assert_eq!(challenge.server_challenge, [0x01; 8].into());
        pretty_assertions::assert_eq!(challenge.version, Some(Version::default()));
        // the payload ends with the EOL terminator
        pretty_assertions::assert_eq!(
            &challenge.target_info_payload[challenge.target_info_payload.len() - 4..],
            &[0, 0, 0, 0]
        );
    }

    #[test]
    fn full_round_trip_derives_identical_material() {
        let (client, server) = run_handshake();
        let (c, s) = (client.session_data(), server.session_data());

        pretty_assertions::assert_eq!(c.nt_challenge_response, s.nt_challenge_response);
        pretty_assertions::assert_eq!(c.lm_challenge_response, s.lm_challenge_response);
        pretty_assertions::assert_eq!(c.session_base_key, s.session_base_key);
        pretty_assertions::assert_eq!(c.key_exchange_key, s.key_exchange_key);
        pretty_assertions::assert_eq!(c.exported_session_key, s.exported_session_key);
        pretty_assertions::assert_eq!(c.client_signing_key, s.client_signing_key);
        pretty_assertions::assert_eq!(c.server_signing_key, s.server_signing_key);
        pretty_assertions::assert_eq!(c.client_sealing_key, s.client_sealing_key);
        pretty_assertions::assert_eq!(c.server_sealing_key, s.server_sealing_key);

        // KEY_EXCH was negotiated, so the client picked the session key
        pretty_assertions::assert_eq!(c.exported_session_key, [0xaa; 16].into());
        assert!(c.client_signing_key.is_some());

        // response shapes
        assert_eq!(c.lm_challenge_response.len(), 24);
        assert!(c.nt_challenge_response.len() >= 16 + 28 + 4);
    }

    #[test]
    fn v2_key_exchange_key_is_the_session_base_key() {
        let (client, _) = run_handshake();
        let data = client.session_data();
        pretty_assertions::assert_eq!(
            data.key_exchange_key.as_bytes(),
            data.session_base_key.as_bytes()
        );
    }

    #[test]
    fn mac_round_trip_both_directions() {
        let (mut client, mut server) = run_handshake();

        for seq in [0u32, 1, 7, u32::MAX] {
            let signature = client.mac(b"application payload", seq).unwrap();
            assert!(server
                .verify_mac(b"application payload", &signature, seq)
                .unwrap());

            let signature = server.mac(b"server payload", seq).unwrap();
            assert!(client.verify_mac(b"server payload", &signature, seq).unwrap());
        }
    }

    #[test]
    fn mac_rejects_tampering() {
        let (mut client, mut server) = run_handshake();
        let signature = client.mac(b"application payload", 3).unwrap();

        // flipped message bit
        assert!(!server
            .verify_mac(b"application payloae", &signature, 3)
            .unwrap());
        // wrong sequence number
        assert!(!server
            .verify_mac(b"application payload", &signature, 4)
            .unwrap());
        // flipped signature bit
        let mut tampered = signature;
        tampered[5] ^= 0x80;
        assert!(!server
            .verify_mac(b"application payload", &tampered, 3)
            .unwrap());
        // short signature
        assert!(!server
            .verify_mac(b"application payload", &signature[..8], 3)
            .unwrap());
        // the original still verifies
        assert!(server
            .verify_mac(b"application payload", &signature, 3)
            .unwrap());
    }

    #[test]
    fn server_echoes_the_client_timestamp_and_av_pairs() {
        let (client, server) = run_handshake();
        let message = server.session_data().authenticate_message.as_ref().unwrap();
        let response = message.ntlm_v2_response().unwrap();

        pretty_assertions::assert_eq!(response.challenge.timestamp, FileTime::default());
        pretty_assertions::assert_eq!(
            response.challenge.av_pairs_payload,
            client
                .session_data()
                .challenge_message
                .as_ref()
                .unwrap()
                .target_info_payload
        );
    }

    #[test]
    fn mic_is_saved_and_zeroed() {
        let mut server = seeded_server();
        let challenge = server.generate_challenge().unwrap();

        let mut client = seeded_client();
        client.process_challenge(challenge).unwrap();
        let mut authenticate = client.generate_authenticate().unwrap();
        authenticate.mic = [0x42; 16];

        server.process_authenticate(authenticate).unwrap();
        pretty_assertions::assert_eq!(server.session_data().mic, [0x42; 16]);
        pretty_assertions::assert_eq!(
            server
                .session_data()
                .authenticate_message
                .as_ref()
                .unwrap()
                .mic,
            [0u8; 16]
        );
    }

    #[test]
    fn missing_version_is_synthesized() {
        let mut server = seeded_server();
        let challenge = server.generate_challenge().unwrap();

        let mut client = seeded_client();
        client.process_challenge(challenge).unwrap();
        let mut authenticate = client.generate_authenticate().unwrap();
        authenticate.version = None;

        server.process_authenticate(authenticate).unwrap();
        pretty_assertions::assert_eq!(
            server
                .session_data()
                .authenticate_message
                .as_ref()
                .unwrap()
                .version,
            Some(Version::default())
        );
    }

    #[test]
    fn wrong_password_is_rejected() {
        let mut server = seeded_server();
        server.session_data_mut().password = "NotThePassword".into();
        let challenge = server.generate_challenge().unwrap();

        let mut client = seeded_client();
        client.process_challenge(challenge).unwrap();
        let authenticate = client.generate_authenticate().unwrap();

        pretty_assertions::assert_eq!(
            server.process_authenticate(authenticate).unwrap_err(),
            Error::AuthenticationFailed
        );
    }

    #[test]
    fn v1_response_payload_is_malformed_for_a_v2_server() {
        let mut server = seeded_server();
        let _ = server.generate_challenge().unwrap();

        let message = AuthenticateMessage {
            nt_challenge_response: vec![0x11; 24],
            lm_challenge_response: vec![0x22; 24],
            ..Default::default()
        };
        assert!(matches!(
            server.process_authenticate(message).unwrap_err(),
            Error::MalformedMessage(_)
        ));
    }

    #[test]
    fn authenticating_twice_is_an_error() {
        let (_, mut server) = run_handshake();
        let message = AuthenticateMessage::default();
        assert!(matches!(
            server.process_authenticate(message).unwrap_err(),
            Error::InvalidState(_)
        ));
    }
}
