//! Client and server session state machines for NTLM v1 and v2.
//!
//! A session is a passive object: the caller drives it through the
//! Negotiate -> Challenge -> Authenticate sequence and each transition
//! advances the session's key material. Sessions mutate their RC4 handles on
//! every signing call and are therefore not safe for concurrent use; keep
//! one session per thread or serialize access.

use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::crypto::keys::{self, Side};
use crate::crypto::{mac, rc4k, Rc4State};
use crate::error::{Error, Result};
use crate::messages::flags::{Flags, NTLMSSP_NEGOTIATE_KEY_EXCH};
use crate::messages::structures::{
    ClientChallenge, EncryptedRandomSessionKey, ExportedSessionKey, FileTime, KeyExchangeKey,
    MessageSignature, ServerChallenge, SessionBaseKey, SigningKey,
};
use crate::messages::{AuthenticateMessage, ChallengeMessage, NegotiateMessage};

pub mod v1;
pub mod v2;

pub use v1::{V1ClientSession, V1ServerSession};
pub use v2::{V2ClientSession, V2ServerSession};

/// Transport style of the conversation the session protects.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[default]
    ConnectionOriented,
    Connectionless,
}

/// Injectable wall clock, so tests can pin the NTLMv2 timestamp.
pub trait TimeSource {
    fn now(&mut self) -> FileTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now(&mut self) -> FileTime {
        FileTime::now()
    }
}

/// Where a session is in its linear lifecycle. No transition goes backward.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    #[default]
    New,
    NegotiateReceived,
    ChallengeSent,
    ChallengeReceived,
    Authenticated,
}

/// Everything a session derives and caches. A plain aggregate: the concrete
/// session types own one each and nothing is shared between sessions.
#[derive(Default)]
pub struct SessionData {
    pub user: String,
    pub password: String,
    pub user_domain: String,
    pub workstation: String,
    pub mode: Mode,
    /// Substitute the NT response for the LM response on the NTLMv1 classic
    /// path (MS-NLMP `NoLMResponseNTLMv1`).
    pub no_lm_response_ntlm_v1: bool,

    pub negotiate_flags: Flags,
    pub server_challenge: ServerChallenge,
    pub client_challenge: ClientChallenge,

    pub response_key_nt: [u8; 16],
    pub response_key_lm: [u8; 16],
    pub nt_challenge_response: Vec<u8>,
    pub lm_challenge_response: Vec<u8>,

    pub session_base_key: SessionBaseKey,
    pub key_exchange_key: KeyExchangeKey,
    pub exported_session_key: ExportedSessionKey,
    pub encrypted_random_session_key: EncryptedRandomSessionKey,

    pub client_signing_key: Option<SigningKey>,
    pub server_signing_key: Option<SigningKey>,
    pub client_sealing_key: Vec<u8>,
    pub server_sealing_key: Vec<u8>,
    pub(crate) client_handle: Option<Rc4State>,
    pub(crate) server_handle: Option<Rc4State>,

    pub negotiate_message: Option<NegotiateMessage>,
    pub challenge_message: Option<ChallengeMessage>,
    pub authenticate_message: Option<AuthenticateMessage>,
    /// The MIC from the AUTHENTICATE message, saved before the message's own
    /// slot is zeroed for re-verification.
    pub mic: [u8; 16],
}

impl SessionData {
    pub fn set_user_info(&mut self, user: &str, password: &str, domain: &str, workstation: &str) {
        self.user = user.to_owned();
        self.password = password.to_owned();
        self.user_domain = domain.to_owned();
        self.workstation = workstation.to_owned();
    }

    pub fn get_user_info(&self) -> (&str, &str, &str, &str) {
        (
            &self.user,
            &self.password,
            &self.user_domain,
            &self.workstation,
        )
    }

    /// Adopt identity from the AUTHENTICATE message, overriding anything set
    /// through `set_user_info` beforehand.
    pub(crate) fn adopt_identity(&mut self, message: &AuthenticateMessage) {
        self.user = message.user.clone();
        self.user_domain = message.domain.clone();
        self.workstation = message.workstation.clone();
        log::debug!(
            "authenticating user {:?} domain {:?} workstation {:?}",
            self.user,
            self.user_domain,
            self.workstation
        );
    }

    /// The four directional keys all derive from the exported session key and
    /// must be recomputed together whenever it changes.
    pub(crate) fn calculate_keys(&mut self) {
        let flags = self.negotiate_flags;
        self.client_signing_key = keys::sign_key(flags, &self.exported_session_key, Side::Client);
        self.server_signing_key = keys::sign_key(flags, &self.exported_session_key, Side::Server);
        self.client_sealing_key = keys::seal_key(flags, &self.exported_session_key, Side::Client);
        self.server_sealing_key = keys::seal_key(flags, &self.exported_session_key, Side::Server);
    }

    /// Both RC4 handles are created together with the directional keys and
    /// never rebuilt for the rest of the session.
    pub(crate) fn init_handles(&mut self) -> Result<()> {
        self.client_handle = Some(Rc4State::init(&self.client_sealing_key)?);
        self.server_handle = Some(Rc4State::init(&self.server_sealing_key)?);
        Ok(())
    }

    /// Server side: copy the encrypted random session key out of the
    /// AUTHENTICATE message. The field is required once KEY_EXCH is
    /// negotiated and must carry exactly 16 bytes.
    pub(crate) fn take_encrypted_session_key(
        &mut self,
        message: &AuthenticateMessage,
    ) -> Result<()> {
        if message.encrypted_random_session_key.is_empty() {
            if self.negotiate_flags.has_flag(NTLMSSP_NEGOTIATE_KEY_EXCH) {
                return Err(Error::MalformedMessage(
                    "key exchange negotiated but no encrypted session key present",
                ));
            }
            self.encrypted_random_session_key = EncryptedRandomSessionKey::default();
        } else {
            self.encrypted_random_session_key =
                message.encrypted_random_session_key.as_slice().try_into()?;
        }
        Ok(())
    }

    /// Server side: recover the exported session key from the AUTHENTICATE
    /// message, decrypting it when a key exchange was negotiated.
    pub(crate) fn compute_exported_session_key(&mut self) -> Result<()> {
        if self.negotiate_flags.has_flag(NTLMSSP_NEGOTIATE_KEY_EXCH) {
            let decrypted = rc4k(
                &self.key_exchange_key[..],
                &self.encrypted_random_session_key[..],
            )?;
            self.exported_session_key = decrypted.as_slice().try_into()?;
        } else {
            self.exported_session_key = ExportedSessionKey::from(*self.key_exchange_key.as_bytes());
        }
        Ok(())
    }

    /// Client side: pick a fresh random session key under KEY_EXCH, otherwise
    /// the key-exchange key doubles as the session key.
    pub(crate) fn compute_encrypted_session_key(&mut self, rng: &mut dyn RngCore) -> Result<()> {
        if self.negotiate_flags.has_flag(NTLMSSP_NEGOTIATE_KEY_EXCH) {
            self.exported_session_key = ExportedSessionKey::random(rng);
            let encrypted = rc4k(
                &self.key_exchange_key[..],
                &self.exported_session_key[..],
            )?;
            self.encrypted_random_session_key = encrypted.as_slice().try_into()?;
        } else {
            self.exported_session_key = ExportedSessionKey::from(*self.key_exchange_key.as_bytes());
            self.encrypted_random_session_key =
                EncryptedRandomSessionKey::from(*self.key_exchange_key.as_bytes());
        }
        Ok(())
    }

    /// Server side: NT response comparison with LM fallback. The fallback is
    /// disallowed under v1 extended session security, where both sides always
    /// agree on the LM response and the comparison would be vacuous.
    pub(crate) fn verify_responses(
        &self,
        message: &AuthenticateMessage,
        disallow_lm_fallback: bool,
    ) -> Result<()> {
        if message.nt_challenge_response == self.nt_challenge_response {
            return Ok(());
        }
        if !disallow_lm_fallback && message.lm_challenge_response == self.lm_challenge_response {
            return Ok(());
        }
        Err(Error::AuthenticationFailed)
    }

    pub(crate) fn save_mic(&mut self, message: &mut AuthenticateMessage) {
        self.mic = message.mic;
        // MIC is always computed over the message with its own slot zeroed
        message.mic = [0u8; 16];
    }

    pub(crate) fn sign_with(
        &mut self,
        side: Side,
        message: &[u8],
        sequence_number: u32,
    ) -> Result<MessageSignature> {
        let (handle, sealing_key, signing_key) = match side {
            Side::Client => (
                self.client_handle.as_mut(),
                self.client_sealing_key.as_slice(),
                self.client_signing_key.as_ref(),
            ),
            Side::Server => (
                self.server_handle.as_mut(),
                self.server_sealing_key.as_slice(),
                self.server_signing_key.as_ref(),
            ),
        };
        let handle = handle.ok_or(Error::InvalidState(
            "session is not authenticated, no signing keys exist yet",
        ))?;

        mac::sign_message(
            self.negotiate_flags,
            handle,
            sealing_key,
            signing_key,
            sequence_number,
            message,
        )
    }

    pub(crate) fn mac(&mut self, own: Side, message: &[u8], sequence_number: u32) -> Result<[u8; 16]> {
        Ok(self.sign_with(own, message, sequence_number)?.to_bytes())
    }

    pub(crate) fn verify_mac(
        &mut self,
        peer: Side,
        message: &[u8],
        expected: &[u8],
        sequence_number: u32,
    ) -> Result<bool> {
        let computed = self.sign_with(peer, message, sequence_number)?.to_bytes();
        if expected.len() != computed.len() {
            return Ok(false);
        }
        Ok(computed[..].ct_eq(expected).into())
    }
}

/// One NTLM session of either role and version. Role- and version-specific
/// operations live on the concrete variants; this enum carries the small
/// capability set common to all four.
pub enum Session {
    V1Client(V1ClientSession),
    V1Server(V1ServerSession),
    V2Client(V2ClientSession),
    V2Server(V2ServerSession),
}

impl Session {
    pub fn session_data(&self) -> &SessionData {
        match self {
            Self::V1Client(session) => session.session_data(),
            Self::V1Server(session) => session.session_data(),
            Self::V2Client(session) => session.session_data(),
            Self::V2Server(session) => session.session_data(),
        }
    }

    fn session_data_mut(&mut self) -> &mut SessionData {
        match self {
            Self::V1Client(session) => session.session_data_mut(),
            Self::V1Server(session) => session.session_data_mut(),
            Self::V2Client(session) => session.session_data_mut(),
            Self::V2Server(session) => session.session_data_mut(),
        }
    }

    pub fn set_user_info(&mut self, user: &str, password: &str, domain: &str, workstation: &str) {
        self.session_data_mut()
            .set_user_info(user, password, domain, workstation);
    }

    pub fn get_user_info(&self) -> (&str, &str, &str, &str) {
        self.session_data().get_user_info()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.session_data_mut().mode = mode;
    }

    /// The NTLM version of the session: 1 or 2.
    pub fn version(&self) -> u8 {
        match self {
            Self::V1Client(_) | Self::V1Server(_) => 1,
            Self::V2Client(_) | Self::V2Server(_) => 2,
        }
    }

    pub fn mac(&mut self, message: &[u8], sequence_number: u32) -> Result<[u8; 16]> {
        match self {
            Self::V1Client(session) => session.mac(message, sequence_number),
            Self::V1Server(session) => session.mac(message, sequence_number),
            Self::V2Client(session) => session.mac(message, sequence_number),
            Self::V2Server(session) => session.mac(message, sequence_number),
        }
    }

    pub fn verify_mac(
        &mut self,
        message: &[u8],
        expected: &[u8],
        sequence_number: u32,
    ) -> Result<bool> {
        match self {
            Self::V1Client(session) => session.verify_mac(message, expected, sequence_number),
            Self::V1Server(session) => session.verify_mac(message, expected, sequence_number),
            Self::V2Client(session) => session.verify_mac(message, expected, sequence_number),
            Self::V2Server(session) => session.verify_mac(message, expected, sequence_number),
        }
    }
}

impl From<V1ClientSession> for Session {
    fn from(session: V1ClientSession) -> Self {
        Self::V1Client(session)
    }
}

impl From<V1ServerSession> for Session {
    fn from(session: V1ServerSession) -> Self {
        Self::V1Server(session)
    }
}

impl From<V2ClientSession> for Session {
    fn from(session: V2ClientSession) -> Self {
        Self::V2Client(session)
    }
}

impl From<V2ServerSession> for Session {
    fn from(session: V2ServerSession) -> Self {
        Self::V2Server(session)
    }
}

pub(crate) fn default_rng() -> Box<dyn RngCore> {
    Box::new(OsRng)
}
