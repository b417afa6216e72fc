//! Parsed forms of the three NTLMSSP handshake messages and the byte-layout
//! structures embedded in them. The wire envelope (signature, message type,
//! offset/length fields) belongs to the framing layer; the core only consumes
//! and produces these structs.

use std::io::{self, Write};

use crate::error::{Error, Result};

pub mod flags;
pub mod structures;
mod utils;

use flags::{Flags, NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY};
use structures::{AvPair, ClientChallenge, Ntv2Response, ServerChallenge, Version};

pub trait NomError<'a>:
    nom::error::ContextError<&'a [u8]> + nom::error::ParseError<&'a [u8]> + std::fmt::Debug
{
}

impl<'a, E> NomError<'a> for E where
    E: nom::error::ParseError<&'a [u8]> + nom::error::ContextError<&'a [u8]> + std::fmt::Debug
{
}

pub(crate) trait Wire<'a>: Sized {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: Write;

    fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::new();
        self.serialize_into(&mut data)
            .expect("writing to a Vec never fails");
        data
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>;
}

impl<'a, T> Wire<'a> for Vec<T>
where
    T: Wire<'a>,
{
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: Write,
    {
        let mut size = 0;
        for item in self.iter() {
            size += item.serialize_into(writer)?;
        }
        Ok(size)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        nom::multi::many0(T::deserialize)(input)
    }
}

/// NEGOTIATE, as handed over by the framing layer. The core only stashes it
/// for a future MIC computation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NegotiateMessage {
    pub negotiate_flags: Flags,
    pub domain: Option<String>,
    pub workstation: Option<String>,
    pub version: Option<Version>,
}

/// CHALLENGE: the server's flag word, its 8-byte challenge and the TargetInfo
/// AV_PAIR list, both in parsed form (server side) and as the raw payload the
/// client echoes back (client side).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChallengeMessage {
    pub negotiate_flags: Flags,
    pub server_challenge: ServerChallenge,
    pub target_name: Option<String>,
    pub target_info: Vec<AvPair>,
    pub target_info_payload: Vec<u8>,
    pub version: Option<Version>,
}

/// AUTHENTICATE: identity, both challenge responses and the encrypted random
/// session key, all as opaque payload slots.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AuthenticateMessage {
    pub negotiate_flags: Flags,
    pub lm_challenge_response: Vec<u8>,
    pub nt_challenge_response: Vec<u8>,
    pub domain: String,
    pub user: String,
    pub workstation: String,
    pub encrypted_random_session_key: Vec<u8>,
    pub version: Option<Version>,
    pub mic: [u8; 16],
}

impl AuthenticateMessage {
    /// Parses the NT challenge response payload as an NTLMv2 response blob.
    pub fn ntlm_v2_response(&self) -> Result<Ntv2Response> {
        let (rest, response) = Ntv2Response::deserialize::<()>(&self.nt_challenge_response)
            .map_err(|_| Error::MalformedMessage("invalid NTLMv2 response blob"))?;
        if !rest.is_empty() {
            return Err(Error::MalformedMessage("trailing bytes after NTLMv2 response"));
        }
        Ok(response)
    }

    /// Recovers the client challenge: from the NTLMv2 blob when present,
    /// otherwise from the LM response under extended session security. The
    /// classic v1 responses do not carry one.
    pub fn client_challenge(&self) -> Option<ClientChallenge> {
        if let Ok(response) = self.ntlm_v2_response() {
            return Some(response.challenge.challenge_from_client);
        }
        if self
            .negotiate_flags
            .has_flag(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY)
        {
            let prefix: [u8; 8] = self.lm_challenge_response.get(..8)?.try_into().ok()?;
            return Some(prefix.into());
        }
        None
    }
}
