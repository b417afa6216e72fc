use std::io;

use nom::error::context;
use nom::sequence::tuple;

use crate::messages::{
    structures::{ClientChallenge, Response16, Response24},
    NomError, Wire,
};

/// 24-byte NTLMv1 LM response.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Lmv1Challenge {
    pub response: Response24,
}

impl Lmv1Challenge {
    /// Extended session security: the client challenge padded with zeroes.
    pub fn from_client_challenge(client_challenge: &ClientChallenge) -> Self {
        let mut me = Self::default();
        me.response[..client_challenge.len()].copy_from_slice(&client_challenge[..]);
        me
    }
}

impl<'a> Wire<'a> for Lmv1Challenge {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        self.response.serialize_into(writer)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, response) = context("Lmv1Challenge", Response24::deserialize)(input)?;
        Ok((rest, Self { response }))
    }
}

/// 24-byte NTLMv2 LM response: HMAC proof over both challenges followed by
/// the client challenge itself.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Lmv2Challenge {
    pub response: Response16,
    pub challenge_from_client: ClientChallenge,
}

impl<'a> Wire<'a> for Lmv2Challenge {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        let mut size = self.response.serialize_into(writer)?;
        size += self.challenge_from_client.serialize_into(writer)?;
        Ok(size)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, (response, challenge_from_client)) = context(
            "Lmv2Challenge",
            tuple((Response16::deserialize, ClientChallenge::deserialize)),
        )(input)?;
        Ok((
            rest,
            Self {
                response,
                challenge_from_client,
            },
        ))
    }
}
