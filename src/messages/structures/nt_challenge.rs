use std::io;

use nom::bytes::complete::take;
use nom::combinator::verify;
use nom::error::context;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::{preceded, tuple};

use crate::messages::{
    structures::{ClientChallenge, FileTime, NtProofStr},
    utils::write_u32,
    NomError, Wire,
};

/// 24-byte NTLMv1 NT response.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Ntv1Challenge {
    pub response: super::Response24,
}

impl<'a> Wire<'a> for Ntv1Challenge {
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
        let (rest, response) = context("Ntv1Challenge", super::Response24::deserialize)(input)?;
        Ok((rest, Self { response }))
    }
}

/// The NTLMv2 client challenge blob ("temp" without its trailing 4 zero
/// bytes): a fixed 28-byte header followed by the AV_PAIR payload, carried
/// opaque — the core echoes it, it never reinterprets it.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Ntv2Challenge {
    pub timestamp: FileTime,
    pub challenge_from_client: ClientChallenge,
    pub av_pairs_payload: Vec<u8>,
}

impl<'a> Wire<'a> for Ntv2Challenge {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        // RespType, HiRespType, Reserved1
        writer.write_all(&[1, 1, 0, 0])?;
        // Reserved2
        write_u32(writer, 0)?;
        self.timestamp.serialize_into(writer)?;
        self.challenge_from_client.serialize_into(writer)?;
        // Reserved3
        write_u32(writer, 0)?;
        writer.write_all(&self.av_pairs_payload)?;
        Ok(28 + self.av_pairs_payload.len())
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, (timestamp, challenge_from_client)) = context(
            "Ntv2Challenge",
            preceded(
                tuple((
                    context("RespType", verify(le_u8, |b| *b == 1)),
                    context("HiRespType", verify(le_u8, |b| *b == 1)),
                    context("Reserved1", verify(le_u16, |b| *b == 0)),
                    context("Reserved2", verify(le_u32, |b| *b == 0)),
                )),
                tuple((
                    FileTime::deserialize,
                    ClientChallenge::deserialize,
                )),
            ),
        )(input)?;
        let (rest, _reserved3) = context("Reserved3", verify(le_u32, |b| *b == 0))(rest)?;

        let (rest, av_pairs_payload) = context("AvPairs", take(rest.len()))(rest)?;

        Ok((
            rest,
            Self {
                timestamp,
                challenge_from_client,
                av_pairs_payload: av_pairs_payload.to_vec(),
            },
        ))
    }
}

/// A full NTLMv2 NT challenge response: the 16-byte proof followed by the
/// client challenge blob and the trailing reserved word.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct Ntv2Response {
    pub nt_proof_str: NtProofStr,
    pub challenge: Ntv2Challenge,
}

impl<'a> Wire<'a> for Ntv2Response {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        let mut size = self.nt_proof_str.serialize_into(writer)?;
        size += self.challenge.serialize_into(writer)?;
        size += write_u32(writer, 0)?;
        Ok(size)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (blob, nt_proof_str) = context("NtProofStr", NtProofStr::deserialize)(input)?;

        // the AV_PAIR payload runs up to the trailing reserved word
        let av_end = blob.len().checked_sub(4).ok_or_else(|| {
            nom::Err::Error(E::from_error_kind(blob, nom::error::ErrorKind::Eof))
        })?;
        let (trailer, challenge_bytes) = take(av_end)(blob)?;
        let (rest, _) = context("Reserved4", verify(le_u32, |b| *b == 0))(trailer)?;
        let (leftover, challenge) = Ntv2Challenge::deserialize(challenge_bytes)?;
        debug_assert!(leftover.is_empty());

        Ok((
            rest,
            Self {
                nt_proof_str,
                challenge,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> Ntv2Response {
        Ntv2Response {
            nt_proof_str: NtProofStr::from([0x11; 16]),
            challenge: Ntv2Challenge {
                timestamp: FileTime::from_unix_seconds(42),
                challenge_from_client: ClientChallenge::from([0xaa; 8]),
                av_pairs_payload: vec![
                    0x02, 0x00, 0x0c, 0x00, 0x44, 0x00, 0x6f, 0x00, 0x6d, 0x00, 0x61, 0x00, 0x69,
                    0x00, 0x6e, 0x00, 0x00, 0x00, 0x00, 0x00,
                ],
            },
        }
    }

    #[test]
    fn v1_response_is_24_bytes() {
        assert_eq!(Ntv1Challenge::default().serialize().len(), 24);
    }

    #[test]
    fn v2_response_round_trip() {
        let response = sample_response();
        let data = response.serialize();
        assert_eq!(data.len(), 16 + 28 + 20 + 4);

        let (rest, parsed) = Ntv2Response::deserialize::<()>(&data).unwrap();
        assert!(rest.is_empty());
        pretty_assertions::assert_eq!(parsed, response);
    }

    #[test]
    fn v2_response_rejects_bad_header() {
        let mut data = sample_response().serialize();
        data[16] = 2; // RespType must be 1
        assert!(Ntv2Response::deserialize::<()>(&data).is_err());
    }

    #[test]
    fn v2_response_rejects_nonzero_trailer() {
        let mut data = sample_response().serialize();
        let last = data.len() - 1;
        data[last] = 0xff;
        assert!(Ntv2Response::deserialize::<()>(&data).is_err());
    }
}
