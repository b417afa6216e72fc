use std::io;

use nom::combinator::verify;
use nom::error::context;
use nom::number::complete::{le_u16, le_u24, le_u8};
use nom::sequence::tuple;

use crate::messages::{
    utils::{write_u16, write_u8},
    NomError, Wire,
};

pub const NTLMSSP_REVISION_W2K3: u8 = 0x0f;

/// The VERSION structure attached to handshake messages when
/// NTLMSSP_NEGOTIATE_VERSION is set. The default mirrors what the original
/// implementation advertises and synthesizes for version-less peers:
/// 6.1.7601, revision 15.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub build: u16,
    pub revision: u8,
}

impl Default for Version {
    fn default() -> Self {
        Self {
            major: 6,
            minor: 1,
            build: 7601,
            revision: NTLMSSP_REVISION_W2K3,
        }
    }
}

impl<'a> Wire<'a> for Version {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        let mut size = 0;
        size += write_u8(writer, self.major)?;
        size += write_u8(writer, self.minor)?;
        size += write_u16(writer, self.build)?;
        size += write_u8(writer, 0)?;
        size += write_u16(writer, 0)?;
        size += write_u8(writer, self.revision)?;
        Ok(size)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, (major, minor, build, _reserved, revision)) = context(
            "Version",
            tuple((
                le_u8,
                le_u8,
                le_u16,
                verify(le_u24, |r| *r == 0),
                le_u8,
            )),
        )(input)?;

        Ok((
            rest,
            Self {
                major,
                minor,
                build,
                revision,
            },
        ))
    }
}
