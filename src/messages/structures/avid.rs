use std::io;
use std::mem::size_of;

use nom::bytes::complete::take;
use nom::combinator::{map_opt, verify};
use nom::error::context;
use nom::multi::length_data;
use nom::number::complete::{le_u16, le_u32};
use nom::sequence::tuple;

use crate::crypto::{utf16le, utf16le_decode};
use crate::messages::{
    structures::{FileTime, SingleHostData},
    utils::{write_u16, write_u32},
    NomError, Wire,
};

#[derive(Debug, PartialEq, Eq, Default, Copy, Clone)]
#[repr(u16)]
pub enum AvId {
    #[default]
    MsvAvEOL = 0x0000,
    MsvAvNbComputerName = 0x0001,
    MsvAvNbDomainName = 0x0002,
    MsvAvDnsComputerName = 0x0003,
    MsvAvDnsDomainName = 0x0004,
    MsvAvDnsTreeName = 0x0005,
    MsvAvFlags = 0x0006,
    MsvAvTimestamp = 0x0007,
    MsvAvSingleHost = 0x0008,
    MsvAvTargetName = 0x0009,
    MsvAvChannelBindings = 0x000a,
}

impl<'a> Wire<'a> for AvId {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        write_u16(writer, *self as u16)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        context(
            "AvId",
            map_opt(le_u16, |val| match val {
                0x0000 => Some(Self::MsvAvEOL),
                0x0001 => Some(Self::MsvAvNbComputerName),
                0x0002 => Some(Self::MsvAvNbDomainName),
                0x0003 => Some(Self::MsvAvDnsComputerName),
                0x0004 => Some(Self::MsvAvDnsDomainName),
                0x0005 => Some(Self::MsvAvDnsTreeName),
                0x0006 => Some(Self::MsvAvFlags),
                0x0007 => Some(Self::MsvAvTimestamp),
                0x0008 => Some(Self::MsvAvSingleHost),
                0x0009 => Some(Self::MsvAvTargetName),
                0x000a => Some(Self::MsvAvChannelBindings),
                _ => None,
            }),
        )(input)
    }
}

/// The MsvAvFlags value (AvId 0x0006).
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct MsvAvFlags {
    /// The account authentication is constrained.
    pub account_authentication_constrained: bool,
    /// The client provides message integrity in the AUTHENTICATE MIC field.
    pub mic_present: bool,
    /// The client provides a target SPN generated from an untrusted source.
    pub generated_spn_from_untrusted_source: bool,
}

impl<'a> Wire<'a> for MsvAvFlags {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        let mut flags = 0;
        if self.account_authentication_constrained {
            flags |= 0x0000_0001;
        }
        if self.mic_present {
            flags |= 0x0000_0002;
        }
        if self.generated_spn_from_untrusted_source {
            flags |= 0x0000_0004;
        }
        write_u32(writer, flags)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, flags) = context("MsvAvFlags", verify(le_u32, |f| *f & !0x7 == 0))(input)?;
        Ok((
            rest,
            Self {
                account_authentication_constrained: flags & 0x0000_0001 != 0,
                mic_present: flags & 0x0000_0002 != 0,
                generated_spn_from_untrusted_source: flags & 0x0000_0004 != 0,
            },
        ))
    }
}

/// One `(id, length, value)` triple of a TargetInfo list. A list is
/// terminated by `MsvAvEOL` with a zero-length value.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub enum AvPair {
    #[default]
    MsvAvEOL,
    /// The server's NetBIOS computer name, Unicode, not null-terminated.
    MsvAvNbComputerName(String),
    /// The server's NetBIOS domain name, Unicode, not null-terminated.
    MsvAvNbDomainName(String),
    /// The FQDN of the computer.
    MsvAvDnsComputerName(String),
    /// The FQDN of the domain.
    MsvAvDnsDomainName(String),
    /// The FQDN of the forest.
    MsvAvDnsTreeName(String),
    /// Server or client configuration flags.
    MsvAvFlags(MsvAvFlags),
    /// The server's local time, always sent in the CHALLENGE_MESSAGE.
    MsvAvTimestamp(FileTime),
    /// Machine-specific data for same-host exchanges.
    MsvAvSingleHost(SingleHostData),
    /// The SPN of the target server.
    MsvAvTargetName(String),
    /// MD5 hash of the channel bindings; all-zero means absent.
    MsvAvChannelBindings([u8; 16]),
}

impl AvPair {
    pub fn get_id(&self) -> AvId {
        match self {
            Self::MsvAvEOL => AvId::MsvAvEOL,
            Self::MsvAvNbComputerName(_) => AvId::MsvAvNbComputerName,
            Self::MsvAvNbDomainName(_) => AvId::MsvAvNbDomainName,
            Self::MsvAvDnsComputerName(_) => AvId::MsvAvDnsComputerName,
            Self::MsvAvDnsDomainName(_) => AvId::MsvAvDnsDomainName,
            Self::MsvAvDnsTreeName(_) => AvId::MsvAvDnsTreeName,
            Self::MsvAvFlags(_) => AvId::MsvAvFlags,
            Self::MsvAvTimestamp(_) => AvId::MsvAvTimestamp,
            Self::MsvAvSingleHost(_) => AvId::MsvAvSingleHost,
            Self::MsvAvTargetName(_) => AvId::MsvAvTargetName,
            Self::MsvAvChannelBindings(_) => AvId::MsvAvChannelBindings,
        }
    }
}

fn encode_string<W>(s: &str, writer: &mut W) -> io::Result<usize>
where
    W: io::Write,
{
    let data = utf16le(s);
    let mut written = write_u16(
        writer,
        data.len().try_into().expect("string too long for an AV_PAIR"),
    )?;
    writer.write_all(&data)?;
    written += data.len();
    Ok(written)
}

fn decode_string<'a, E>(data: &'a [u8]) -> Result<String, nom::Err<E>>
where
    E: NomError<'a>,
{
    utf16le_decode(data).map_err(|_| {
        nom::Err::Error(E::from_error_kind(data, nom::error::ErrorKind::Verify))
    })
}

impl<'a> Wire<'a> for AvPair {
    fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
    where
        W: io::Write,
    {
        let mut written = self.get_id().serialize_into(writer)?;
        match self {
            Self::MsvAvEOL => {
                written += write_u16(writer, 0)?;
            }
            Self::MsvAvNbComputerName(s)
            | Self::MsvAvNbDomainName(s)
            | Self::MsvAvDnsComputerName(s)
            | Self::MsvAvDnsDomainName(s)
            | Self::MsvAvDnsTreeName(s)
            | Self::MsvAvTargetName(s) => {
                written += encode_string(s, writer)?;
            }
            Self::MsvAvFlags(flags) => {
                written += write_u16(writer, size_of::<u32>() as u16)?;
                written += flags.serialize_into(writer)?;
            }
            Self::MsvAvTimestamp(filetime) => {
                written += write_u16(writer, 8)?;
                written += filetime.serialize_into(writer)?;
            }
            Self::MsvAvSingleHost(shd) => {
                written += write_u16(writer, SingleHostData::SIZE as u16)?;
                written += shd.serialize_into(writer)?;
            }
            Self::MsvAvChannelBindings(hash) => {
                written += write_u16(writer, hash.len() as u16)?;
                writer.write_all(&hash[..])?;
                written += hash.len();
            }
        }
        Ok(written)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, (id, data)) =
            context("AvPair", tuple((AvId::deserialize, length_data(le_u16))))(input)?;
        let pair = match id {
            AvId::MsvAvEOL => {
                if !data.is_empty() {
                    return Err(nom::Err::Error(E::from_error_kind(
                        data,
                        nom::error::ErrorKind::Verify,
                    )));
                }
                Self::MsvAvEOL
            }
            AvId::MsvAvNbComputerName => Self::MsvAvNbComputerName(decode_string(data)?),
            AvId::MsvAvNbDomainName => Self::MsvAvNbDomainName(decode_string(data)?),
            AvId::MsvAvDnsComputerName => Self::MsvAvDnsComputerName(decode_string(data)?),
            AvId::MsvAvDnsDomainName => Self::MsvAvDnsDomainName(decode_string(data)?),
            AvId::MsvAvDnsTreeName => Self::MsvAvDnsTreeName(decode_string(data)?),
            AvId::MsvAvTargetName => Self::MsvAvTargetName(decode_string(data)?),
            AvId::MsvAvFlags => {
                let (_, flags) = MsvAvFlags::deserialize(data)?;
                Self::MsvAvFlags(flags)
            }
            AvId::MsvAvTimestamp => {
                let (_, timestamp) = FileTime::deserialize(data)?;
                Self::MsvAvTimestamp(timestamp)
            }
            AvId::MsvAvSingleHost => {
                let (_, shd) = SingleHostData::deserialize(data)?;
                Self::MsvAvSingleHost(shd)
            }
            AvId::MsvAvChannelBindings => {
                let (_, hash) = take(16usize)(data)?;
                let mut buf = [0u8; 16];
                buf.copy_from_slice(hash);
                Self::MsvAvChannelBindings(buf)
            }
        };
        Ok((rest, pair))
    }
}
