use std::time::{SystemTime, UNIX_EPOCH};

use nom::error::context;
use nom::number::complete::le_u32;
use nom::sequence::tuple;

use crate::messages::{utils::write_u32, NomError, Wire};

/// Windows FILETIME: 100-nanosecond ticks since 1601-01-01 UTC, serialized
/// little-endian.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct FileTime {
    pub low: u32,
    pub high: u32,
}

/// Ticks between 1601-01-01 and the Unix epoch.
const UNIX_EPOCH_OFFSET: u64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: u64 = 10_000_000;

impl FileTime {
    pub fn from_unix_seconds(seconds: u64) -> Self {
        Self::from_ticks(seconds * TICKS_PER_SECOND + UNIX_EPOCH_OFFSET)
    }

    pub fn from_ticks(ticks: u64) -> Self {
        Self {
            low: (ticks & 0xffff_ffff) as u32,
            high: (ticks >> 32) as u32,
        }
    }

    pub fn as_u64(&self) -> u64 {
        ((self.high as u64) << 32) | (self.low as u64)
    }

    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| Self::from_unix_seconds(elapsed.as_secs()))
            .unwrap_or_default()
    }
}

impl<'a> Wire<'a> for FileTime {
    fn serialize_into<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut written = 0;
        written += write_u32(writer, self.low)?;
        written += write_u32(writer, self.high)?;
        Ok(written)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, (low, high)) = context("FileTime", tuple((le_u32, le_u32)))(input)?;
        Ok((rest, Self { low, high }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_epoch_reference_vector() {
        let epoch = FileTime::from_unix_seconds(0);
        pretty_assertions::assert_eq!(epoch.as_u64(), 116_444_736_000_000_000);
        pretty_assertions::assert_eq!(
            epoch.serialize(),
            116_444_736_000_000_000u64.to_le_bytes()
        );
    }

    #[test]
    fn wire_round_trip() {
        let time = FileTime::from_unix_seconds(1_234_567_890);
        let serialized = time.serialize();
        let (rest, parsed) = FileTime::deserialize::<()>(&serialized).unwrap();
        assert!(rest.is_empty());
        pretty_assertions::assert_eq!(parsed, time);
    }

    #[test]
    fn zero_is_representable() {
        // the reference vectors use an all-zero timestamp
        let (_, parsed) = FileTime::deserialize::<()>(&[0u8; 8]).unwrap();
        pretty_assertions::assert_eq!(parsed, FileTime::default());
    }
}
