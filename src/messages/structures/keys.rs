use std::fmt;
use std::io;
use std::ops::{Deref, DerefMut};

use nom::bytes::complete::take;
use nom::error::context;
use rand::RngCore;

use crate::error::Error;
use crate::messages::{NomError, Wire};

/// Fixed-size key and challenge material. Byte-for-byte wire layout, hex
/// `Debug`, and a `random` constructor fed by the session's RNG.
macro_rules! key_material {
    ($(#[$doc:meta])* $name:ident, $size:literal) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name([u8; $size]);

        impl $name {
            pub const SIZE: usize = $size;

            pub const fn new(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }

            pub fn random(rng: &mut dyn RngCore) -> Self {
                let mut me = Self::default();
                rng.fill_bytes(&mut me.0);
                me
            }

            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $size])
            }
        }

        impl From<[u8; $size]> for $name {
            fn from(bytes: [u8; $size]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = Error;

            fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
                let bytes: [u8; $size] = data
                    .try_into()
                    .map_err(|_| Error::MalformedMessage(concat!(
                        stringify!($name),
                        " has a fixed size"
                    )))?;
                Ok(Self(bytes))
            }
        }

        impl Deref for $name {
            type Target = [u8; $size];

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(", stringify!($name))?;
                for b in &self.0[..] {
                    write!(f, "{:02x}", b)?;
                }
                write!(f, ")")
            }
        }

        impl<'a> Wire<'a> for $name {
            fn serialize_into<W>(&self, writer: &mut W) -> io::Result<usize>
            where
                W: io::Write,
            {
                writer.write_all(&self.0[..])?;
                Ok($size)
            }

            fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
            where
                E: NomError<'a>,
            {
                let (rest, data) = context(stringify!($name), take($size as usize))(input)?;
                let mut bytes = [0u8; $size];
                bytes.copy_from_slice(data);
                Ok((rest, Self(bytes)))
            }
        }
    };
}

key_material!(
    /// The server's 8-byte random challenge.
    ServerChallenge,
    8
);
key_material!(
    /// The client's 8-byte random challenge.
    ClientChallenge,
    8
);
key_material!(SessionBaseKey, 16);
key_material!(KeyExchangeKey, 16);
key_material!(
    /// The session key every directional key is derived from. Changing it
    /// invalidates all four directional keys at once.
    ExportedSessionKey,
    16
);
key_material!(EncryptedRandomSessionKey, 16);
key_material!(
    /// HMAC-MD5 proof over the server challenge and the NTLMv2 blob.
    NtProofStr,
    16
);
key_material!(SigningKey, 16);
key_material!(Response16, 16);
key_material!(Response24, 24);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_hex() {
        let challenge = ServerChallenge::from([0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]);
        pretty_assertions::assert_eq!(
            format!("{challenge:?}"),
            "ServerChallenge(0123456789abcdef)"
        );
    }

    #[test]
    fn try_from_enforces_the_size() {
        assert!(SessionBaseKey::try_from(&[0u8; 15][..]).is_err());
        assert!(SessionBaseKey::try_from(&[0u8; 16][..]).is_ok());
    }

    #[test]
    fn wire_round_trip() {
        let response = Response24::from([0x42; 24]);
        let serialized = response.serialize();
        let (rest, parsed) = Response24::deserialize::<()>(&serialized).unwrap();
        assert!(rest.is_empty());
        pretty_assertions::assert_eq!(parsed, response);
    }
}
