use nom::bytes::complete::take;
use nom::combinator::verify;
use nom::error::context;
use nom::number::complete::le_u32;
use nom::sequence::tuple;

use crate::messages::{utils::write_u32, NomError, Wire};

/// Single_Host_Data: platform blob plus a machine id, only meaningful when
/// client and server share a host.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct SingleHostData {
    pub size: u32,
    pub custom_data: [u8; 8],
    pub machine_id: [u8; 32],
}

impl SingleHostData {
    pub const SIZE: usize = 48;
}

impl<'a> Wire<'a> for SingleHostData {
    fn serialize_into<W>(&self, writer: &mut W) -> std::io::Result<usize>
    where
        W: std::io::Write,
    {
        let mut written = 0;
        written += write_u32(writer, self.size)?;
        written += write_u32(writer, 0)?;
        writer.write_all(&self.custom_data[..])?;
        written += self.custom_data.len();
        writer.write_all(&self.machine_id[..])?;
        written += self.machine_id.len();
        Ok(written)
    }

    fn deserialize<E>(input: &'a [u8]) -> nom::IResult<&'a [u8], Self, E>
    where
        E: NomError<'a>,
    {
        let (rest, (size, _z4, custom, machine)) = context(
            "SingleHostData",
            tuple((
                le_u32,
                verify(le_u32, |val| *val == 0),
                take(8usize),
                take(32usize),
            )),
        )(input)?;

        let mut custom_data = [0u8; 8];
        let mut machine_id = [0u8; 32];
        custom_data.copy_from_slice(custom);
        machine_id.copy_from_slice(machine);

        Ok((
            rest,
            Self {
                size,
                custom_data,
                machine_id,
            },
        ))
    }
}
