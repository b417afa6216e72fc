/// Signature version, first on the wire in both layouts.
const SIGNATURE_VERSION: u32 = 1;

/// The 16-byte NTLMSSP_MESSAGE_SIGNATURE. Extended session security carries
/// an 8-byte HMAC-derived checksum and the plain sequence number; the legacy
/// layout is built entirely out of RC4 keystream material.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MessageSignature {
    Extended {
        checksum: [u8; 8],
        seq_num: u32,
    },
    Legacy {
        checksum: [u8; 4],
        seq_num: [u8; 4],
        random_pad: [u8; 4],
    },
}

impl MessageSignature {
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&SIGNATURE_VERSION.to_le_bytes());
        match self {
            Self::Extended { checksum, seq_num } => {
                bytes[4..12].copy_from_slice(checksum);
                bytes[12..].copy_from_slice(&seq_num.to_le_bytes());
            }
            Self::Legacy {
                checksum,
                seq_num,
                random_pad,
            } => {
                bytes[4..8].copy_from_slice(checksum);
                bytes[8..12].copy_from_slice(seq_num);
                bytes[12..].copy_from_slice(random_pad);
            }
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_layout() {
        let signature = MessageSignature::Extended {
            checksum: [1, 2, 3, 4, 5, 6, 7, 8],
            seq_num: 0x01020304,
        };
        pretty_assertions::assert_eq!(
            signature.to_bytes(),
            [0x01, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn legacy_layout() {
        let signature = MessageSignature::Legacy {
            checksum: [0xaa; 4],
            seq_num: [0xbb; 4],
            random_pad: [0xcc; 4],
        };
        pretty_assertions::assert_eq!(
            signature.to_bytes(),
            [
                0x01, 0, 0, 0, 0xaa, 0xaa, 0xaa, 0xaa, 0xbb, 0xbb, 0xbb, 0xbb, 0xcc, 0xcc, 0xcc,
                0xcc
            ]
        );
    }
}
