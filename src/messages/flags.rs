use std::fmt;

/// If set, requests Unicode character set encoding.
pub const NTLMSSP_NEGOTIATE_UNICODE: u32 = 0x0000_0001;

/// If set, requests OEM character set encoding.
pub const NTLM_NEGOTIATE_OEM: u32 = 0x0000_0002;

/// If set, a TargetName field of the CHALLENGE_MESSAGE MUST be supplied.
pub const NTLMSSP_REQUEST_TARGET: u32 = 0x0000_0004;

/// If set, requests session key negotiation for message signatures.
pub const NTLMSSP_NEGOTIATE_SIGN: u32 = 0x0000_0010;

/// If set, requests session key negotiation for message confidentiality.
pub const NTLMSSP_NEGOTIATE_SEAL: u32 = 0x0000_0020;

/// If set, requests connectionless authentication. When set,
/// NTLMSSP_NEGOTIATE_KEY_EXCH MUST always be set as well.
pub const NTLMSSP_NEGOTIATE_DATAGRAM: u32 = 0x0000_0040;

/// If set, requests LAN Manager (LM) session key computation. Mutually
/// exclusive with extended session security.
pub const NTLMSSP_NEGOTIATE_LM_KEY: u32 = 0x0000_0080;

/// NetWare compatibility; unused by modern implementations.
pub const NTLMSSP_NEGOTIATE_NETWARE: u32 = 0x0000_0100;

/// If set, requests usage of the NTLM v1 session security protocol.
pub const NTLMSSP_NEGOTIATE_NTLM: u32 = 0x0000_0200;

/// If set, only NT authentication data may be used.
pub const NTLMSSP_NEGOTIATE_NT_ONLY: u32 = 0x0000_0400;

/// If set, the connection SHOULD be anonymous.
pub const NTLMSSP_ANONYMOUS: u32 = 0x0000_0800;

/// If set, the domain name is provided in the NEGOTIATE_MESSAGE.
pub const NTLMSSP_NEGOTIATE_OEM_DOMAIN_SUPPLIED: u32 = 0x0000_1000;

/// Indicates whether the Workstation field is present.
pub const NTLMSSP_NEGOTIATE_OEM_WORKSTATION_SUPPLIED: u32 = 0x0000_2000;

/// If set, a session key is generated regardless of the states of
/// NTLMSSP_NEGOTIATE_SIGN and NTLMSSP_NEGOTIATE_SEAL.
pub const NTLMSSP_NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;

/// If set, TargetName MUST be a domain name.
pub const NTLMSSP_TARGET_TYPE_DOMAIN: u32 = 0x0001_0000;

/// If set, TargetName MUST be a server name.
pub const NTLMSSP_TARGET_TYPE_SERVER: u32 = 0x0002_0000;

/// If set, TargetName MUST be a share name.
pub const NTLMSSP_TARGET_TYPE_SHARE: u32 = 0x0004_0000;

/// If set, requests usage of NTLM v2 session security — a misnomer: it is
/// NTLM v1 using the extended session security that is also in NTLM v2.
pub const NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;

/// If set, requests an identify level token.
pub const NTLMSSP_NEGOTIATE_IDENTIFY: u32 = 0x0010_0000;

/// If set, requests the usage of the LMOWF for the session key.
pub const NTLMSSP_REQUEST_NON_NT_SESSION_KEY: u32 = 0x0040_0000;

/// If set, the TargetInfo fields in the CHALLENGE_MESSAGE are populated.
pub const NTLMSSP_NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;

/// If set, the Version field is present in all three handshake messages.
pub const NTLMSSP_NEGOTIATE_VERSION: u32 = 0x0200_0000;

/// If set, requests 128-bit session key negotiation.
pub const NTLMSSP_NEGOTIATE_128: u32 = 0x2000_0000;

/// If set, requests an explicit key exchange: the client picks a random
/// session key and sends it RC4-encrypted under the key-exchange key.
pub const NTLMSSP_NEGOTIATE_KEY_EXCH: u32 = 0x4000_0000;

/// If set, requests 56-bit encryption.
pub const NTLMSSP_NEGOTIATE_56: u32 = 0x8000_0000;

const FLAG_NAMES: &[(u32, &str)] = &[
    (NTLMSSP_NEGOTIATE_UNICODE, "NTLMSSP_NEGOTIATE_UNICODE"),
    (NTLM_NEGOTIATE_OEM, "NTLM_NEGOTIATE_OEM"),
    (NTLMSSP_REQUEST_TARGET, "NTLMSSP_REQUEST_TARGET"),
    (NTLMSSP_NEGOTIATE_SIGN, "NTLMSSP_NEGOTIATE_SIGN"),
    (NTLMSSP_NEGOTIATE_SEAL, "NTLMSSP_NEGOTIATE_SEAL"),
    (NTLMSSP_NEGOTIATE_DATAGRAM, "NTLMSSP_NEGOTIATE_DATAGRAM"),
    (NTLMSSP_NEGOTIATE_LM_KEY, "NTLMSSP_NEGOTIATE_LM_KEY"),
    (NTLMSSP_NEGOTIATE_NETWARE, "NTLMSSP_NEGOTIATE_NETWARE"),
    (NTLMSSP_NEGOTIATE_NTLM, "NTLMSSP_NEGOTIATE_NTLM"),
    (NTLMSSP_NEGOTIATE_NT_ONLY, "NTLMSSP_NEGOTIATE_NT_ONLY"),
    (NTLMSSP_ANONYMOUS, "NTLMSSP_ANONYMOUS"),
    (
        NTLMSSP_NEGOTIATE_OEM_DOMAIN_SUPPLIED,
        "NTLMSSP_NEGOTIATE_OEM_DOMAIN_SUPPLIED",
    ),
    (
        NTLMSSP_NEGOTIATE_OEM_WORKSTATION_SUPPLIED,
        "NTLMSSP_NEGOTIATE_OEM_WORKSTATION_SUPPLIED",
    ),
    (NTLMSSP_NEGOTIATE_ALWAYS_SIGN, "NTLMSSP_NEGOTIATE_ALWAYS_SIGN"),
    (NTLMSSP_TARGET_TYPE_DOMAIN, "NTLMSSP_TARGET_TYPE_DOMAIN"),
    (NTLMSSP_TARGET_TYPE_SERVER, "NTLMSSP_TARGET_TYPE_SERVER"),
    (NTLMSSP_TARGET_TYPE_SHARE, "NTLMSSP_TARGET_TYPE_SHARE"),
    (
        NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY,
        "NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY",
    ),
    (NTLMSSP_NEGOTIATE_IDENTIFY, "NTLMSSP_NEGOTIATE_IDENTIFY"),
    (
        NTLMSSP_REQUEST_NON_NT_SESSION_KEY,
        "NTLMSSP_REQUEST_NON_NT_SESSION_KEY",
    ),
    (NTLMSSP_NEGOTIATE_TARGET_INFO, "NTLMSSP_NEGOTIATE_TARGET_INFO"),
    (NTLMSSP_NEGOTIATE_VERSION, "NTLMSSP_NEGOTIATE_VERSION"),
    (NTLMSSP_NEGOTIATE_128, "NTLMSSP_NEGOTIATE_128"),
    (NTLMSSP_NEGOTIATE_KEY_EXCH, "NTLMSSP_NEGOTIATE_KEY_EXCH"),
    (NTLMSSP_NEGOTIATE_56, "NTLMSSP_NEGOTIATE_56"),
];

/// The 32-bit negotiate flag word carried by all three handshake messages.
#[derive(Default, PartialEq, Eq, Copy, Clone)]
#[repr(transparent)]
pub struct Flags(pub u32);

impl Flags {
    pub fn has_flag(&self, flag: u32) -> bool {
        debug_assert_eq!(flag.count_ones(), 1);
        self.0 & flag != 0
    }

    pub fn set_flag(&mut self, flag: u32) {
        debug_assert_eq!(flag.count_ones(), 1);
        self.0 |= flag;
    }

    pub fn clear_flag(&mut self, flag: u32) {
        debug_assert_eq!(flag.count_ones(), 1);
        self.0 &= !flag;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in FLAG_NAMES {
            if self.has_flag(*flag) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("(empty)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear() {
        let mut flags = Flags::default();
        assert!(!flags.has_flag(NTLMSSP_NEGOTIATE_KEY_EXCH));
        flags.set_flag(NTLMSSP_NEGOTIATE_KEY_EXCH);
        assert!(flags.has_flag(NTLMSSP_NEGOTIATE_KEY_EXCH));
        flags.clear_flag(NTLMSSP_NEGOTIATE_KEY_EXCH);
        pretty_assertions::assert_eq!(flags, Flags(0));
    }

    #[test]
    fn wire_values_match_ms_nlmp() {
        pretty_assertions::assert_eq!(NTLMSSP_NEGOTIATE_UNICODE, 1);
        pretty_assertions::assert_eq!(NTLMSSP_NEGOTIATE_EXTENDED_SESSIONSECURITY, 0x0008_0000);
        pretty_assertions::assert_eq!(NTLMSSP_NEGOTIATE_56, 0x8000_0000);
    }

    #[test]
    fn debug_lists_set_flags() {
        let mut flags = Flags::default();
        flags.set_flag(NTLMSSP_NEGOTIATE_UNICODE);
        flags.set_flag(NTLMSSP_NEGOTIATE_56);
        pretty_assertions::assert_eq!(
            format!("{flags:?}"),
            "NTLMSSP_NEGOTIATE_UNICODE|NTLMSSP_NEGOTIATE_56"
        );
    }
}
