//! The cryptographic core of NTLMSSP (MS-NLMP): credential derivation,
//! challenge/response computation, session-key derivation and per-message
//! signing for both the client and the server role, in the v1 and v2
//! algorithm families.
//!
//! The crate is transport-agnostic and does not frame the NEGOTIATE,
//! CHALLENGE and AUTHENTICATE envelopes; it consumes and produces their
//! parsed forms (see [`messages`]). Drive one of the concrete session types
//! through the three-message handshake and use `mac`/`verify_mac` for
//! application payloads afterwards:
//!
//! ```
//! use ntlm_session::{Result, V2ClientSession, V2ServerSession};
//!
//! fn handshake() -> Result<()> {
//!     let mut server = V2ServerSession::new();
//!     server.session_data_mut().password = "Password".into();
//!     server.target_info_add_domain_name("Domain");
//!
//!     let mut client = V2ClientSession::new();
//!     client.session_data_mut().set_user_info("User", "Password", "Domain", "COMPUTER");
//!
//!     let challenge = server.generate_challenge()?;
//!     client.process_challenge(challenge)?;
//!     let authenticate = client.generate_authenticate()?;
//!     server.process_authenticate(authenticate)?;
//!
//!     let signature = client.mac(b"payload", 0)?;
//!     assert!(server.verify_mac(b"payload", &signature, 0)?);
//!     Ok(())
//! }
//! # handshake().unwrap();
//! ```
//!
//! NTLM is an obsolete protocol kept for legacy interoperability. This core
//! does not reject weak modes by policy; callers choose the flag word.

mod crypto;
mod error;
pub mod messages;
pub mod session;

pub use error::{Error, Result};
pub use session::{
    Mode, Session, SessionData, SystemClock, TimeSource, V1ClientSession, V1ServerSession,
    V2ClientSession, V2ServerSession,
};
