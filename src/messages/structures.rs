mod filetime;
pub use filetime::FileTime;

mod single_host_data;
pub use single_host_data::SingleHostData;

mod avid;
pub use avid::{AvId, AvPair, MsvAvFlags};

mod keys;
pub use keys::{
    ClientChallenge, EncryptedRandomSessionKey, ExportedSessionKey, KeyExchangeKey, NtProofStr,
    Response16, Response24, ServerChallenge, SessionBaseKey, SigningKey,
};

mod lm_challenge;
pub use lm_challenge::{Lmv1Challenge, Lmv2Challenge};

mod nt_challenge;
pub use nt_challenge::{Ntv1Challenge, Ntv2Challenge, Ntv2Response};

mod signature;
pub use signature::MessageSignature;

mod version;
pub use version::{Version, NTLMSSP_REVISION_W2K3};
