pub mod percent;
pub mod signature;

pub use percent::{percent_decode, percent_encode, percent_encode_bytes};
pub use signature::{OAuthCredentials, OAuthParams, OAuthSigner, SignatureError};
