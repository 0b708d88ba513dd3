pub mod service_key;
pub mod signature;

pub use service_key::{ServiceAuthenticator, ServiceIdentity};
pub use signature::{SignaturePolicy, SignatureVerifier};
