//! Password authentication.
//!
//! - [`credential`]: scheme classification and verification of the stored password
//! - [`argon`]: Argon2 encoded-hash handling
//! - [`log`]: the audit trail of every attempt

pub mod argon;
pub mod credential;
pub mod log;

pub use argon::{Argon2Config, Argon2Descriptor, Argon2Variant, hash_argon2id};
pub use credential::{CredentialVerifier, Scheme, classify, hash_bcrypt, verify};
pub use log::{AuthAttempt, AuthLog, AuthMethod};
