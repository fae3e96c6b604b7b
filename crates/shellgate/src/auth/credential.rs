//! Stored-credential classification and verification.

use subtle::ConstantTimeEq;

use super::argon::{Argon2Descriptor, Argon2Variant};
use crate::error::AuthError;

/// Prefixes that mark a bcrypt hash.
const BCRYPT_PREFIXES: [&str; 3] = ["$2a$", "$2b$", "$2y$"];

/// Algorithm family of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    /// Compared byte for byte.
    Plaintext,
    /// bcrypt (`$2a$`, `$2b$`, `$2y$`).
    Bcrypt,
    /// Argon2 encoded hash.
    Argon2(Argon2Variant),
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plaintext => f.write_str("plaintext"),
            Self::Bcrypt => f.write_str("bcrypt"),
            Self::Argon2(variant) => variant.fmt(f),
        }
    }
}

/// Classify a stored credential.
///
/// bcrypt prefixes win; otherwise a string of exactly six `$`-separated
/// fields, the first empty and the rest non-empty, naming an Argon2 variant
/// is Argon2; anything else is plaintext.
#[must_use]
pub fn classify(stored: &str) -> Scheme {
    if BCRYPT_PREFIXES.iter().any(|p| stored.starts_with(p)) {
        return Scheme::Bcrypt;
    }

    let fields: Vec<&str> = stored.split('$').collect();
    if fields.len() == 6 && fields[0].is_empty() && fields[1..].iter().all(|f| !f.is_empty()) {
        if let Some(variant) = Argon2Variant::from_tag(fields[1]) {
            return Scheme::Argon2(variant);
        }
    }

    Scheme::Plaintext
}

/// Check `candidate` against `stored`.
///
/// Total: malformed hashes, unsupported versions and library errors all
/// answer `false`.
#[must_use]
pub fn verify(stored: &str, candidate: &str) -> bool {
    match classify(stored) {
        Scheme::Bcrypt => bcrypt::verify(candidate, stored).unwrap_or(false),
        Scheme::Argon2(_) => {
            Argon2Descriptor::parse(stored).is_some_and(|desc| desc.matches(candidate))
        }
        Scheme::Plaintext => stored.as_bytes().ct_eq(candidate.as_bytes()).into(),
    }
}

/// Hash `password` with bcrypt at the given cost.
pub fn hash_bcrypt(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// The configured login credential.
///
/// Holds only the stored string; the scheme is re-derived on every call.
#[derive(Clone)]
pub struct CredentialVerifier {
    stored: String,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("scheme", &self.scheme())
            .finish()
    }
}

impl CredentialVerifier {
    /// Wrap a stored credential.
    #[must_use]
    pub fn new(stored: impl Into<String>) -> Self {
        Self {
            stored: stored.into(),
        }
    }

    /// Scheme of the stored credential.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        classify(&self.stored)
    }

    /// Check a candidate password.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        verify(&self.stored, candidate)
    }
}
