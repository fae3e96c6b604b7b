//! Argon2 encoded-hash parsing, verification and encoding.
//!
//! Stored form: `$<variant>$v=<version>$m=<kib>,t=<iterations>,p=<lanes>$<salt>$<digest>`
//! with salt and digest in standard base64, padding optional.

use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::AuthError;

/// The only Argon2 version accepted when verifying (0x13).
pub const SUPPORTED_VERSION: u32 = 0x13;

/// Argon2 variant named in a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Argon2Variant {
    /// Argon2id.
    Id,
    /// Argon2i.
    I,
    /// Argon2d. Recognized but never verifies.
    D,
}

impl Argon2Variant {
    /// Map a variant tag (`argon2id`, `argon2i`, `argon2d`).
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "argon2id" => Some(Self::Id),
            "argon2i" => Some(Self::I),
            "argon2d" => Some(Self::D),
            _ => None,
        }
    }

    /// The tag as written in the encoded form.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Id => "argon2id",
            Self::I => "argon2i",
            Self::D => "argon2d",
        }
    }

    /// Algorithm used to recompute the digest, `None` for unsupported variants.
    const fn algorithm(self) -> Option<Algorithm> {
        match self {
            Self::Id => Some(Algorithm::Argon2id),
            Self::I => Some(Algorithm::Argon2i),
            Self::D => None,
        }
    }
}

impl std::fmt::Display for Argon2Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A parsed Argon2 credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argon2Descriptor {
    /// Variant named in the first field.
    pub variant: Argon2Variant,
    /// Declared algorithm version.
    pub version: u32,
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Decoded salt.
    pub salt: Vec<u8>,
    /// Decoded digest; its length sets the recomputed output length.
    pub digest: Vec<u8>,
}

impl Argon2Descriptor {
    /// Parse an encoded Argon2 credential. Returns `None` for anything malformed.
    #[must_use]
    pub fn parse(stored: &str) -> Option<Self> {
        let fields: Vec<&str> = stored.split('$').collect();
        let [leading, variant, version, costs, salt, digest] = fields.as_slice() else {
            return None;
        };
        if !leading.is_empty() {
            return None;
        }

        let variant = Argon2Variant::from_tag(variant)?;
        let version = version.strip_prefix("v=")?.parse().ok()?;
        let (memory_kib, iterations, parallelism) = parse_costs(costs)?;

        Some(Self {
            variant,
            version,
            memory_kib,
            iterations,
            parallelism,
            salt: decode_b64(salt)?,
            digest: decode_b64(digest)?,
        })
    }

    /// Recompute the digest for `candidate` and compare in constant time.
    ///
    /// Unsupported versions, the `argon2d` variant and cost parameters the
    /// library rejects all answer `false`.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        if self.version != SUPPORTED_VERSION {
            return false;
        }
        let Some(algorithm) = self.variant.algorithm() else {
            return false;
        };
        let Ok(params) = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(self.digest.len()),
        ) else {
            return false;
        };

        let mut computed = vec![0u8; self.digest.len()];
        if Argon2::new(algorithm, Version::V0x13, params)
            .hash_password_into(candidate.as_bytes(), &self.salt, &mut computed)
            .is_err()
        {
            return false;
        }

        computed.ct_eq(&self.digest).into()
    }
}

/// Parse `m=<int>,t=<int>,p=<int>` in exactly that order.
fn parse_costs(field: &str) -> Option<(u32, u32, u32)> {
    let mut parts = field.split(',');
    let m = parts.next()?.strip_prefix("m=")?.parse().ok()?;
    let t = parts.next()?.strip_prefix("t=")?.parse().ok()?;
    let p = parts.next()?.strip_prefix("p=")?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((m, t, p))
}

/// Decode standard base64, restoring stripped padding first.
fn decode_b64(field: &str) -> Option<Vec<u8>> {
    let padded = match field.len() % 4 {
        2 => format!("{field}=="),
        3 => format!("{field}="),
        _ => field.to_string(),
    };
    STANDARD.decode(padded).ok()
}

/// Cost parameters for [`hash_argon2id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Config {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
    /// Salt length in bytes.
    pub salt_len: usize,
    /// Digest length in bytes.
    pub digest_len: usize,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 2,
            salt_len: 16,
            digest_len: 32,
        }
    }
}

/// Hash `password` with Argon2id and a fresh random salt.
///
/// The result uses unpadded base64 and verifies with [`Argon2Descriptor::matches`].
pub fn hash_argon2id(password: &str, config: &Argon2Config) -> Result<String, AuthError> {
    let params = Params::new(
        config.memory_kib,
        config.iterations,
        config.parallelism,
        Some(config.digest_len),
    )
    .map_err(|e| AuthError::Argon2Params(e.to_string()))?;

    let mut salt = vec![0u8; config.salt_len];
    rand::rng().fill_bytes(&mut salt);

    let mut digest = vec![0u8; config.digest_len];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password.as_bytes(), &salt, &mut digest)
        .map_err(|e| AuthError::Argon2(e.to_string()))?;

    Ok(format!(
        "$argon2id$v={SUPPORTED_VERSION}$m={},t={},p={}${}${}",
        config.memory_kib,
        config.iterations,
        config.parallelism,
        STANDARD_NO_PAD.encode(&salt),
        STANDARD_NO_PAD.encode(&digest),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Small costs keep the tests fast.
    const FAST: Argon2Config = Argon2Config {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
        salt_len: 16,
        digest_len: 32,
    };

    #[test]
    fn parse_fields() {
        let desc = Argon2Descriptor::parse("$argon2i$v=19$m=4096,t=2,p=1$c29tZXNhbHQ$aGFzaA").unwrap();
        assert_eq!(desc.variant, Argon2Variant::I);
        assert_eq!(desc.version, 19);
        assert_eq!((desc.memory_kib, desc.iterations, desc.parallelism), (4096, 2, 1));
        assert_eq!(desc.salt, b"somesalt");
        assert_eq!(desc.digest, b"hash");
    }

    #[test]
    fn parse_rejects_reordered_costs() {
        assert!(Argon2Descriptor::parse("$argon2id$v=19$t=2,m=4096,p=1$c2FsdA$aGFzaA").is_none());
        assert!(Argon2Descriptor::parse("$argon2id$v=19$m=4096,t=2$c2FsdA$aGFzaA").is_none());
        assert!(Argon2Descriptor::parse("$argon2id$19$m=4096,t=2,p=1$c2FsdA$aGFzaA").is_none());
    }

    #[test]
    fn padding_is_optional() {
        assert_eq!(decode_b64("aGFzaA").unwrap(), b"hash");
        assert_eq!(decode_b64("aGFzaA==").unwrap(), b"hash");
        assert_eq!(decode_b64("c2FsdDE").unwrap(), b"salt1");
        assert!(decode_b64("abcde").is_none());
    }

    #[test]
    fn hash_then_verify() {
        let encoded = hash_argon2id("s3cret", &FAST).unwrap();
        let desc = Argon2Descriptor::parse(&encoded).unwrap();
        assert_eq!(desc.variant, Argon2Variant::Id);
        assert!(desc.matches("s3cret"));
        assert!(!desc.matches("s3cret "));
    }

    #[test]
    fn other_version_never_matches() {
        let encoded = hash_argon2id("pw", &FAST).unwrap();
        let mut desc = Argon2Descriptor::parse(&encoded).unwrap();
        desc.version = 0x10;
        assert!(!desc.matches("pw"));
    }

    #[test]
    fn argon2d_fails_closed() {
        let encoded = hash_argon2id("pw", &FAST).unwrap().replacen("argon2id", "argon2d", 1);
        let desc = Argon2Descriptor::parse(&encoded).unwrap();
        assert_eq!(desc.variant, Argon2Variant::D);
        assert!(!desc.matches("pw"));
    }

    #[test]
    fn rejected_params_do_not_match() {
        let desc = Argon2Descriptor {
            variant: Argon2Variant::Id,
            version: SUPPORTED_VERSION,
            memory_kib: 1,
            iterations: 0,
            parallelism: 0,
            salt: b"saltsalt".to_vec(),
            digest: vec![0; 32],
        };
        assert!(!desc.matches("pw"));
    }

    #[test]
    fn invalid_cost_config_is_an_error() {
        let config = Argon2Config {
            parallelism: 0,
            ..FAST
        };
        assert!(matches!(hash_argon2id("pw", &config), Err(AuthError::Argon2Params(_))));
    }
}
