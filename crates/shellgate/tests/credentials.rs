//! Credential classification and verification properties.

use proptest::prelude::*;
use shellgate::auth::{
    Argon2Config, Argon2Variant, CredentialVerifier, Scheme, classify, hash_argon2id, hash_bcrypt,
    verify,
};

/// Cheap Argon2 costs so property runs stay fast.
fn fast_argon() -> Argon2Config {
    Argon2Config {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
        ..Argon2Config::default()
    }
}

proptest! {
    #[test]
    fn plaintext_is_exact_equality(stored in "[a-zA-Z0-9 !#%&]{0,24}", candidate in "[a-zA-Z0-9 !#%&]{0,24}") {
        prop_assert_eq!(classify(&stored), Scheme::Plaintext);
        prop_assert_eq!(verify(&stored, &candidate), stored == candidate);
        prop_assert!(verify(&stored, &stored));
    }

    #[test]
    fn arbitrary_input_never_panics(stored in ".{0,80}", candidate in ".{0,40}") {
        let _ = verify(&stored, &candidate);
    }

    #[test]
    fn dollar_heavy_input_never_panics(stored in "[$a-z0-9=,+/]{0,64}", candidate in ".{0,16}") {
        let _ = classify(&stored);
        let _ = verify(&stored, &candidate);
    }

    #[test]
    fn bcrypt_prefix_always_classifies_bcrypt(prefix in prop::sample::select(vec!["$2a$", "$2b$", "$2y$"]), rest in ".{0,40}") {
        let stored = format!("{prefix}{rest}");
        prop_assert_eq!(classify(&stored), Scheme::Bcrypt);
        // Malformed bcrypt never verifies and never panics
        let _ = verify(&stored, "anything");
    }
}

#[test]
fn argon2id_hash_round_trip() {
    let hash = hash_argon2id("correct horse", &fast_argon()).unwrap();
    assert_eq!(classify(&hash), Scheme::Argon2(Argon2Variant::Id));
    assert!(verify(&hash, "correct horse"));
    assert!(!verify(&hash, "correct horse "));
}

#[test]
fn corrupted_argon2_digest_fails() {
    let hash = hash_argon2id("pw", &fast_argon()).unwrap();
    let (head, digest) = hash.rsplit_once('$').unwrap();
    let first = digest.chars().next().unwrap();
    let swapped = if first == 'A' { 'B' } else { 'A' };
    let corrupted = format!("{head}${swapped}{}", &digest[1..]);

    assert!(!verify(&corrupted, "pw"));
}

/// Replace the `$`-separated field at `index` of a stored hash.
fn with_field(hash: &str, index: usize, edit: impl Fn(&str) -> String) -> String {
    let mut fields: Vec<String> = hash.split('$').map(str::to_string).collect();
    fields[index] = edit(&fields[index]);
    fields.join("$")
}

fn swap_first_char(field: &str) -> String {
    let swapped = if field.starts_with('A') { 'B' } else { 'A' };
    format!("{swapped}{}", &field[1..])
}

#[test]
fn corrupted_argon2_salt_fails() {
    let hash = hash_argon2id("pw", &fast_argon()).unwrap();
    let corrupted = with_field(&hash, 4, swap_first_char);

    assert_ne!(corrupted, hash);
    assert_eq!(classify(&corrupted), Scheme::Argon2(Argon2Variant::Id));
    assert!(!verify(&corrupted, "pw"));
}

#[test]
fn version_16_string_never_verifies() {
    let stored = "$argon2id$v=16$m=256,t=1,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNoaGFzaGhhc2hoYXNoaGFzaA";
    assert_eq!(classify(stored), Scheme::Argon2(Argon2Variant::Id));
    assert!(!verify(stored, "pw"));
    assert!(!verify(stored, stored));

    // A genuine hash relabelled as version 16 is rejected too
    let hash = hash_argon2id("pw", &fast_argon()).unwrap();
    let relabelled = hash.replacen("$v=19$", "$v=16$", 1);
    assert_ne!(relabelled, hash);
    assert!(!verify(&relabelled, "pw"));
}

#[test]
fn invalid_base64_never_verifies() {
    let hash = hash_argon2id("pw", &fast_argon()).unwrap();
    let bad_salt = with_field(&hash, 4, |salt| format!("*{}", &salt[1..]));
    let bad_digest = with_field(&hash, 5, |digest| format!("{}*", &digest[..digest.len() - 1]));

    for stored in [bad_salt, bad_digest] {
        assert_eq!(classify(&stored), Scheme::Argon2(Argon2Variant::Id));
        assert!(!verify(&stored, "pw"), "{stored} verified");
    }
}

#[test]
fn argon2d_never_verifies() {
    let hash = hash_argon2id("pw", &fast_argon()).unwrap();
    let as_d = hash.replacen("$argon2id$", "$argon2d$", 1);
    assert_eq!(classify(&as_d), Scheme::Argon2(Argon2Variant::D));
    assert!(!verify(&as_d, "pw"));
}

#[test]
fn five_field_dollar_string_is_plaintext() {
    let stored = "$argon2id$v=19$m=8,t=1,p=1$c2FsdA";
    assert_eq!(classify(stored), Scheme::Plaintext);
    assert!(verify(stored, stored));
}

#[test]
fn bcrypt_hash_verifies() {
    let hash = hash_bcrypt("hunter2", 4).unwrap();
    let verifier = CredentialVerifier::new(hash);
    assert_eq!(verifier.scheme(), Scheme::Bcrypt);
    assert!(verifier.verify("hunter2"));
    assert!(!verifier.verify("hunter3"));
}
