//! Proptest generators for property-based testing.

use proptest::prelude::*;

use natsctl_core::{KeyKind, KeyPair};
use natsctl_perms::TemplateInput;

/// Generate a key kind.
pub fn key_kind() -> impl Strategy<Value = KeyKind> {
    prop_oneof![
        Just(KeyKind::Operator),
        Just(KeyKind::Account),
        Just(KeyKind::User),
    ]
}

/// Generate a key pair of any kind from a random seed.
pub fn keypair() -> impl Strategy<Value = KeyPair> {
    (key_kind(), any::<[u8; 32]>()).prop_map(|(kind, seed)| KeyPair::from_raw_seed(kind, &seed))
}

/// Generate a literal subject token.
pub fn subject_token() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,7}".prop_map(String::from)
}

/// Generate a subject pattern: literal and `*` tokens, optionally ending in `>`.
pub fn subject() -> impl Strategy<Value = String> {
    let token = prop_oneof![4 => subject_token(), 1 => Just("*".to_string())];
    (prop::collection::vec(token, 1..=4), any::<bool>()).prop_map(|(mut tokens, tail)| {
        if tail {
            tokens.push(">".to_string());
        }
        tokens.join(".")
    })
}

/// Generate a list of up to `max_len` distinct subject patterns.
pub fn subject_list(max_len: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(subject(), 0..=max_len)
        .prop_map(|subjects| subjects.into_iter().collect())
}

/// Generate a valid role template input.
pub fn template_input() -> impl Strategy<Value = TemplateInput> {
    (subject_list(4), subject_list(4), any::<bool>()).prop_map(
        |(pub_allow, sub_allow, allow_reply)| TemplateInput {
            pub_allow,
            sub_allow,
            allow_reply,
        },
    )
}

/// Generate a role or user name as used in the scenarios.
pub fn entity_name() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_-]{0,15}".prop_map(String::from)
}
