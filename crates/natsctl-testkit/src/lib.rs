//! # natsctl Testkit
//!
//! Testing utilities for natsctl.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Subject matching cases with known outcomes
//! - **Generators**: Proptest strategies for subjects, role inputs and keys
//! - **Fixtures**: A working root in a temporary directory with a fake resolver
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use natsctl_testkit::generators::template_input;
//!
//! proptest! {
//!     #[test]
//!     fn reply_follows_flag(input in template_input()) {
//!         let template = natsctl_perms::derive_template(input.clone());
//!         prop_assert_eq!(template.resp.is_some(), input.allow_reply);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use natsctl_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new().with_account().await;
//! assert_eq!(fixture.plaintext_keys(), 0);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{count_plaintext_keys, FakeResolver, ResolverCall, TestFixture};
