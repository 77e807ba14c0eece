//! # natsctl store
//!
//! Persistence for signed claims and user credential bundles.
//!
//! ## Overview
//!
//! Claim documents are stored as signed tokens behind the [`ClaimStore`]
//! trait. [`ClaimStoreExt`] adds typed reads (decode and verify) and signed
//! writes on top of any backend. The primary backend is [`FsClaimStore`],
//! which uses the directory layout `nsc` expects; [`MemoryClaimStore`] is for
//! tests.
//!
//! ## Key Types
//!
//! - [`ClaimStore`] - raw token storage per operator and account
//! - [`ClaimStoreExt`] - verified reads and signed writes
//! - [`FsClaimStore`] - filesystem backend
//! - [`MemoryClaimStore`] - in-memory backend
//! - [`CredsStore`] - owner-only `.creds` bundles

pub mod creds;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use creds::CredsStore;
pub use error::{Result, StoreError};
pub use fs::FsClaimStore;
pub use memory::MemoryClaimStore;
pub use traits::{ClaimStore, ClaimStoreExt};
