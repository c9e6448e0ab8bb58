//! Orchid Identity
//!
//! This crate derives the stable, collision-resistant identity of a run from
//! its semantic inputs: the material key, the resolved configuration, and an
//! optional source-control revision and run label.
//!
//! Identity derivation is a pure function. The timestamp is an explicit
//! parameter, never read from the ambient clock here, so identical inputs
//! always produce a byte-identical identity, and tests can pin a timestamp
//! and assert exact output. Configuration hashing goes through a canonical
//! JSON form (recursively sorted keys, compact separators), so semantically
//! equal configs hash identically regardless of key order.

mod git;
mod hash;
mod identity;

pub use git::git_short_sha;
pub use hash::{canonical_json, sha256_file, sha256_hex, short_hash};
pub use identity::{
  CONFIG_HASH_LEN, INPUT_HASH_LEN, IdentityError, RunIdentity, sanitize_component,
};
