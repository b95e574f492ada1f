//! Public-key algorithm dispatcher speaking canonical S-expressions.
//!
//! This crate provides the front end of a pluggable public-key
//! subsystem: keys, data to be signed or encrypted, signatures, and
//! encrypted values are all expressed as canonical [S-expressions],
//! normalized into algorithm-specific arrays of multi-precision
//! integers, and routed through a registry of algorithm backends.
//! Results travel back the same way.
//!
//! [S-expressions]: https://people.csail.mit.edu/rivest/Sexp.txt
//!
//! A public key is written as
//!
//! ```text
//! (public-key (rsa (n #00C2...#) (e #010001#)))
//! ```
//!
//! and a private key adds the secret parameters after the public
//! ones.  Data for encryption or signing is either a bare integer
//! (the legacy form) or
//!
//! ```text
//! (data [(flags raw|pkcs1|no-blinding ...)]
//!       (hash sha1 <digest>) | (value <bytes>))
//! ```
//!
//! where the `pkcs1` flag selects PKCS#1 block type 1 (signing) or
//! block type 2 (encryption) framing.
//!
//! The built-in backends cover RSA, DSA and ElGamal.  Additional
//! backends may be registered at run time under ids from a reserved
//! range; see [`registry::Registry::register`].
//!
//! # Examples
//!
//! ```
//! use sexp_pubkey::{Sexp, generate_key, sign, verify};
//!
//! # fn main() -> sexp_pubkey::Result<()> {
//! let key = generate_key(
//!     &Sexp::from_bytes(b"(genkey (rsa (nbits \"768\")))")?)?;
//! let public = key.find_token(b"public-key").unwrap().clone();
//! let secret = key.find_token(b"private-key").unwrap().clone();
//!
//! let digest = [0x5a; 20];
//! let data = Sexp::list(vec![
//!     Sexp::string("data"),
//!     Sexp::list(vec![Sexp::string("flags"), Sexp::string("pkcs1")]),
//!     Sexp::list(vec![Sexp::string("hash"), Sexp::string("sha1"),
//!                     Sexp::string(&digest[..])]),
//! ]);
//!
//! let sig = sign(&data, &secret)?;
//! verify(&sig, &data, &public)?;
//! # Ok(()) }
//! ```

#![warn(missing_docs)]

pub mod sexp;
pub use sexp::Sexp;

pub mod crypto;

pub mod types;
pub use types::{AlgoId, Flags, Usage};

pub mod tables;

mod padding;
mod marshal;

pub mod backend;
pub mod registry;
pub use registry::Registry;

mod dispatch;

mod keygrip;
pub use keygrip::keygrip;

/// Crate result specialization.
pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

/// Errors returned by this crate.
///
/// Note: This enum cannot be exhaustively matched to allow future
/// extensions.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// A malformed S-expression, or one of an unexpected shape.
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    /// A required element is absent.
    #[error("Missing element: {0}")]
    MissingElement(String),

    /// Unknown, unregistered, or disabled public-key algorithm.
    #[error("Unsupported public key algorithm: {0}")]
    UnsupportedPublicKeyAlgorithm(String),

    /// Unknown message-digest algorithm.
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    /// The algorithm does not support the requested usage.
    #[error("Wrong key usage: {0}")]
    WrongKeyUsage(String),

    /// An unrecognized flag in a `(flags ...)` list.
    #[error("Invalid flag: {0}")]
    InvalidFlag(String),

    /// Conflicting inputs, e.g. the algorithm of the key does not
    /// match the algorithm of the data.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The key is too short for the requested framing.
    #[error("Too short: {0}")]
    TooShort(String),

    /// Allocation from the secure pool failed.
    #[error("Out of secure memory")]
    OutOfMemory,

    /// Invalid operation.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The functionality is not implemented.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// An internal inconsistency.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// The backend refused to produce a result for otherwise valid
    /// input.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Bad signature.
    #[error("Bad signature: {0}")]
    BadSignature(String),

    /// The key fails its consistency check.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// This marks this enum as non-exhaustive.  Do not use this
    /// variant.
    #[doc(hidden)] #[error("__Nonexhaustive")] __Nonexhaustive,
}

pub use dispatch::{
    decrypt,
    encrypt,
    generate_key,
    key_nbits,
    sign,
    test_key,
    verify,
};
