//! The operation contract for algorithm backends.
//!
//! A backend implements one public-key algorithm family.  Every
//! operation receives the algorithm id it was dispatched for, so a
//! single backend may be registered under several ids.
//!
//! All methods have default implementations that log an error and
//! refuse the operation; a partial backend is therefore detected at
//! call time, not at registration time.

pub(crate) mod dsa;
pub(crate) mod elgamal;
pub(crate) mod rsa;

use crate::crypto::mpi::{MPI, ProtectedMPI};
use crate::types::{AlgoId, Flags};
use crate::Error;
use crate::Result;

/// Substitute comparison for [`Engine::verify`].
///
/// If given, the backend compares the recovered message against the
/// caller's expectation instead of the plain hash MPI.
pub type Comparator<'a> = &'a dyn Fn(&MPI) -> bool;

fn refuse<T>(operation: &str, algo: AlgoId) -> Result<T> {
    log::error!("no {}() for {}", operation, algo);
    Err(Error::UnsupportedPublicKeyAlgorithm(algo.to_string()).into())
}

/// A public-key algorithm backend.
///
/// MPI arrays are ordered by the descriptor tables: secret keys
/// carry the common parameters first, then the secret-only ones.
#[allow(unused_variables)]
pub trait Engine: Send + Sync {
    /// Generates a key pair of `nbits`.
    ///
    /// Returns the secret key parameters in descriptor order
    /// (common, then secret-only), and the known prime factors of
    /// p-1 for algorithms that have them.  `use_e` is the requested
    /// public exponent for RSA; other algorithms ignore it.
    fn generate(&self, algo: AlgoId, nbits: usize, use_e: u64)
        -> Result<(Vec<ProtectedMPI>, Vec<MPI>)>
    {
        refuse("generate", algo)
    }

    /// Checks the internal consistency of a secret key.
    fn check_secret_key(&self, algo: AlgoId, skey: &[ProtectedMPI])
        -> Result<()>
    {
        refuse("check_secret_key", algo)
    }

    /// Encrypts `data` with the public key.
    fn encrypt(&self, algo: AlgoId, data: &MPI, pkey: &[MPI], flags: Flags)
        -> Result<Vec<MPI>>
    {
        refuse("encrypt", algo)
    }

    /// Decrypts a ciphertext with the secret key.
    fn decrypt(&self, algo: AlgoId, data: &[MPI], skey: &[ProtectedMPI],
               flags: Flags)
        -> Result<MPI>
    {
        refuse("decrypt", algo)
    }

    /// Signs `hash` with the secret key.
    fn sign(&self, algo: AlgoId, hash: &MPI, skey: &[ProtectedMPI])
        -> Result<Vec<MPI>>
    {
        refuse("sign", algo)
    }

    /// Verifies a signature over `hash` with the public key.
    fn verify(&self, algo: AlgoId, hash: &MPI, sig: &[MPI], pkey: &[MPI],
              cmp: Option<Comparator>)
        -> Result<()>
    {
        refuse("verify", algo)
    }

    /// Returns the size of the key in bits, or 0 if unknown.
    fn nbits(&self, algo: AlgoId, pkey: &[MPI]) -> usize {
        log::error!("no nbits() for {}", algo);
        0
    }
}
