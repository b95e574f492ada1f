//! Strong random numbers.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::Error;
use crate::Result;

/// Fills the given buffer with random data.
///
/// Fills the given buffer with random data produced by a
/// cryptographically secure pseudorandom number generator (CSPRNG).
/// The output may be used as session keys or to derive long-term
/// cryptographic keys from.
pub fn strong_random(buf: &mut [u8]) -> Result<()> {
    OsRng.try_fill_bytes(buf)
        .map_err(|e| Error::InternalError(format!("CSPRNG failure: {}", e)))?;
    Ok(())
}
