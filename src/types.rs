//! Algorithm identifiers, usage flags, and data flags.

/// Numeric public-key algorithm identifier.
///
/// The well-known identifiers below match the values used on the
/// wire by OpenPGP and by the original C implementation.  The range
/// [`USER_ID_START`, `USER_ID_END`) is reserved for backends
/// registered at run time.
pub type AlgoId = u32;

/// RSA.
pub const PK_RSA: AlgoId = 1;
/// ElGamal, encrypt-only variant.
pub const PK_ELG_E: AlgoId = 16;
/// DSA.
pub const PK_DSA: AlgoId = 17;
/// ElGamal, sign and encrypt.
pub const PK_ELG: AlgoId = 20;

/// First identifier handed out to user-registered backends.
pub const USER_ID_START: AlgoId = 500;
/// One past the last identifier handed out to user-registered
/// backends.
pub const USER_ID_END: AlgoId = 600;

/// What a public-key algorithm can be used for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    /// The algorithm can sign and verify.
    pub sign: bool,
    /// The algorithm can encrypt and decrypt.
    pub encrypt: bool,
}

impl Usage {
    /// Signing only.
    pub const SIGN: Usage = Usage { sign: true, encrypt: false };

    /// Encryption only.
    pub const ENCRYPT: Usage = Usage { sign: false, encrypt: true };

    /// Signing and encryption.
    pub const BOTH: Usage = Usage { sign: true, encrypt: true };

    /// Returns whether `self` covers everything `requested` asks
    /// for.  An empty request is a "don't care" and always covered.
    pub fn covers(&self, requested: Usage) -> bool {
        (!requested.sign || self.sign)
            && (!requested.encrypt || self.encrypt)
    }
}

/// Flags parsed from a `(flags ...)` list.
///
/// `raw` and `pkcs1` select the framing applied to data; the
/// remaining flags are handed through to the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// No framing; the value is used as-is.
    pub raw: bool,
    /// PKCS#1 framing: block type 1 when signing, block type 2 when
    /// encrypting.
    pub pkcs1: bool,
    /// Skip the blinding step in RSA secret-key operations.
    pub no_blinding: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_covers() {
        assert!(Usage::BOTH.covers(Usage::SIGN));
        assert!(Usage::BOTH.covers(Usage::ENCRYPT));
        assert!(Usage::SIGN.covers(Usage::default()));
        assert!(!Usage::SIGN.covers(Usage::ENCRYPT));
        assert!(!Usage::ENCRYPT.covers(Usage::BOTH));
    }
}
