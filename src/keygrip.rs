//! Key fingerprints.

use crate::crypto::hash::HashAlgorithm;
use crate::sexp::Sexp;
use crate::tables;
use crate::types::PK_RSA;
use crate::Error;
use crate::Result;

/// Computes the keygrip of a key.
///
/// The keygrip is the SHA-1 hash of the public key parameters,
/// expressed in a way that depends on the algorithm: for RSA, only
/// the raw modulus bytes are hashed (for PKCS#15 compatibility); for
/// all other algorithms, every grip parameter is wrapped in
/// canonical S-expression syntax `(1:<name><len>:<value>)` before
/// hashing.
///
/// Public, private, and protected private keys are accepted; the
/// grip is the same for all three since it only covers public
/// parameters.
pub fn keygrip(key: &Sexp) -> Result<[u8; 20]> {
    let list = key.find_token(b"public-key")
        .or_else(|| key.find_token(b"private-key"))
        .or_else(|| key.find_token(b"protected-private-key"))
        .ok_or_else(|| Error::MalformedExpression(
            "no key object".into()))?;
    let list = list.nth(1)
        .ok_or_else(|| Error::MalformedExpression(
            "key without algorithm list".into()))?;
    let name = list.nth(0).and_then(Sexp::atom)
        .ok_or_else(|| Error::MalformedExpression(
            "invalid structure of key object".into()))?;
    let info = tables::algo_info_by_name(name)
        .ok_or_else(|| Error::UnsupportedPublicKeyAlgorithm(
            String::from_utf8_lossy(name).into_owned()))?;

    let is_rsa = info.algo == PK_RSA;
    let mut md = HashAlgorithm::SHA1.context()?;

    for c in info.grip.chars() {
        let param = list.find_token(&[c as u8])
            .ok_or_else(|| Error::MissingElement(
                format!("grip parameter {}", c)))?;
        let data = param.nth(1).and_then(Sexp::atom)
            .ok_or_else(|| Error::MalformedExpression(
                format!("grip parameter {} is not a plain value", c)))?;

        if !is_rsa {
            md.update(format!("(1:{}{}:", c, data.len()).as_bytes());
        }
        md.update(data);
        if !is_rsa {
            md.update(b")");
        }
    }

    let mut grip = [0u8; 20];
    md.digest(&mut grip);
    Ok(grip)
}
