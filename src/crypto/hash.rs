//! Message digests and their DER DigestInfo prefixes.

use std::fmt;
use std::io;

use digest::DynDigest;
use digest::FixedOutput as _;

use crate::Error;
use crate::Result;

/// Thin wrapper making [`sha1collisiondetection::Sha1CD`] usable as a
/// [`DynDigest`], which requires `FixedOutputReset`.  The upstream
/// crate only implements `FixedOutput` (finalize by value), so we
/// bridge the gap here by cloning the context to obtain an owned
/// value to finalize, then resetting the original in place.
#[derive(Clone, Default)]
struct Sha1CDResettable(sha1collisiondetection::Sha1CD);

impl digest::HashMarker for Sha1CDResettable {}

impl digest::Update for Sha1CDResettable {
    fn update(&mut self, input: &[u8]) {
        self.0.update(input);
    }
}

impl digest::Reset for Sha1CDResettable {
    fn reset(&mut self) {
        self.0.reset();
    }
}

impl digest::OutputSizeUser for Sha1CDResettable {
    type OutputSize = <sha1collisiondetection::Sha1CD as digest::OutputSizeUser>::OutputSize;
}

impl digest::FixedOutput for Sha1CDResettable {
    fn finalize_into(self, out: &mut digest::Output<Self>) {
        self.0.finalize_into(out);
    }
}

impl digest::FixedOutputReset for Sha1CDResettable {
    fn finalize_into_reset(&mut self, out: &mut digest::Output<Self>) {
        self.0.clone().finalize_into(out);
        self.0.reset();
    }
}

/// The message-digest algorithms known to the dispatcher.
///
/// This is the set of algorithms that may appear in a
/// `(hash <algo> <digest>)` element.  Not all of them can be
/// computed here; [`HashAlgorithm::is_supported`] tells them apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// MD2.
    MD2,
    /// MD4.
    MD4,
    /// MD5.
    MD5,
    /// RIPEMD-160.
    RipeMD,
    /// SHA-1.
    SHA1,
    /// SHA-256.
    SHA256,
    /// SHA-384.
    SHA384,
    /// SHA-512.
    SHA512,
    /// Tiger/192.
    Tiger,
    /// HAVAL, 5 pass, 160 bit.
    Haval,
}

// DER encoded DigestInfo prefixes.  Appending the raw digest yields
// the complete DigestInfo structure.
const ASN_MD2: &[u8] =
    &[0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86,
      0xf7, 0x0d, 0x02, 0x02, 0x05, 0x00, 0x04, 0x10];
const ASN_MD4: &[u8] =
    &[0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86,
      0xf7, 0x0d, 0x02, 0x04, 0x05, 0x00, 0x04, 0x10];
const ASN_MD5: &[u8] =
    &[0x30, 0x20, 0x30, 0x0c, 0x06, 0x08, 0x2a, 0x86, 0x48, 0x86,
      0xf7, 0x0d, 0x02, 0x05, 0x05, 0x00, 0x04, 0x10];
const ASN_RMD160: &[u8] =
    &[0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x24, 0x03, 0x02,
      0x01, 0x05, 0x00, 0x04, 0x14];
const ASN_SHA1: &[u8] =
    &[0x30, 0x21, 0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02,
      0x1a, 0x05, 0x00, 0x04, 0x14];
const ASN_SHA256: &[u8] =
    &[0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01,
      0x65, 0x03, 0x04, 0x02, 0x01, 0x05, 0x00, 0x04, 0x20];
const ASN_SHA384: &[u8] =
    &[0x30, 0x41, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01,
      0x65, 0x03, 0x04, 0x02, 0x02, 0x05, 0x00, 0x04, 0x30];
const ASN_SHA512: &[u8] =
    &[0x30, 0x51, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01,
      0x65, 0x03, 0x04, 0x02, 0x03, 0x05, 0x00, 0x04, 0x40];

impl HashAlgorithm {
    /// Looks up an algorithm by its canonical name.
    pub fn from_name(name: &[u8]) -> Option<HashAlgorithm> {
        use self::HashAlgorithm::*;
        match name {
            b"sha1" => Some(SHA1),
            b"md5" => Some(MD5),
            b"rmd160" => Some(RipeMD),
            b"sha256" => Some(SHA256),
            b"sha384" => Some(SHA384),
            b"sha512" => Some(SHA512),
            b"md2" => Some(MD2),
            b"md4" => Some(MD4),
            b"tiger" => Some(Tiger),
            b"haval" => Some(Haval),
            _ => None,
        }
    }

    /// Returns the canonical name of this algorithm.
    pub fn name(&self) -> &'static str {
        use self::HashAlgorithm::*;
        match self {
            MD2 => "md2",
            MD4 => "md4",
            MD5 => "md5",
            RipeMD => "rmd160",
            SHA1 => "sha1",
            SHA256 => "sha256",
            SHA384 => "sha384",
            SHA512 => "sha512",
            Tiger => "tiger",
            Haval => "haval",
        }
    }

    /// Returns the size of the digest in bytes.
    pub fn digest_size(&self) -> usize {
        use self::HashAlgorithm::*;
        match self {
            MD2 | MD4 | MD5 => 16,
            RipeMD | SHA1 | Haval => 20,
            Tiger => 24,
            SHA256 => 32,
            SHA384 => 48,
            SHA512 => 64,
        }
    }

    /// Returns the DER encoded DigestInfo prefix for this algorithm.
    ///
    /// Appending the raw digest to the prefix yields the DigestInfo
    /// structure used by PKCS#1 block type 1 framing.
    pub fn asn(&self) -> Result<&'static [u8]> {
        use self::HashAlgorithm::*;
        match self {
            MD2 => Ok(ASN_MD2),
            MD4 => Ok(ASN_MD4),
            MD5 => Ok(ASN_MD5),
            RipeMD => Ok(ASN_RMD160),
            SHA1 => Ok(ASN_SHA1),
            SHA256 => Ok(ASN_SHA256),
            SHA384 => Ok(ASN_SHA384),
            SHA512 => Ok(ASN_SHA512),
            Tiger | Haval =>
                Err(Error::NotImplemented(
                    format!("no DigestInfo prefix for {}", self.name()))
                    .into()),
        }
    }

    /// Whether a digest context can be created for this algorithm.
    pub fn is_supported(self) -> bool {
        use self::HashAlgorithm::*;
        match self {
            MD5 | RipeMD | SHA1 | SHA256 | SHA384 | SHA512 => true,
            MD2 | MD4 | Tiger | Haval => false,
        }
    }

    /// Creates a new hash context for this algorithm.
    ///
    /// # Errors
    ///
    /// Fails with `Error::UnsupportedHashAlgorithm` if no
    /// implementation is available.  See
    /// [`HashAlgorithm::is_supported`].
    pub fn context(self) -> Result<Context> {
        use self::HashAlgorithm::*;

        let ctx: Box<dyn DynDigest> = match self {
            SHA1 => Box::new(Sha1CDResettable::default()),
            SHA256 => Box::new(sha2::Sha256::default()),
            SHA384 => Box::new(sha2::Sha384::default()),
            SHA512 => Box::new(sha2::Sha512::default()),
            MD5 => Box::new(md5::Md5::default()),
            RipeMD => Box::new(ripemd::Ripemd160::default()),
            MD2 | MD4 | Tiger | Haval =>
                return Err(Error::UnsupportedHashAlgorithm(
                    self.name().into()).into()),
        };

        Ok(Context { algo: self, ctx })
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of a hash function.
pub struct Context {
    algo: HashAlgorithm,
    ctx: Box<dyn DynDigest>,
}

impl Context {
    /// Returns the algorithm.
    pub fn algo(&self) -> HashAlgorithm {
        self.algo
    }

    /// Size of the digest in bytes.
    pub fn digest_size(&self) -> usize {
        self.ctx.output_size()
    }

    /// Writes data into the hash function.
    pub fn update<D: AsRef<[u8]>>(&mut self, data: D) {
        self.ctx.update(data.as_ref());
    }

    /// Finalizes the hash function and writes the digest into the
    /// provided slice.
    ///
    /// Resets the hash function context.
    ///
    /// `digest` must be at least `self.digest_size()` bytes large,
    /// otherwise the digest will be truncated.
    pub fn digest<D: AsMut<[u8]>>(&mut self, mut digest: D) {
        let d = self.ctx.finalize_reset();
        let digest = digest.as_mut();
        let n = std::cmp::min(digest.len(), d.len());
        digest[..n].copy_from_slice(&d[..n]);
    }
}

impl Clone for Context {
    fn clone(&self) -> Self {
        Context {
            algo: self.algo,
            ctx: self.ctx.box_clone(),
        }
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hexdigest(algo: HashAlgorithm, data: &[u8]) -> String {
        let mut ctx = algo.context().unwrap();
        ctx.update(data);
        let mut digest = vec![0; ctx.digest_size()];
        ctx.digest(&mut digest);
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn known_digests() {
        assert_eq!(hexdigest(HashAlgorithm::SHA1, b"abc"),
                   "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(hexdigest(HashAlgorithm::SHA256, b"abc"),
                   "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(hexdigest(HashAlgorithm::MD5, b"abc"),
                   "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn asn_matches_digest_size() {
        use self::HashAlgorithm::*;
        for algo in [MD2, MD4, MD5, RipeMD, SHA1, SHA256, SHA384, SHA512] {
            let asn = algo.asn().unwrap();
            // The last octet of the prefix is the length of the
            // OCTET STRING holding the digest.
            assert_eq!(asn[asn.len() - 1] as usize, algo.digest_size());
        }
        assert!(Tiger.asn().is_err());
        assert!(Haval.asn().is_err());
    }

    #[test]
    fn sha1_asn_length() {
        assert_eq!(HashAlgorithm::SHA1.asn().unwrap().len(), 15);
    }

    #[test]
    fn names() {
        for name in [&b"sha1"[..], b"md5", b"rmd160", b"sha256", b"sha384",
                     b"sha512", b"md2", b"md4", b"tiger", b"haval"] {
            let algo = HashAlgorithm::from_name(name).unwrap();
            assert_eq!(algo.name().as_bytes(), name);
        }
        assert!(HashAlgorithm::from_name(b"wibble").is_none());
    }
}
