//! The ElGamal backend.
//!
//! Secret keys carry `(p, g, y, x)`.  Encryption produces the pair
//! `(a, b) = (g^k, m * y^k)`; signatures are over the group order
//! `p - 1`.  The same engine serves both the sign+encrypt and the
//! encrypt-only algorithm ids.

use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::{BigUint, ModInverse, RandBigInt, RandPrime};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::backend::{Comparator, Engine};
use crate::crypto::mpi::{MPI, ProtectedMPI};
use crate::types::{AlgoId, Flags};
use crate::Error;
use crate::Result;

/// The ElGamal engine.
pub(crate) struct ElGamal;

struct PublicKey {
    p: BigUint,
    g: BigUint,
    y: BigUint,
}

impl PublicKey {
    fn from_mpis(pkey: &[MPI]) -> Result<Self> {
        if pkey.len() != 3 {
            return Err(Error::InvalidArgument(
                "ElGamal public key wants 3 parameters".into()).into());
        }
        let key = PublicKey {
            p: pkey[0].to_biguint(),
            g: pkey[1].to_biguint(),
            y: pkey[2].to_biguint(),
        };
        if key.p < BigUint::from(3u32) {
            return Err(Error::InvalidKey(
                "degenerate modulus".into()).into());
        }
        Ok(key)
    }
}

fn secret_key(skey: &[ProtectedMPI]) -> Result<(PublicKey, BigUint)> {
    if skey.len() != 4 {
        return Err(Error::InvalidArgument(
            "ElGamal secret key wants 4 parameters".into()).into());
    }
    let key = PublicKey {
        p: skey[0].to_biguint(),
        g: skey[1].to_biguint(),
        y: skey[2].to_biguint(),
    };
    if key.p < BigUint::from(3u32) {
        return Err(Error::InvalidKey(
            "degenerate modulus".into()).into());
    }
    let x = skey[3].to_biguint();
    if x >= &key.p - BigUint::one() {
        return Err(Error::InvalidKey("x out of range".into()).into());
    }
    Ok((key, x))
}

impl Engine for ElGamal {
    fn generate(&self, _algo: AlgoId, nbits: usize, _use_e: u64)
        -> Result<(Vec<ProtectedMPI>, Vec<MPI>)>
    {
        if nbits < 64 {
            return Err(Error::InvalidArgument(
                format!("{} bit ElGamal keys are not a thing", nbits))
                .into());
        }

        let one = BigUint::one();
        let two = BigUint::from(2u32);
        let mut rng = OsRng;

        // A safe prime: p = 2q + 1 with q prime.
        let (p, q) = loop {
            let q = rng.gen_prime(nbits - 1);
            let p = &q * &two + &one;
            if p.bits() == nbits && probably_prime(&p, 20) {
                break (p, q);
            }
        };

        // A generator of the full group: neither g^2 nor g^q is 1.
        let g = loop {
            let g = rng.gen_biguint_range(&two, &(&p - &one));
            if g.modpow(&two, &p) != one && g.modpow(&q, &p) != one {
                break g;
            }
        };

        let mut x = rng.gen_biguint_range(&one, &(&p - &two));
        let y = g.modpow(&x, &p);

        let skey = vec![
            ProtectedMPI::from_biguint(&p),
            ProtectedMPI::from_biguint(&g),
            ProtectedMPI::from_biguint(&y),
            ProtectedMPI::from_biguint(&x),
        ];
        x.zeroize();

        let factors = vec![MPI::from_biguint(&q)];
        Ok((skey, factors))
    }

    fn check_secret_key(&self, _algo: AlgoId, skey: &[ProtectedMPI])
        -> Result<()>
    {
        let (key, x) = secret_key(skey)?;
        if x.is_zero() {
            return Err(Error::InvalidKey("x is zero".into()).into());
        }
        if key.g.modpow(&x, &key.p) != key.y {
            return Err(Error::InvalidKey(
                "y does not match x".into()).into());
        }
        Ok(())
    }

    fn encrypt(&self, _algo: AlgoId, data: &MPI, pkey: &[MPI],
               _flags: Flags)
        -> Result<Vec<MPI>>
    {
        let key = PublicKey::from_mpis(pkey)?;
        let m = data.to_biguint();
        if m >= key.p {
            return Err(Error::InvalidArgument(
                "data too large for the modulus".into()).into());
        }

        let one = BigUint::one();
        let mut rng = OsRng;
        let k = rng.gen_biguint_range(&one, &(&key.p - &one));
        let a = key.g.modpow(&k, &key.p);
        let b = (m * key.y.modpow(&k, &key.p)) % &key.p;

        Ok(vec![MPI::from_biguint(&a), MPI::from_biguint(&b)])
    }

    fn decrypt(&self, _algo: AlgoId, data: &[MPI], skey: &[ProtectedMPI],
               _flags: Flags)
        -> Result<MPI>
    {
        if data.len() != 2 {
            return Err(Error::InvalidArgument(
                "ElGamal ciphertext wants 2 parameters".into()).into());
        }
        let (key, x) = secret_key(skey)?;
        let a = data[0].to_biguint();
        let b = data[1].to_biguint();
        if a >= key.p || b >= key.p {
            return Err(Error::InvalidArgument(
                "ciphertext out of range".into()).into());
        }

        // m = b / a^x = b * a^(p-1-x) mod p.
        let one = BigUint::one();
        let exponent = &key.p - &one - &x;
        let m = (b * a.modpow(&exponent, &key.p)) % &key.p;
        Ok(MPI::from_biguint(&m))
    }

    fn sign(&self, _algo: AlgoId, hash: &MPI, skey: &[ProtectedMPI])
        -> Result<Vec<MPI>>
    {
        let (key, x) = secret_key(skey)?;
        let one = BigUint::one();
        let n = &key.p - &one; // Group order.
        let h = hash.to_biguint() % &n;
        let mut rng = OsRng;

        loop {
            let k = rng.gen_biguint_range(&one, &n);
            let k_inverse = match (&k).mod_inverse(&n)
                .and_then(|i| i.to_biguint())
            {
                Some(i) => i,
                None => continue, // k shares a factor with p - 1.
            };
            let r = key.g.modpow(&k, &key.p);
            // s = k^-1 (h - x r) mod (p - 1).
            let t = (&x * &r) % &n;
            let s = (k_inverse * ((&h + &n - &t) % &n)) % &n;
            if s.is_zero() {
                continue;
            }
            return Ok(vec![MPI::from_biguint(&r),
                           MPI::from_biguint(&s)]);
        }
    }

    fn verify(&self, _algo: AlgoId, hash: &MPI, sig: &[MPI], pkey: &[MPI],
              _cmp: Option<Comparator>)
        -> Result<()>
    {
        if sig.len() != 2 {
            return Err(Error::InvalidArgument(
                "ElGamal signature wants 2 parameters".into()).into());
        }
        let key = PublicKey::from_mpis(pkey)?;
        let r = sig[0].to_biguint();
        let s = sig[1].to_biguint();
        let one = BigUint::one();
        let n = &key.p - &one;
        if r.is_zero() || r >= key.p || s.is_zero() || s >= n {
            return Err(Error::BadSignature(
                "r or s out of range".into()).into());
        }

        let h = hash.to_biguint() % &n;
        let lhs = (key.y.modpow(&r, &key.p) * r.modpow(&s, &key.p))
            % &key.p;
        let rhs = key.g.modpow(&h, &key.p);

        if lhs == rhs {
            Ok(())
        } else {
            Err(Error::BadSignature(
                "ElGamal verification failed".into()).into())
        }
    }

    fn nbits(&self, _algo: AlgoId, pkey: &[MPI]) -> usize {
        pkey.first().map(|p| p.bits()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PK_ELG, PK_ELG_E};

    #[test]
    fn round_trip() {
        let (skey, factors) = ElGamal.generate(PK_ELG, 320, 0).unwrap();
        assert_eq!(factors.len(), 1);
        ElGamal.check_secret_key(PK_ELG, &skey).unwrap();

        let pkey: Vec<MPI> = skey[..3].iter()
            .map(|m| MPI::new(m.value()))
            .collect();
        assert_eq!(ElGamal.nbits(PK_ELG, &pkey), 320);

        let m = MPI::new(b"\x01\x02\x03\x04\x05\x06\x07\x08");
        let c = ElGamal.encrypt(PK_ELG, &m, &pkey, Flags::default())
            .unwrap();
        assert_eq!(c.len(), 2);
        let back = ElGamal.decrypt(PK_ELG, &c, &skey, Flags::default())
            .unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn sign_and_verify() {
        // The engine is id-agnostic; exercise it under the
        // encrypt-only id, too.
        let (skey, _) = ElGamal.generate(PK_ELG_E, 320, 0).unwrap();
        let pkey: Vec<MPI> = skey[..3].iter()
            .map(|m| MPI::new(m.value()))
            .collect();

        let digest = MPI::new(&[0x11; 20]);
        let sig = ElGamal.sign(PK_ELG, &digest, &skey).unwrap();
        ElGamal.verify(PK_ELG, &digest, &sig, &pkey, None).unwrap();

        let other = MPI::new(&[0x12; 20]);
        assert!(ElGamal.verify(PK_ELG, &other, &sig, &pkey, None)
                .is_err());
    }
}
