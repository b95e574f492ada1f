//! The DSA backend.
//!
//! Secret keys carry `(p, q, g, y, x)`; signatures are `(r, s)`
//! pairs.  This backend signs only.

use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::{BigUint, ModInverse, RandBigInt, RandPrime};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::backend::{Comparator, Engine};
use crate::crypto::mpi::{MPI, ProtectedMPI};
use crate::types::AlgoId;
use crate::Error;
use crate::Result;

/// The DSA engine.
pub(crate) struct Dsa;

struct PublicKey {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    y: BigUint,
}

impl PublicKey {
    fn from_mpis(pkey: &[MPI]) -> Result<Self> {
        if pkey.len() != 4 {
            return Err(Error::InvalidArgument(
                "DSA public key wants 4 parameters".into()).into());
        }
        let key = PublicKey {
            p: pkey[0].to_biguint(),
            q: pkey[1].to_biguint(),
            g: pkey[2].to_biguint(),
            y: pkey[3].to_biguint(),
        };
        key.check_domain()?;
        Ok(key)
    }

    fn check_domain(&self) -> Result<()> {
        if self.p.is_zero() || self.q < BigUint::from(2u32) {
            return Err(Error::InvalidKey(
                "degenerate domain parameters".into()).into());
        }
        Ok(())
    }
}

fn secret_key(skey: &[ProtectedMPI]) -> Result<(PublicKey, BigUint)> {
    if skey.len() != 5 {
        return Err(Error::InvalidArgument(
            "DSA secret key wants 5 parameters".into()).into());
    }
    let key = PublicKey {
        p: skey[0].to_biguint(),
        q: skey[1].to_biguint(),
        g: skey[2].to_biguint(),
        y: skey[3].to_biguint(),
    };
    key.check_domain()?;
    Ok((key, skey[4].to_biguint()))
}

impl Engine for Dsa {
    fn generate(&self, _algo: AlgoId, nbits: usize, _use_e: u64)
        -> Result<(Vec<ProtectedMPI>, Vec<MPI>)>
    {
        let qbits = if nbits >= 2048 { 256 } else { 160 };
        if nbits < qbits + 64 {
            return Err(Error::InvalidArgument(
                format!("{} bit DSA keys are not a thing", nbits)).into());
        }

        let one = BigUint::one();
        let mut rng = OsRng;

        // Find p = 2qc + 1 with prime q of qbits.
        let (p, q) = 'params: loop {
            let q = rng.gen_prime(qbits);
            let cbits = nbits - qbits - 1;
            for _ in 0..4 * nbits {
                let c = rng.gen_biguint(cbits)
                    | (&one << (cbits - 1));
                let p = &q * &c * 2u32 + &one;
                if p.bits() == nbits && probably_prime(&p, 20) {
                    break 'params (p, q);
                }
            }
            // No luck with this q, draw another one.
        };

        // A generator of the subgroup of order q.
        let exponent = (&p - &one) / &q;
        let g = loop {
            let h = rng.gen_biguint_range(
                &BigUint::from(2u32), &(&p - &one));
            let g = h.modpow(&exponent, &p);
            if g > one {
                break g;
            }
        };

        let mut x = rng.gen_biguint_range(&one, &q);
        let y = g.modpow(&x, &p);

        let skey = vec![
            ProtectedMPI::from_biguint(&p),
            ProtectedMPI::from_biguint(&q),
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
        if x.is_zero() || x >= key.q {
            return Err(Error::InvalidKey(
                "x out of range".into()).into());
        }
        if key.g.modpow(&x, &key.p) != key.y {
            return Err(Error::InvalidKey(
                "y does not match x".into()).into());
        }
        Ok(())
    }

    fn sign(&self, _algo: AlgoId, hash: &MPI, skey: &[ProtectedMPI])
        -> Result<Vec<MPI>>
    {
        let (key, x) = secret_key(skey)?;
        let h = hash.to_biguint() % &key.q;
        let one = BigUint::one();
        let mut rng = OsRng;

        loop {
            let k = rng.gen_biguint_range(&one, &key.q);
            let r = key.g.modpow(&k, &key.p) % &key.q;
            if r.is_zero() {
                continue;
            }
            let k_inverse = match (&k).mod_inverse(&key.q)
                .and_then(|i| i.to_biguint())
            {
                Some(i) => i,
                None => continue,
            };
            let s = (k_inverse * (&h + &x * &r)) % &key.q;
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
                "DSA signature wants 2 parameters".into()).into());
        }
        let key = PublicKey::from_mpis(pkey)?;
        let r = sig[0].to_biguint();
        let s = sig[1].to_biguint();
        if r.is_zero() || r >= key.q || s.is_zero() || s >= key.q {
            return Err(Error::BadSignature(
                "r or s out of range".into()).into());
        }

        let w = match (&s).mod_inverse(&key.q)
            .and_then(|i| i.to_biguint())
        {
            Some(w) => w,
            None => return Err(Error::BadSignature(
                "s is not invertible".into()).into()),
        };
        let h = hash.to_biguint() % &key.q;
        let u1 = (&h * &w) % &key.q;
        let u2 = (&r * &w) % &key.q;
        let v = ((key.g.modpow(&u1, &key.p)
                  * key.y.modpow(&u2, &key.p)) % &key.p) % &key.q;

        if v == r {
            Ok(())
        } else {
            Err(Error::BadSignature("DSA verification failed".into())
                .into())
        }
    }

    fn nbits(&self, _algo: AlgoId, pkey: &[MPI]) -> usize {
        pkey.first().map(|p| p.bits()).unwrap_or(0)
    }
}
