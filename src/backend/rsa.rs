//! The RSA backend.
//!
//! Secret keys carry `(n, e, d, p, q, u)` with `p < q` and
//! `u = p^-1 mod q`.  Ciphertexts and signatures are single MPIs.

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

/// The RSA engine.
pub(crate) struct Rsa;

struct SecretKey {
    n: BigUint,
    e: BigUint,
    d: BigUint,
    p: BigUint,
    q: BigUint,
    u: BigUint,
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.d.zeroize();
        self.p.zeroize();
        self.q.zeroize();
        self.u.zeroize();
    }
}

impl SecretKey {
    fn from_mpis(skey: &[ProtectedMPI]) -> Result<Self> {
        if skey.len() != 6 {
            return Err(Error::InvalidArgument(
                "RSA secret key wants 6 parameters".into()).into());
        }
        let key = SecretKey {
            n: skey[0].to_biguint(),
            e: skey[1].to_biguint(),
            d: skey[2].to_biguint(),
            p: skey[3].to_biguint(),
            q: skey[4].to_biguint(),
            u: skey[5].to_biguint(),
        };
        let one = BigUint::one();
        if key.n.is_zero() || key.p <= one || key.q <= one {
            return Err(Error::InvalidKey(
                "degenerate modulus or factor".into()).into());
        }
        Ok(key)
    }

    /// Computes `c^d mod n` using the CRT.
    fn private_op(&self, c: &BigUint) -> BigUint {
        let one = BigUint::one();
        let m1 = c.modpow(&(&self.d % (&self.p - &one)), &self.p);
        let m2 = c.modpow(&(&self.d % (&self.q - &one)), &self.q);
        // Garner recombination: h = u * (m2 - m1) mod q.
        let h = ((&m2 + &self.q - &m1) * &self.u) % &self.q;
        m1 + h * &self.p
    }

    /// Like `private_op`, but blinded with a random factor.
    fn private_op_blinded(&self, c: &BigUint) -> Result<BigUint> {
        let mut rng = OsRng;
        let (r, r_inverse) = loop {
            let r = rng.gen_biguint_below(&self.n);
            if r.is_zero() {
                continue;
            }
            if let Some(ri) = (&r).mod_inverse(&self.n)
                .and_then(|i| i.to_biguint())
            {
                break (r, ri);
            }
        };

        let blinded = (c * r.modpow(&self.e, &self.n)) % &self.n;
        let m = self.private_op(&blinded);
        Ok((m * r_inverse) % &self.n)
    }
}

fn public_key(pkey: &[MPI]) -> Result<(BigUint, BigUint)> {
    if pkey.len() != 2 {
        return Err(Error::InvalidArgument(
            "RSA public key wants 2 parameters".into()).into());
    }
    let n = pkey[0].to_biguint();
    if n.is_zero() {
        return Err(Error::InvalidKey("zero modulus".into()).into());
    }
    Ok((n, pkey[1].to_biguint()))
}

impl Engine for Rsa {
    fn generate(&self, _algo: AlgoId, nbits: usize, use_e: u64)
        -> Result<(Vec<ProtectedMPI>, Vec<MPI>)>
    {
        if nbits < 16 {
            return Err(Error::InvalidArgument(
                format!("{} bit RSA keys are not a thing", nbits)).into());
        }

        // Any requested exponent is forced odd; tiny ones are
        // replaced by the usual F4.
        let e = BigUint::from(if use_e < 3 { 65537 } else { use_e })
            | BigUint::one();

        let mut rng = OsRng;
        loop {
            let mut p = rng.gen_prime(nbits / 2);
            let mut q = rng.gen_prime(nbits - nbits / 2);
            if p == q {
                continue;
            }
            if p > q {
                std::mem::swap(&mut p, &mut q);
            }

            let n = &p * &q;
            if n.bits() != nbits {
                continue;
            }

            let one = BigUint::one();
            let mut phi = (&p - &one) * (&q - &one);
            let d = match (&e).mod_inverse(&phi)
                .and_then(|i| i.to_biguint())
            {
                Some(d) => d,
                None => continue, // e not coprime to phi, try again.
            };
            let u = match (&p).mod_inverse(&q)
                .and_then(|i| i.to_biguint())
            {
                Some(u) => u,
                None => continue,
            };

            let skey = vec![
                ProtectedMPI::from_biguint(&n),
                ProtectedMPI::from_biguint(&e),
                ProtectedMPI::from_biguint(&d),
                ProtectedMPI::from_biguint(&p),
                ProtectedMPI::from_biguint(&q),
                ProtectedMPI::from_biguint(&u),
            ];
            phi.zeroize();
            let mut d = d;
            let mut p = p;
            let mut q = q;
            let mut u = u;
            d.zeroize();
            p.zeroize();
            q.zeroize();
            u.zeroize();

            return Ok((skey, Vec::new()));
        }
    }

    fn check_secret_key(&self, _algo: AlgoId, skey: &[ProtectedMPI])
        -> Result<()>
    {
        let key = SecretKey::from_mpis(skey)?;

        if key.n != &key.p * &key.q {
            return Err(Error::InvalidKey("n is not pq".into()).into());
        }
        if !probably_prime(&key.p, 20) || !probably_prime(&key.q, 20) {
            return Err(Error::InvalidKey(
                "p or q is not prime".into()).into());
        }
        if (&key.p * &key.u) % &key.q != BigUint::one() {
            return Err(Error::InvalidKey(
                "u is not the inverse of p mod q".into()).into());
        }

        // Exercise the exponent pair on a fixed probe.
        let probe = BigUint::from(0xcafe_f00du32) % &key.n;
        if key.private_op(&probe.modpow(&key.e, &key.n)) != probe {
            return Err(Error::InvalidKey(
                "d does not invert e".into()).into());
        }
        Ok(())
    }

    fn encrypt(&self, _algo: AlgoId, data: &MPI, pkey: &[MPI],
               _flags: Flags)
        -> Result<Vec<MPI>>
    {
        let (n, e) = public_key(pkey)?;
        let m = data.to_biguint();
        let c = m.modpow(&e, &n);
        Ok(vec![MPI::from_biguint(&c)])
    }

    fn decrypt(&self, _algo: AlgoId, data: &[MPI], skey: &[ProtectedMPI],
               flags: Flags)
        -> Result<MPI>
    {
        if data.len() != 1 {
            return Err(Error::InvalidArgument(
                "RSA ciphertext wants 1 parameter".into()).into());
        }
        let key = SecretKey::from_mpis(skey)?;
        let c = data[0].to_biguint();
        if c >= key.n {
            return Err(Error::InvalidArgument(
                "ciphertext out of range".into()).into());
        }

        let m = if flags.no_blinding {
            key.private_op(&c)
        } else {
            key.private_op_blinded(&c)?
        };
        Ok(MPI::from_biguint(&m))
    }

    fn sign(&self, _algo: AlgoId, hash: &MPI, skey: &[ProtectedMPI])
        -> Result<Vec<MPI>>
    {
        let key = SecretKey::from_mpis(skey)?;
        let m = hash.to_biguint();
        if m >= key.n {
            return Err(Error::InvalidArgument(
                "data too large for the modulus".into()).into());
        }
        let s = key.private_op(&m);
        Ok(vec![MPI::from_biguint(&s)])
    }

    fn verify(&self, _algo: AlgoId, hash: &MPI, sig: &[MPI], pkey: &[MPI],
              cmp: Option<Comparator>)
        -> Result<()>
    {
        if sig.len() != 1 {
            return Err(Error::InvalidArgument(
                "RSA signature wants 1 parameter".into()).into());
        }
        let (n, e) = public_key(pkey)?;
        let recovered =
            MPI::from_biguint(&sig[0].to_biguint().modpow(&e, &n));

        let good = match cmp {
            Some(cmp) => cmp(&recovered),
            None => &recovered == hash,
        };
        if good {
            Ok(())
        } else {
            Err(Error::BadSignature("RSA verification failed".into())
                .into())
        }
    }

    fn nbits(&self, _algo: AlgoId, pkey: &[MPI]) -> usize {
        pkey.first().map(|n| n.bits()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PK_RSA;

    fn generate(nbits: usize) -> Vec<ProtectedMPI> {
        Rsa.generate(PK_RSA, nbits, 65537).unwrap().0
    }

    fn public_of(skey: &[ProtectedMPI]) -> Vec<MPI> {
        skey[..2].iter().map(|m| MPI::new(m.value())).collect()
    }

    #[test]
    fn round_trip() {
        let skey = generate(512);
        let pkey = public_of(&skey);
        assert_eq!(Rsa.nbits(PK_RSA, &pkey), 512);
        Rsa.check_secret_key(PK_RSA, &skey).unwrap();

        let m = MPI::new(b"\x12\x34\x56\x78\x9a");
        let c = Rsa.encrypt(PK_RSA, &m, &pkey, Flags::default()).unwrap();
        assert_eq!(c.len(), 1);

        let back = Rsa.decrypt(PK_RSA, &c, &skey, Flags::default())
            .unwrap();
        assert_eq!(back, m);

        // Also without blinding.
        let back = Rsa.decrypt(PK_RSA, &c, &skey, Flags {
            no_blinding: true, ..Default::default()
        }).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn sign_and_verify() {
        let skey = generate(512);
        let pkey = public_of(&skey);

        let digest = MPI::new(&[0xab; 20]);
        let sig = Rsa.sign(PK_RSA, &digest, &skey).unwrap();
        Rsa.verify(PK_RSA, &digest, &sig, &pkey, None).unwrap();

        let other = MPI::new(&[0xac; 20]);
        assert!(Rsa.verify(PK_RSA, &other, &sig, &pkey, None).is_err());

        // An external comparator substitutes the hash comparison.
        Rsa.verify(PK_RSA, &other, &sig, &pkey,
                   Some(&|m: &MPI| m == &digest)).unwrap();
    }

    #[test]
    fn broken_key_is_rejected() {
        let skey = generate(512);
        let mut broken: Vec<ProtectedMPI> = skey.to_vec();
        broken[0] = MPI::new(&[0x03]).into(); // Bogus modulus.
        assert!(Rsa.check_secret_key(PK_RSA, &broken).is_err());
    }

    #[test]
    fn requested_exponent() {
        let skey = Rsa.generate(PK_RSA, 512, 3).unwrap().0;
        assert_eq!(skey[1].value(), &[0x03]);
    }
}
