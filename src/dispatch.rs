//! The public operations.
//!
//! Every operation parses its S-expression inputs, resolves the
//! backend through the registry, performs the primitive, and builds
//! the result expression.  The registry lock is only held while
//! acquiring the backend handle; the cryptographic work runs outside
//! of it.

use crate::crypto::mpi::MPI;
use crate::marshal;
use crate::padding;
use crate::registry::{global, Registry};
use crate::sexp::Sexp;
use crate::tables;
use crate::types::PK_RSA;
use crate::Error;
use crate::Result;

impl Registry {
    /// Encrypts `data` with the public key `pkey`.
    ///
    /// Returns an `enc-val` expression suitable for [`Registry::decrypt`].
    pub fn encrypt(&self, data: &Sexp, pkey: &Sexp) -> Result<Sexp> {
        let (pkey_mpis, info) = marshal::sexp_to_pkey(pkey)?;
        log::trace!("encrypt: algo={}", info.algo);

        // Resolve the ciphertext shape by alias name so that the
        // result carries the same name the key was given under.
        let enc_info = tables::enc_info_by_name(info.name.as_bytes())
            .ok_or_else(|| Error::UnsupportedPublicKeyAlgorithm(
                format!("{} cannot encrypt", info.name)))?;

        let backend = self.active(info.algo)?;
        let nbits = backend.engine().nbits(info.algo, &pkey_mpis);
        let (mut frame, flags) =
            padding::sexp_data_to_mpi(data, nbits, true)?;

        let result = backend.engine()
            .encrypt(info.algo, &frame, &pkey_mpis, flags);
        // The frame may hold the caller's plaintext.
        frame.secure_memzero();
        let ciphertext = result?;

        Ok(marshal::build_enc_val(enc_info.name, enc_info.elements,
                                  &ciphertext, flags))
    }

    /// Decrypts an `enc-val` expression with the secret key `skey`.
    ///
    /// Returns `(value <plaintext>)` if the input carried a flags
    /// list, or the bare plaintext for legacy inputs.  Backend
    /// failures are reported uniformly to avoid leaking padding
    /// information.
    pub fn decrypt(&self, data: &Sexp, skey: &Sexp) -> Result<Sexp> {
        let (skey_mpis, info) = marshal::sexp_to_skey(skey)?;
        let enc = marshal::sexp_to_enc(data)?;
        log::trace!("decrypt: algo={}", info.algo);

        if info.algo != enc.info.algo {
            return Err(Error::Conflict(
                "key algorithm does not match data algorithm".into())
                .into());
        }

        let backend = self.active(info.algo)?;
        let mut plain = match backend.engine()
            .decrypt(info.algo, &enc.mpis, &skey_mpis, enc.flags)
        {
            Ok(plain) => plain,
            Err(e) => {
                log::debug!("decryption failed: {}", e);
                return Err(Error::OperationFailed(
                    "decryption failed".into()).into());
            },
        };

        let value = Sexp::string(plain.value());
        plain.secure_memzero();
        Ok(if enc.modern {
            Sexp::list(vec![Sexp::string("value"), value])
        } else {
            value
        })
    }

    /// Signs `hash` with the secret key `skey`.
    ///
    /// Returns a `sig-val` expression suitable for [`Registry::verify`].
    pub fn sign(&self, hash: &Sexp, skey: &Sexp) -> Result<Sexp> {
        let (skey_mpis, info) = marshal::sexp_to_skey(skey)?;
        log::trace!("sign: algo={}", info.algo);

        let sig_info = tables::sig_info_by_name(info.name.as_bytes())
            .ok_or_else(|| Error::UnsupportedPublicKeyAlgorithm(
                format!("{} cannot sign", info.name)))?;

        let backend = self.active(info.algo)?;
        // The key size comes from the common parameters, which lead
        // the secret array and are public.
        let pkey_prefix: Vec<MPI> = skey_mpis[..info.npkey()].iter()
            .map(|m| MPI::new(m.value()))
            .collect();
        let nbits = backend.engine().nbits(info.algo, &pkey_prefix);

        let (frame, _) = padding::sexp_data_to_mpi(hash, nbits, false)?;
        let signature = backend.engine()
            .sign(info.algo, &frame, &skey_mpis)?;

        Ok(marshal::build_sig_val(sig_info.name, sig_info.elements,
                                  &signature))
    }

    /// Verifies a `sig-val` over `hash` with the public key `pkey`.
    pub fn verify(&self, sig: &Sexp, hash: &Sexp, pkey: &Sexp)
        -> Result<()>
    {
        let (pkey_mpis, info) = marshal::sexp_to_pkey(pkey)?;
        let (sig_mpis, sig_info) = marshal::sexp_to_sig(sig)?;
        log::trace!("verify: algo={}", info.algo);

        if info.algo != sig_info.algo {
            return Err(Error::Conflict(
                "key algorithm does not match signature algorithm".into())
                .into());
        }

        let backend = self.active(info.algo)?;
        let nbits = backend.engine().nbits(info.algo, &pkey_mpis);
        let (frame, _) = padding::sexp_data_to_mpi(hash, nbits, false)?;

        backend.engine()
            .verify(info.algo, &frame, &sig_mpis, &pkey_mpis, None)
    }

    /// Checks a secret key for internal consistency.
    pub fn test_key(&self, key: &Sexp) -> Result<()> {
        let (skey_mpis, info) = marshal::sexp_to_skey(key)?;
        let backend = self.active(info.algo)?;
        backend.engine().check_secret_key(info.algo, &skey_mpis)
    }

    /// Generates a key pair.
    ///
    /// The parameters look like `(genkey (<algo> (nbits "N")
    /// [(rsa-use-e "E")]))`; the public exponent defaults to 65537.
    /// Returns a `key-data` expression carrying the public and the
    /// private key plus the known factors of p-1.
    pub fn generate_key(&self, params: &Sexp) -> Result<Sexp> {
        let list = params.find_token(b"genkey")
            .ok_or_else(|| Error::MalformedExpression(
                "no genkey object".into()))?;
        let list = list.nth(1)
            .ok_or_else(|| Error::MissingElement(
                "genkey without body".into()))?;
        let name = list.nth(0).and_then(Sexp::atom)
            .ok_or_else(|| Error::MalformedExpression(
                "algorithm name missing".into()))?;
        let info = tables::algo_info_by_name(name)
            .ok_or_else(|| Error::UnsupportedPublicKeyAlgorithm(
                String::from_utf8_lossy(name).into_owned()))?;

        let use_e = match list.find_token(b"rsa-use-e") {
            Some(l) => {
                let value = l.nth(1).and_then(Sexp::atom)
                    .ok_or_else(|| Error::MalformedExpression(
                        "rsa-use-e without value".into()))?;
                parse_number(value)?
            },
            // Not given, use the value generated by old versions.
            None => 65537,
        };

        let nbits_list = list.find_token(b"nbits")
            .ok_or_else(|| Error::MissingElement(
                "no nbits parameter".into()))?;
        let nbits = nbits_list.nth(1).and_then(Sexp::atom)
            .ok_or_else(|| Error::MalformedExpression(
                "nbits without value".into()))?;
        let nbits = parse_number(nbits)? as usize;

        log::trace!("generate_key: algo={}, nbits={}", info.algo, nbits);
        let backend = self.active(info.algo)?;
        let (skey, factors) = backend.engine()
            .generate(info.algo, nbits, use_e)?;

        Ok(marshal::build_key_data(info, &skey, &factors))
    }

    /// Returns the size of the key in bits.
    ///
    /// Accepts public and private keys.  For RSA keys without a
    /// registered backend, falls back to the bit length of the
    /// modulus.
    pub fn key_nbits(&self, key: &Sexp) -> Result<usize> {
        let (pkey_mpis, info) = match marshal::sexp_to_pkey(key) {
            Ok(parsed) => parsed,
            Err(e) if matches!(e.downcast_ref::<Error>(),
                               Some(Error::MalformedExpression(_))) =>
            {
                let (skey_mpis, info) = marshal::sexp_to_skey(key)?;
                let pkey = skey_mpis[..info.npkey()].iter()
                    .map(|m| MPI::new(m.value()))
                    .collect();
                (pkey, info)
            },
            Err(e) => return Err(e),
        };

        match self.active(info.algo) {
            Ok(backend) =>
                Ok(backend.engine().nbits(info.algo, &pkey_mpis)),
            Err(_) if info.algo == PK_RSA
                && self.lookup(info.algo).is_none() =>
            {
                // We always want to see the length of an RSA key.
                Ok(pkey_mpis[0].bits())
            },
            Err(e) => Err(e),
        }
    }
}

/// Parses a numeral the way `strtoul` with base 0 does: `0x` prefix
/// for hexadecimal, leading `0` for octal, decimal otherwise.
fn parse_number(value: &[u8]) -> Result<u64> {
    let s = std::str::from_utf8(value)
        .map_err(|_| Error::MalformedExpression(
            "number is not text".into()))?
        .trim();
    let parsed = if let Some(hex) =
        s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u64::from_str_radix(&s[1..], 8)
    } else {
        s.parse()
    };
    parsed.map_err(|_| Error::MalformedExpression(
        format!("bad number {:?}", s)).into())
}

/// Encrypts `data` with the public key `pkey` using the process-wide
/// registry.
pub fn encrypt(data: &Sexp, pkey: &Sexp) -> Result<Sexp> {
    global().encrypt(data, pkey)
}

/// Decrypts an `enc-val` with the secret key `skey` using the
/// process-wide registry.
pub fn decrypt(data: &Sexp, skey: &Sexp) -> Result<Sexp> {
    global().decrypt(data, skey)
}

/// Signs `hash` with the secret key `skey` using the process-wide
/// registry.
pub fn sign(hash: &Sexp, skey: &Sexp) -> Result<Sexp> {
    global().sign(hash, skey)
}

/// Verifies a `sig-val` over `hash` with the public key `pkey` using
/// the process-wide registry.
pub fn verify(sig: &Sexp, hash: &Sexp, pkey: &Sexp) -> Result<()> {
    global().verify(sig, hash, pkey)
}

/// Checks a secret key using the process-wide registry.
pub fn test_key(key: &Sexp) -> Result<()> {
    global().test_key(key)
}

/// Generates a key pair using the process-wide registry.
pub fn generate_key(params: &Sexp) -> Result<Sexp> {
    global().generate_key(params)
}

/// Returns the size of a key in bits using the process-wide
/// registry.
pub fn key_nbits(key: &Sexp) -> Result<usize> {
    global().key_nbits(key)
}
