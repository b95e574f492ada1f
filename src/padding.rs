//! Framing of data into MPIs.
//!
//! Data handed to the sign and encrypt operations is either a bare
//! integer (the legacy form) or a `(data ...)` expression selecting
//! a framing: `raw` uses the value as-is, `pkcs1` builds an
//! EMSA-PKCS1-v1_5 frame (block type 1) when signing and an
//! EME-PKCS1-v1_5 frame (block type 2) when encrypting.

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::mem::Protected;
use crate::crypto::mpi::MPI;
use crate::crypto::random;
use crate::sexp::Sexp;
use crate::types::Flags;
use crate::Error;
use crate::Result;

/// Converts a data S-expression into a single framed MPI.
///
/// `nbits` is the size of the key's modulus; PKCS#1 frames are
/// `ceil(nbits / 8)` bytes long.
pub(crate) fn sexp_data_to_mpi(input: &Sexp, nbits: usize,
                               for_encryption: bool)
    -> Result<(MPI, Flags)>
{
    let ldata = match input.find_token(b"data") {
        Some(l) => l,
        None => {
            // Assume old style: the expression holds just one
            // integer.
            let value = input.atom()
                .or_else(|| input.nth(0).and_then(Sexp::atom))
                .ok_or_else(|| Error::MalformedExpression(
                    "expected an integer".into()))?;
            return Ok((MPI::new(value), Flags::default()));
        },
    };

    let mut flags = Flags::default();
    let mut unknown_flag = None;
    if let Some(lflags) = ldata.find_token(b"flags") {
        for i in 1..lflags.len() {
            match lflags.nth(i).and_then(Sexp::atom) {
                None => (), // Not a data element.
                Some(b"raw") => flags.raw = true,
                Some(b"pkcs1") => flags.pkcs1 = true,
                Some(b"no-blinding") => flags.no_blinding = true,
                Some(other) =>
                    unknown_flag = Some(
                        String::from_utf8_lossy(other).into_owned()),
            }
        }
    }

    if !flags.pkcs1 && !flags.raw {
        flags.raw = true; // Default to raw.
    }

    let lhash = ldata.find_token(b"hash");
    let lvalue = if lhash.is_some() {
        None
    } else {
        ldata.find_token(b"value")
    };

    if lhash.is_none() && lvalue.is_none() {
        Err(Error::MalformedExpression(
            "data carries neither hash nor value".into()).into())
    } else if let Some(flag) = unknown_flag {
        Err(Error::InvalidFlag(flag).into())
    } else if flags.raw && flags.pkcs1 && !for_encryption {
        Err(Error::Conflict("raw and pkcs1 are exclusive".into()).into())
    } else if flags.raw && lvalue.is_some() {
        let value = lvalue.unwrap().nth(1).and_then(Sexp::atom)
            .ok_or_else(|| Error::MalformedExpression(
                "value is not an integer".into()))?;
        Ok((MPI::new(value), flags))
    } else if flags.pkcs1 && lvalue.is_some() && for_encryption {
        let frame = block_type_2(lvalue.unwrap(), nbits)?;
        Ok((MPI::new(&frame), flags))
    } else if flags.pkcs1 && lhash.is_some() && !for_encryption {
        let frame = block_type_1(lhash.unwrap(), nbits)?;
        Ok((MPI::new(&frame), flags))
    } else {
        Err(Error::Conflict(
            "no framing for this combination of flags and data".into())
            .into())
    }
}

/// Builds a PKCS#1 block type 2 frame: `00 02 PS 00 M` with
/// non-zero random filler PS.
fn block_type_2(lvalue: &Sexp, nbits: usize) -> Result<Protected> {
    let value = lvalue.nth(1).and_then(Sexp::atom)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MalformedExpression(
            "value is not an integer".into()))?;

    let nframe = (nbits + 7) / 8;
    if value.len() + 7 > nframe || nframe == 0 {
        // Can't encode such a long value in this frame.
        return Err(Error::TooShort(
            format!("cannot frame {} bytes into {} ({} bits)",
                    value.len(), nframe, nbits)).into());
    }

    let mut frame = Protected::new(nframe);
    frame[0] = 0;
    frame[1] = 2; // Block type.

    let pslen = nframe - 3 - value.len();
    let ps = &mut frame[2..2 + pslen];
    random::strong_random(ps)?;

    // The filler must not contain zero octets.  Replace any zeros
    // by fresh random bytes, overdrawing a little, until none
    // remain.
    loop {
        let zeros = ps.iter().filter(|&&b| b == 0).count();
        if zeros == 0 {
            break;
        }

        let mut fresh = Protected::new(zeros + zeros / 128);
        random::strong_random(&mut fresh)?;
        let mut fresh = fresh.iter();
        for b in ps.iter_mut() {
            if *b == 0 {
                if let Some(&r) = fresh.next() {
                    *b = r;
                }
            }
        }
    }

    frame[2 + pslen] = 0;
    frame[3 + pslen..].copy_from_slice(value);
    Ok(frame)
}

/// Builds a PKCS#1 block type 1 frame: `00 01 FF..FF 00 ASN DIGEST`.
fn block_type_1(lhash: &Sexp, nbits: usize) -> Result<Vec<u8>> {
    if lhash.len() != 3 {
        return Err(Error::MalformedExpression(
            "hash wants exactly an algorithm and a value".into()).into());
    }

    let name = lhash.nth(1).and_then(Sexp::atom)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::MalformedExpression(
            "hash algorithm name missing".into()))?;
    let algo = HashAlgorithm::from_name(name)
        .ok_or_else(|| Error::UnsupportedHashAlgorithm(
            String::from_utf8_lossy(name).into_owned()))?;

    let value = lhash.nth(2).and_then(Sexp::atom)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::MalformedExpression(
            "hash value missing".into()))?;

    let asn = algo.asn()?;
    let dlen = algo.digest_size();

    if value.len() != dlen {
        return Err(Error::Conflict(
            format!("{} digest must be {} bytes, got {}",
                    algo, dlen, value.len())).into());
    }

    let nframe = (nbits + 7) / 8;
    // The filler must be at least two octets.
    if dlen + asn.len() + 3 + 2 > nframe {
        return Err(Error::TooShort(
            format!("cannot frame a {} DigestInfo into {} bits",
                    algo, nbits)).into());
    }

    let mut frame = Vec::with_capacity(nframe);
    frame.push(0);
    frame.push(1); // Block type.
    frame.resize(nframe - dlen - asn.len() - 1, 0xff);
    frame.push(0);
    frame.extend_from_slice(asn);
    frame.extend_from_slice(value);
    debug_assert_eq!(frame.len(), nframe);
    Ok(frame)
}
