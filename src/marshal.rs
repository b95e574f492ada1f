//! Conversion between S-expressions and MPI arrays.
//!
//! The marshallers normalize the three shapes a value can take (key,
//! signature, encrypted value) into arrays of MPIs ordered by the
//! descriptor tables, and the builders assemble result expressions
//! from such arrays.

use crate::crypto::mpi::{MPI, ProtectedMPI};
use crate::sexp::Sexp;
use crate::tables::{self, AlgoInfo, EncInfo, SigInfo};
use crate::types::Flags;
use crate::Error;
use crate::Result;

/// Locates the algorithm list of a key and resolves its descriptor.
fn key_algo_list<'a>(sexp: &'a Sexp, want_private: bool)
    -> Result<(&'a Sexp, &'static AlgoInfo)>
{
    let token: &[u8] = if want_private {
        b"private-key"
    } else {
        b"public-key"
    };
    let list = sexp.find_token(token)
        .ok_or_else(|| Error::MalformedExpression(
            format!("no {} object",
                    String::from_utf8_lossy(token))))?;
    let list = list.nth(1)
        .ok_or_else(|| Error::MalformedExpression(
            "key without algorithm list".into()))?;
    let name = list.nth(0).and_then(Sexp::atom)
        .ok_or_else(|| Error::MalformedExpression(
            "invalid structure of key object".into()))?;
    let info = tables::algo_info_by_name(name)
        .ok_or_else(|| Error::UnsupportedPublicKeyAlgorithm(
            String::from_utf8_lossy(name).into_owned()))?;
    Ok((list, info))
}

/// Extracts one MPI per parameter letter, in order.
///
/// All extracted values are dropped again if any letter is missing
/// or malformed.
fn extract_mpis<T: From<MPI>>(list: &Sexp, names: &str) -> Result<Vec<T>> {
    let mut mpis = Vec::with_capacity(names.len());
    for c in names.chars() {
        let param = list.find_token(&[c as u8])
            .ok_or_else(|| Error::MissingElement(
                format!("parameter {}", c)))?;
        let value = param.nth(1).and_then(Sexp::atom)
            .ok_or_else(|| Error::MalformedExpression(
                format!("parameter {} is not an unsigned integer", c)))?;
        mpis.push(MPI::new(value).into());
    }
    Ok(mpis)
}

/// Converts a public key S-expression into an MPI array in
/// descriptor order.
pub(crate) fn sexp_to_pkey(sexp: &Sexp)
    -> Result<(Vec<MPI>, &'static AlgoInfo)>
{
    let (list, info) = key_algo_list(sexp, false)?;
    let names = format!("{}{}", info.common, info.public);
    let mpis = extract_mpis(list, &names)?;
    Ok((mpis, info))
}

/// Converts a private key S-expression into an MPI array in
/// descriptor order.
///
/// The array is held in protected memory.
pub(crate) fn sexp_to_skey(sexp: &Sexp)
    -> Result<(Vec<ProtectedMPI>, &'static AlgoInfo)>
{
    let (list, info) = key_algo_list(sexp, true)?;
    let names = format!("{}{}", info.common, info.secret);
    let mpis = extract_mpis(list, &names)?;
    Ok((mpis, info))
}

/// Converts a `sig-val` S-expression into an MPI array in descriptor
/// order.
pub(crate) fn sexp_to_sig(sexp: &Sexp)
    -> Result<(Vec<MPI>, &'static SigInfo)>
{
    let list = sexp.find_token(b"sig-val")
        .ok_or_else(|| Error::MalformedExpression(
            "no sig-val object".into()))?;
    let list = list.nth(1)
        .ok_or_else(|| Error::MissingElement(
            "sig-val without body".into()))?;
    let name = list.nth(0).and_then(Sexp::atom)
        .ok_or_else(|| Error::MalformedExpression(
            "invalid structure of sig-val".into()))?;
    let info = tables::sig_info_by_name(name)
        .ok_or_else(|| Error::UnsupportedPublicKeyAlgorithm(
            String::from_utf8_lossy(name).into_owned()))?;
    let mpis = extract_mpis(list, info.elements)?;
    Ok((mpis, info))
}

/// A parsed `enc-val` expression.
#[derive(Debug)]
pub(crate) struct EncVal {
    pub mpis: Vec<MPI>,
    pub info: &'static EncInfo,
    /// Whether a flags list was present, however empty.
    pub modern: bool,
    /// Whether the `pkcs1` flag was given.
    #[allow(dead_code)]
    pub want_pkcs1: bool,
    pub flags: Flags,
}

/// Converts an `enc-val` S-expression into an MPI array in
/// descriptor order, together with the parsed flags.
pub(crate) fn sexp_to_enc(sexp: &Sexp) -> Result<EncVal> {
    let list = sexp.find_token(b"enc-val")
        .ok_or_else(|| Error::MalformedExpression(
            "no enc-val object".into()))?;
    let mut body = list.nth(1)
        .ok_or_else(|| Error::MissingElement(
            "enc-val without body".into()))?;

    let mut modern = false;
    let mut want_pkcs1 = false;
    let mut flags = Flags::default();
    if body.nth(0).and_then(Sexp::atom) == Some(&b"flags"[..]) {
        modern = true;
        for i in 1..body.len() {
            match body.nth(i).and_then(Sexp::atom) {
                None => (), // Not a data element, ignore.
                Some(b"raw") => flags.raw = true,
                Some(b"pkcs1") => {
                    want_pkcs1 = true;
                    flags.pkcs1 = true;
                },
                Some(b"no-blinding") => flags.no_blinding = true,
                Some(other) =>
                    return Err(Error::InvalidFlag(
                        String::from_utf8_lossy(other).into_owned())
                               .into()),
            }
        }
        body = list.nth(2)
            .ok_or_else(|| Error::MissingElement(
                "enc-val without data".into()))?;
    }

    let name = body.nth(0).and_then(Sexp::atom)
        .ok_or_else(|| Error::MalformedExpression(
            "invalid structure of enc-val".into()))?;
    let info = tables::enc_info_by_name(name)
        .ok_or_else(|| Error::UnsupportedPublicKeyAlgorithm(
            String::from_utf8_lossy(name).into_owned()))?;
    let mpis = extract_mpis(body, info.elements)?;

    Ok(EncVal { mpis, info, modern, want_pkcs1, flags })
}

fn param(letter: char, value: &[u8]) -> Sexp {
    Sexp::list(vec![
        Sexp::string(&[letter as u8][..]),
        Sexp::string(value),
    ])
}

fn algo_list(name: &str, elements: &str, values: &[MPI]) -> Sexp {
    let mut list = Vec::with_capacity(1 + values.len());
    list.push(Sexp::string(name));
    for (c, m) in elements.chars().zip(values) {
        list.push(param(c, m.value()));
    }
    Sexp::list(list)
}

/// Builds `(enc-val (flags ...) (<algo> (<p> <mpi>) ...))`.
pub(crate) fn build_enc_val(name: &str, elements: &str, values: &[MPI],
                            flags: Flags)
    -> Sexp
{
    let mut flag_list = vec![Sexp::string("flags")];
    if flags.no_blinding {
        flag_list.push(Sexp::string("no-blinding"));
    }
    Sexp::list(vec![
        Sexp::string("enc-val"),
        Sexp::list(flag_list),
        algo_list(name, elements, values),
    ])
}

/// Builds `(sig-val (<algo> (<p> <mpi>) ...))`.
pub(crate) fn build_sig_val(name: &str, elements: &str, values: &[MPI])
    -> Sexp
{
    Sexp::list(vec![
        Sexp::string("sig-val"),
        algo_list(name, elements, values),
    ])
}

/// Builds the result of a key generation.
///
/// The public components are the leading entries of `skey`: the
/// descriptor orders the common parameters first, and no algorithm
/// has public-only parameters.
pub(crate) fn build_key_data(info: &AlgoInfo, skey: &[ProtectedMPI],
                             factors: &[MPI])
    -> Sexp
{
    let pub_elems = format!("{}{}", info.common, info.public);
    let sec_elems = format!("{}{}", info.common, info.secret);
    let all: Vec<MPI> = skey.iter()
        .map(|m| MPI::new(m.value()))
        .collect();

    let mut misc = vec![Sexp::string("pm1-factors")];
    misc.extend(factors.iter().map(|f| Sexp::string(f.value())));

    Sexp::list(vec![
        Sexp::string("key-data"),
        Sexp::list(vec![
            Sexp::string("public-key"),
            algo_list(info.name, &pub_elems, &all[..info.npkey()]),
        ]),
        Sexp::list(vec![
            Sexp::string("private-key"),
            algo_list(info.name, &sec_elems, &all),
        ]),
        Sexp::list(vec![
            Sexp::string("misc-key-info"),
            Sexp::list(misc),
        ]),
    ])
}
