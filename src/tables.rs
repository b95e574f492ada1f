//! Static algorithm descriptor tables.
//!
//! These tables drive the S-expression marshallers: for every
//! algorithm alias they give the algorithm id and the ordered
//! parameter letters of the three shapes a value can take (key,
//! signature, encrypted value).  Several aliases may share an id but
//! differ in the shapes, which is why lookups during marshalling go
//! by name, not by id.

use crate::types::{AlgoId, PK_DSA, PK_ELG, PK_ELG_E, PK_RSA};

/// Key-shape descriptor for one algorithm alias.
#[derive(Debug)]
pub struct AlgoInfo {
    /// The alias.
    pub name: &'static str,
    /// The algorithm id this alias maps to.
    pub algo: AlgoId,
    /// Parameters common to public and secret keys, in order.
    pub common: &'static str,
    /// Parameters found only in public keys, in order.
    pub public: &'static str,
    /// Parameters found only in secret keys, in order.
    pub secret: &'static str,
    /// Parameters hashed into the keygrip, in order.
    pub grip: &'static str,
}

impl AlgoInfo {
    /// Number of public key parameters.
    pub fn npkey(&self) -> usize {
        self.common.len() + self.public.len()
    }

    /// Number of secret key parameters.
    pub fn nskey(&self) -> usize {
        self.common.len() + self.secret.len()
    }
}

/// Signature-shape descriptor for one algorithm alias.
#[derive(Debug)]
pub struct SigInfo {
    /// The alias.
    pub name: &'static str,
    /// The algorithm id this alias maps to.
    pub algo: AlgoId,
    /// Signature parameters, in order.
    pub elements: &'static str,
}

/// Encryption-shape descriptor for one algorithm alias.
#[derive(Debug)]
pub struct EncInfo {
    /// The alias.
    pub name: &'static str,
    /// The algorithm id this alias maps to.
    pub algo: AlgoId,
    /// Ciphertext parameters, in order.
    pub elements: &'static str,
}

/// All key-shape descriptors.
pub static ALGO_INFO_TABLE: &[AlgoInfo] = &[
    AlgoInfo { name: "dsa", algo: PK_DSA,
               common: "pqgy", public: "", secret: "x", grip: "pqgy" },
    AlgoInfo { name: "rsa", algo: PK_RSA,
               common: "ne", public: "", secret: "dpqu", grip: "n" },
    AlgoInfo { name: "elg", algo: PK_ELG,
               common: "pgy", public: "", secret: "x", grip: "pgy" },
    AlgoInfo { name: "openpgp-dsa", algo: PK_DSA,
               common: "pqgy", public: "", secret: "x", grip: "pqgy" },
    AlgoInfo { name: "openpgp-rsa", algo: PK_RSA,
               common: "ne", public: "", secret: "dpqu", grip: "n" },
    AlgoInfo { name: "openpgp-elg", algo: PK_ELG_E,
               common: "pgy", public: "", secret: "x", grip: "pgy" },
    AlgoInfo { name: "openpgp-elg-sig", algo: PK_ELG,
               common: "pgy", public: "", secret: "x", grip: "pgy" },
    AlgoInfo { name: "oid.1.2.840.113549.1.1.1", algo: PK_RSA,
               common: "ne", public: "", secret: "dpqu", grip: "n" },
];

/// All signature-shape descriptors.
pub static SIG_INFO_TABLE: &[SigInfo] = &[
    SigInfo { name: "dsa", algo: PK_DSA, elements: "rs" },
    SigInfo { name: "rsa", algo: PK_RSA, elements: "s" },
    SigInfo { name: "elg", algo: PK_ELG, elements: "rs" },
    SigInfo { name: "openpgp-dsa", algo: PK_DSA, elements: "rs" },
    SigInfo { name: "openpgp-rsa", algo: PK_RSA, elements: "s" },
    SigInfo { name: "openpgp-elg-sig", algo: PK_ELG, elements: "rs" },
    SigInfo { name: "oid.1.2.840.113549.1.1.1", algo: PK_RSA,
              elements: "s" },
];

/// All encryption-shape descriptors.
pub static ENC_INFO_TABLE: &[EncInfo] = &[
    EncInfo { name: "elg", algo: PK_ELG, elements: "ab" },
    EncInfo { name: "rsa", algo: PK_RSA, elements: "a" },
    EncInfo { name: "openpgp-rsa", algo: PK_RSA, elements: "a" },
    EncInfo { name: "openpgp-elg", algo: PK_ELG_E, elements: "ab" },
    EncInfo { name: "openpgp-elg-sig", algo: PK_ELG, elements: "ab" },
    EncInfo { name: "oid.1.2.840.113549.1.1.1", algo: PK_RSA,
              elements: "a" },
];

/// Looks up a key-shape descriptor by alias.
pub fn algo_info_by_name(name: &[u8]) -> Option<&'static AlgoInfo> {
    ALGO_INFO_TABLE.iter().find(|i| i.name.as_bytes() == name)
}

/// Looks up a signature-shape descriptor by alias.
pub fn sig_info_by_name(name: &[u8]) -> Option<&'static SigInfo> {
    SIG_INFO_TABLE.iter().find(|i| i.name.as_bytes() == name)
}

/// Looks up an encryption-shape descriptor by alias.
pub fn enc_info_by_name(name: &[u8]) -> Option<&'static EncInfo> {
    ENC_INFO_TABLE.iter().find(|i| i.name.as_bytes() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_duplicate_letters() {
        for info in ALGO_INFO_TABLE {
            for elems in [format!("{}{}", info.common, info.public),
                          format!("{}{}", info.common, info.secret)] {
                let mut letters: Vec<char> = elems.chars().collect();
                letters.sort_unstable();
                letters.dedup();
                assert_eq!(letters.len(), elems.len(),
                           "duplicate parameter letter for {}", info.name);
            }
        }
    }

    #[test]
    fn shapes_have_key_descriptors() {
        for name in SIG_INFO_TABLE.iter().map(|i| i.name)
            .chain(ENC_INFO_TABLE.iter().map(|i| i.name))
        {
            assert!(algo_info_by_name(name.as_bytes()).is_some(),
                    "no key descriptor for {}", name);
        }
    }

    #[test]
    fn shape_ids_match_key_ids() {
        for sig in SIG_INFO_TABLE {
            let key = algo_info_by_name(sig.name.as_bytes()).unwrap();
            assert_eq!(sig.algo, key.algo, "{}", sig.name);
        }
        for enc in ENC_INFO_TABLE {
            let key = algo_info_by_name(enc.name.as_bytes()).unwrap();
            assert_eq!(enc.algo, key.algo, "{}", enc.name);
        }
    }

    #[test]
    fn grips_are_public() {
        for info in ALGO_INFO_TABLE {
            assert!(!info.grip.is_empty());
            for c in info.grip.chars() {
                assert!(info.common.contains(c) || info.public.contains(c),
                        "grip letter {} of {} is not public", c, info.name);
            }
        }
    }
}
