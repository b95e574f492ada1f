//! End-to-end runs through the public operations.

use sexp_pubkey::{
    backend::Engine,
    crypto::hash::HashAlgorithm,
    decrypt, encrypt, generate_key, key_nbits, keygrip, sign, test_key,
    types::{self, Usage},
    verify,
    Error, Registry, Sexp,
};

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn sexp(text: &str) -> Sexp {
    Sexp::from_bytes(text.as_bytes()).unwrap()
}

fn genkey(algo: &str, nbits: usize) -> Sexp {
    generate_key(&sexp(&format!(
        "(genkey ({} (nbits \"{}\")))", algo, nbits))).unwrap()
}

fn assert_error(err: anyhow::Error, want: fn(&Error) -> bool) {
    let err = err.downcast::<Error>().unwrap();
    assert!(want(&err), "unexpected error: {}", err);
}

#[test]
fn rsa_end_to_end() {
    let key = genkey("rsa", 768);
    let public = key.find_token(b"public-key").unwrap().clone();
    let secret = key.find_token(b"private-key").unwrap().clone();

    test_key(&secret).unwrap();
    assert_eq!(key_nbits(&public).unwrap(), 768);
    assert_eq!(key_nbits(&secret).unwrap(), 768);

    // The grip only covers public parameters.
    assert_eq!(keygrip(&public).unwrap(), keygrip(&secret).unwrap());

    // Raw encryption round trip; the flags list makes the result
    // modern, so the plaintext comes back as (value ...).
    let plaintext = b"\x01\x02\x03\x04\x05\x06\x07\x08";
    let data = sexp(&format!(
        "(data (flags raw) (value #{}#))", hex(plaintext)));
    let ciphertext = encrypt(&data, &public).unwrap();
    assert!(ciphertext.find_token(b"enc-val").is_some());
    assert!(ciphertext.find_token(b"flags").is_some());

    let back = decrypt(&ciphertext, &secret).unwrap();
    let value = back.find_token(b"value").unwrap();
    assert_eq!(value.nth(1).unwrap().atom().unwrap(), plaintext);

    // Signing with PKCS#1 block type 1.
    let digest = [0x5a; 20];
    let hash = sexp(&format!(
        "(data (flags pkcs1) (hash sha1 #{}#))", hex(&digest)));
    let signature = sign(&hash, &secret).unwrap();
    assert!(signature.find_token(b"sig-val").is_some());
    verify(&signature, &hash, &public).unwrap();

    let other = sexp(&format!(
        "(data (flags pkcs1) (hash sha1 #{}#))", hex(&[0x5b; 20])));
    assert_error(verify(&signature, &other, &public).unwrap_err(),
                 |e| matches!(e, Error::BadSignature(_)));

    // The whole key-data expression works as a key, too; the first
    // matching sublist is used.
    verify(&signature, &hash, &key).unwrap();
}

#[test]
fn rsa_pkcs1_encryption() {
    let key = genkey("rsa", 768);
    let public = key.find_token(b"public-key").unwrap().clone();
    let secret = key.find_token(b"private-key").unwrap().clone();

    let payload = [0xab; 16];
    let data = sexp(&format!(
        "(data (flags pkcs1) (value #{}#))", hex(&payload)));
    let ciphertext = encrypt(&data, &public).unwrap();

    // This layer frames but does not unframe: the decrypted value is
    // the PKCS#1 block type 2 frame, sans the leading zero octet.
    let back = decrypt(&ciphertext, &secret).unwrap();
    let frame = back.find_token(b"value").unwrap()
        .nth(1).unwrap().atom().unwrap().to_vec();
    assert_eq!(frame.len(), 95);
    assert_eq!(frame[0], 2);
    let separator = frame.len() - payload.len() - 1;
    assert!(frame[1..separator].iter().all(|&b| b != 0));
    assert_eq!(frame[separator], 0);
    assert_eq!(&frame[separator + 1..], &payload[..]);
}

#[test]
fn legacy_decrypt_output() {
    let key = genkey("rsa", 768);
    let public = key.find_token(b"public-key").unwrap().clone();
    let secret = key.find_token(b"private-key").unwrap().clone();

    let data = sexp("(data (flags raw) (value #0D0E0F#))");
    let ciphertext = encrypt(&data, &public).unwrap();

    // Strip the flags list to get a legacy enc-val; the plaintext
    // then comes back as a bare value.
    let algo_part = ciphertext.nth(2).unwrap().clone();
    let legacy = Sexp::list(vec![Sexp::string("enc-val"), algo_part]);
    let back = decrypt(&legacy, &secret).unwrap();
    assert_eq!(back.atom().unwrap(), b"\x0d\x0e\x0f");
}

#[test]
fn no_blinding_flag_round_trips() {
    let key = genkey("rsa", 768);
    let public = key.find_token(b"public-key").unwrap().clone();
    let secret = key.find_token(b"private-key").unwrap().clone();

    let data = sexp("(data (flags raw no-blinding) (value #7F#))");
    let ciphertext = encrypt(&data, &public).unwrap();
    let flags = ciphertext.find_token(b"flags").unwrap();
    assert!((0..flags.len()).any(
        |i| flags.nth(i).and_then(Sexp::atom) == Some(&b"no-blinding"[..])));

    let back = decrypt(&ciphertext, &secret).unwrap();
    assert_eq!(back.find_token(b"value").unwrap()
               .nth(1).unwrap().atom().unwrap(),
               b"\x7f");
}

#[test]
fn generated_parameters_come_in_descriptor_order() {
    let key = genkey("rsa", 512);

    let public = key.find_token(b"public-key").unwrap();
    let algo = public.nth(1).unwrap();
    let names: Vec<&[u8]> = (0..algo.len())
        .filter_map(|i| algo.nth(i).and_then(|e| e.nth(0)))
        .filter_map(Sexp::atom)
        .collect();
    assert_eq!(names, vec![&b"n"[..], b"e"]);

    let private = key.find_token(b"private-key").unwrap();
    let algo = private.nth(1).unwrap();
    let names: Vec<&[u8]> = (0..algo.len())
        .filter_map(|i| algo.nth(i).and_then(|e| e.nth(0)))
        .filter_map(Sexp::atom)
        .collect();
    assert_eq!(names, vec![&b"n"[..], b"e", b"d", b"p", b"q", b"u"]);

    assert!(key.find_token(b"misc-key-info").is_some());
    assert!(key.find_token(b"pm1-factors").is_some());
}

#[test]
fn key_round_trips_through_the_canonical_encoding() {
    let key = genkey("rsa", 512);
    let reparsed = Sexp::from_bytes(&key.to_vec()).unwrap();
    assert_eq!(reparsed, key);
    assert_eq!(keygrip(&reparsed).unwrap(), keygrip(&key).unwrap());
}

#[test]
fn dsa_end_to_end() {
    let key = genkey("dsa", 512);
    let public = key.find_token(b"public-key").unwrap().clone();
    let secret = key.find_token(b"private-key").unwrap().clone();

    test_key(&secret).unwrap();
    assert_eq!(key_nbits(&public).unwrap(), 512);

    // DSA key generation reports the subgroup order among the
    // factors of p - 1.
    let factors = key.find_token(b"pm1-factors").unwrap();
    assert_eq!(factors.len(), 2);

    // DSA callers pass the bare digest as a raw value.
    let digest = [0x21; 20];
    let hash = sexp(&format!(
        "(data (flags raw) (value #{}#))", hex(&digest)));
    let signature = sign(&hash, &secret).unwrap();
    verify(&signature, &hash, &public).unwrap();

    let other = sexp(&format!(
        "(data (flags raw) (value #{}#))", hex(&[0x22; 20])));
    assert_error(verify(&signature, &other, &public).unwrap_err(),
                 |e| matches!(e, Error::BadSignature(_)));

    // DSA cannot encrypt: there is no ciphertext shape for it.
    let data = sexp("(data (flags raw) (value #01#))");
    assert_error(encrypt(&data, &public).unwrap_err(),
                 |e| matches!(e, Error::UnsupportedPublicKeyAlgorithm(_)));
}

#[test]
fn elgamal_end_to_end() {
    let key = genkey("elg", 320);
    let public = key.find_token(b"public-key").unwrap().clone();
    let secret = key.find_token(b"private-key").unwrap().clone();

    test_key(&secret).unwrap();

    let plaintext = b"\x11\x22\x33\x44";
    let data = sexp(&format!(
        "(data (flags raw) (value #{}#))", hex(plaintext)));
    let ciphertext = encrypt(&data, &public).unwrap();

    // ElGamal ciphertexts carry two parameters.
    let algo = ciphertext.nth(2).unwrap();
    assert_eq!(algo.nth(0).unwrap().atom().unwrap(), b"elg");
    assert_eq!(algo.len(), 3);

    let back = decrypt(&ciphertext, &secret).unwrap();
    assert_eq!(back.find_token(b"value").unwrap()
               .nth(1).unwrap().atom().unwrap(),
               &plaintext[..]);

    // ElGamal signatures work under the sign-and-encrypt id.
    let digest = [0x42; 20];
    let hash = sexp(&format!(
        "(data (flags raw) (value #{}#))", hex(&digest)));
    let signature = sign(&hash, &secret).unwrap();
    verify(&signature, &hash, &public).unwrap();
}

#[test]
fn algorithm_mismatch_is_a_conflict() {
    let key = genkey("rsa", 512);
    let secret = key.find_token(b"private-key").unwrap().clone();

    let foreign = sexp("(enc-val (elg (a #02#) (b #03#)))");
    assert_error(decrypt(&foreign, &secret).unwrap_err(),
                 |e| matches!(e, Error::Conflict(_)));

    let public = key.find_token(b"public-key").unwrap().clone();
    let foreign_sig = sexp("(sig-val (dsa (r #02#) (s #03#)))");
    let hash = sexp("(data (flags raw) (value #01#))");
    assert_error(verify(&foreign_sig, &hash, &public).unwrap_err(),
                 |e| matches!(e, Error::Conflict(_)));
}

#[test]
fn backend_decrypt_failures_are_masked() {
    let key = genkey("rsa", 512);
    let secret = key.find_token(b"private-key").unwrap().clone();

    // A ciphertext far beyond the modulus makes the backend refuse;
    // the caller only learns that decryption failed.
    let huge = sexp(&format!(
        "(enc-val (flags) (rsa (a #{}#)))", hex(&[0xff; 80])));
    assert_error(decrypt(&huge, &secret).unwrap_err(),
                 |e| matches!(e, Error::OperationFailed(_)));
}

#[test]
fn disabled_algorithms_refuse_all_operations() {
    let registry = Registry::with_builtins();
    let key = registry.generate_key(
        &sexp("(genkey (rsa (nbits \"512\")))")).unwrap();
    let public = key.find_token(b"public-key").unwrap().clone();
    let secret = key.find_token(b"private-key").unwrap().clone();
    let data = sexp("(data (flags raw) (value #01#))");

    registry.disable_algo(types::PK_RSA);
    for err in [
        registry.encrypt(&data, &public).unwrap_err(),
        registry.sign(&data, &secret).unwrap_err(),
        registry.test_key(&secret).unwrap_err(),
        registry.key_nbits(&public).unwrap_err(),
        registry.generate_key(
            &sexp("(genkey (rsa (nbits \"512\")))")).unwrap_err(),
    ] {
        assert_error(err,
                     |e| matches!(
                         e, Error::UnsupportedPublicKeyAlgorithm(_)));
    }

    // Registering a fresh backend restores the previous behaviour.
    use sexp_pubkey::registry::BackendSpec;
    struct Probe;
    impl Engine for Probe {
        fn nbits(&self, _: types::AlgoId,
                 pkey: &[sexp_pubkey::crypto::mpi::MPI]) -> usize {
            pkey.first().map(|n| n.bits()).unwrap_or(0)
        }
    }
    registry.register(BackendSpec {
        name: "rsa".into(), id: types::PK_RSA, usage: Usage::BOTH,
        npkey: 2, nskey: 6, nsig: 1, nenc: 1,
        engine: Box::new(Probe),
    }).unwrap();
    assert_eq!(registry.key_nbits(&public).unwrap(), 512);
}

#[test]
fn rsa_nbits_without_a_backend() {
    let registry = Registry::new();
    let key = sexp("(public-key (rsa (n #808182#) (e #010001#)))");
    assert_eq!(registry.key_nbits(&key).unwrap(), 24);

    // Only RSA enjoys the fallback.
    let dsa = sexp(
        "(public-key (dsa (p #11#) (q #0B#) (g #02#) (y #09#)))");
    assert!(registry.key_nbits(&dsa).is_err());
}

#[test]
fn partial_backends_trap_at_call_time() {
    let registry = Registry::new();
    struct NbitsOnly;
    impl Engine for NbitsOnly {}

    use sexp_pubkey::registry::BackendSpec;
    let (id, handle) = registry.register(BackendSpec {
        name: "toy".into(), id: 0, usage: Usage::SIGN,
        npkey: 1, nskey: 2, nsig: 1, nenc: 0,
        engine: Box::new(NbitsOnly),
    }).unwrap();
    assert!(id >= types::USER_ID_START && id < types::USER_ID_END);

    assert_error(handle.engine().generate(id, 512, 0).unwrap_err(),
                 |e| matches!(
                     e, Error::UnsupportedPublicKeyAlgorithm(_)));

    registry.unregister(&handle);
    assert!(registry.lookup(id).is_none());
    // The handle keeps the record alive.
    assert_eq!(handle.engine().nbits(id, &[]), 0);
}

#[test]
fn keygrip_matches_manual_sha1() {
    let key = genkey("rsa", 512);
    let public = key.find_token(b"public-key").unwrap();
    let n = public.find_token(b"n").unwrap()
        .nth(1).unwrap().atom().unwrap();

    let mut md = HashAlgorithm::SHA1.context().unwrap();
    md.update(n);
    let mut expected = [0u8; 20];
    md.digest(&mut expected);

    assert_eq!(keygrip(&key).unwrap(), expected);
}

#[test]
fn unknown_data_flag_is_reported() {
    let key = genkey("rsa", 512);
    let public = key.find_token(b"public-key").unwrap().clone();
    let data = sexp("(data (flags wibble) (value #00#))");
    assert_error(encrypt(&data, &public).unwrap_err(),
                 |e| matches!(e, Error::InvalidFlag(_)));
}

#[test]
fn openpgp_elg_cannot_sign() {
    let registry = Registry::with_builtins();
    assert!(registry.test_algo(types::PK_ELG_E, Usage::ENCRYPT).is_ok());
    let err = registry.test_algo(types::PK_ELG_E, Usage::SIGN)
        .unwrap_err();
    assert_error(err, |e| matches!(e, Error::WrongKeyUsage(_)));
}
