//! The algorithm backend registry.
//!
//! The registry is the only shared mutable state of the dispatcher.
//! A single mutex protects the set of registered backends; lookups
//! return reference-counted handles that remain valid after the
//! mutex is released, and even after the backend is unregistered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

use crate::backend::{dsa, elgamal, rsa, Engine};
use crate::types::{
    AlgoId, Usage,
    PK_DSA, PK_ELG, PK_ELG_E, PK_RSA,
    USER_ID_END, USER_ID_START,
};
use crate::Error;
use crate::Result;

/// A registered backend record.
pub struct Backend {
    id: AlgoId,
    name: String,
    usage: Usage,
    npkey: usize,
    nskey: usize,
    nsig: usize,
    nenc: usize,
    disabled: AtomicBool,
    engine: Box<dyn Engine>,
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("npkey", &self.npkey)
            .field("nskey", &self.nskey)
            .field("nsig", &self.nsig)
            .field("nenc", &self.nenc)
            .field("disabled", &self.disabled.load(Ordering::Relaxed))
            .finish()
    }
}

impl Backend {
    /// Returns the algorithm id.
    pub fn id(&self) -> AlgoId {
        self.id
    }

    /// Returns the canonical algorithm name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the supported usages.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Returns the number of public key parameters.
    pub fn npkey(&self) -> usize {
        self.npkey
    }

    /// Returns the number of secret key parameters.
    pub fn nskey(&self) -> usize {
        self.nskey
    }

    /// Returns the number of signature parameters.
    pub fn nsig(&self) -> usize {
        self.nsig
    }

    /// Returns the number of ciphertext parameters.
    pub fn nenc(&self) -> usize {
        self.nenc
    }

    /// Returns whether the backend has been disabled.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    /// Returns the operations.
    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }
}

/// Everything needed to register a backend.
pub struct BackendSpec {
    /// The canonical algorithm name.
    pub name: String,
    /// The algorithm id, or 0 to have one assigned from the user
    /// range.
    pub id: AlgoId,
    /// The supported usages.
    pub usage: Usage,
    /// Number of public key parameters.
    pub npkey: usize,
    /// Number of secret key parameters.
    pub nskey: usize,
    /// Number of signature parameters.
    pub nsig: usize,
    /// Number of ciphertext parameters.
    pub nenc: usize,
    /// The operations.
    pub engine: Box<dyn Engine>,
}

/// A reference-counted handle to a registered backend.
///
/// The record stays valid for as long as any handle exists,
/// including across unregistration.
pub type Handle = Arc<Backend>;

/// A set of registered algorithm backends.
///
/// Most callers use the process-wide registry through the crate's
/// free functions; test suites may instantiate their own.
pub struct Registry {
    modules: Mutex<Vec<Handle>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Registry {
            modules: Mutex::new(Vec::new()),
        }
    }

    /// Creates a registry with the built-in backends installed.
    pub fn with_builtins() -> Self {
        let r = Registry::new();

        for spec in [
            BackendSpec {
                name: "rsa".into(), id: PK_RSA, usage: Usage::BOTH,
                npkey: 2, nskey: 6, nsig: 1, nenc: 1,
                engine: Box::new(rsa::Rsa),
            },
            BackendSpec {
                name: "elg".into(), id: PK_ELG, usage: Usage::BOTH,
                npkey: 3, nskey: 4, nsig: 2, nenc: 2,
                engine: Box::new(elgamal::ElGamal),
            },
            BackendSpec {
                name: "openpgp-elg".into(), id: PK_ELG_E,
                usage: Usage::ENCRYPT,
                npkey: 3, nskey: 4, nsig: 2, nenc: 2,
                engine: Box::new(elgamal::ElGamal),
            },
            BackendSpec {
                name: "dsa".into(), id: PK_DSA, usage: Usage::SIGN,
                npkey: 4, nskey: 5, nsig: 2, nenc: 0,
                engine: Box::new(dsa::Dsa),
            },
        ] {
            r.register(spec)
                .expect("registering built-ins does not fail");
        }

        r
    }

    /// Registers a backend.
    ///
    /// If the spec carries no id, one is assigned from the range
    /// reserved for user backends; registration fails with an
    /// internal error when that range is exhausted.  Returns the id
    /// and a handle to the new record.
    pub fn register(&self, spec: BackendSpec) -> Result<(AlgoId, Handle)> {
        let mut modules = self.modules.lock().unwrap();

        let id = if spec.id != 0 {
            spec.id
        } else {
            (USER_ID_START..USER_ID_END)
                .find(|id| !modules.iter().any(|m| m.id == *id))
                .ok_or_else(|| Error::InternalError(
                    "user algorithm id range exhausted".into()))?
        };

        let backend = Arc::new(Backend {
            id,
            name: spec.name,
            usage: spec.usage,
            npkey: spec.npkey,
            nskey: spec.nskey,
            nsig: spec.nsig,
            nenc: spec.nenc,
            disabled: AtomicBool::new(false),
            engine: spec.engine,
        });
        modules.push(backend.clone());
        Ok((id, backend))
    }

    /// Unregisters a backend.
    ///
    /// The registry drops its reference; the record is freed once
    /// the last outstanding handle is released.
    pub fn unregister(&self, handle: &Handle) {
        let mut modules = self.modules.lock().unwrap();
        modules.retain(|m| !Arc::ptr_eq(m, handle));
    }

    /// Looks up a backend by id.
    ///
    /// The most recently registered matching record wins.  The
    /// handle's reference count is incremented under the registry
    /// lock; the handle may be used without holding it.
    pub fn lookup(&self, id: AlgoId) -> Option<Handle> {
        let modules = self.modules.lock().unwrap();
        modules.iter().rev().find(|m| m.id == id).cloned()
    }

    /// Looks up a backend by name, ignoring case.
    pub fn lookup_by_name(&self, name: &str) -> Option<Handle> {
        let modules = self.modules.lock().unwrap();
        modules.iter().rev()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Looks up a backend for dispatching an operation.
    ///
    /// Unknown and disabled algorithms are both refused.
    pub(crate) fn active(&self, id: AlgoId) -> Result<Handle> {
        match self.lookup(id) {
            Some(m) if !m.is_disabled() => Ok(m),
            _ => Err(Error::UnsupportedPublicKeyAlgorithm(
                id.to_string()).into()),
        }
    }

    /// Disables an algorithm.
    ///
    /// Idempotent.  All operations against the algorithm fail until
    /// a fresh backend is registered for the id.
    pub fn disable_algo(&self, id: AlgoId) {
        let modules = self.modules.lock().unwrap();
        for m in modules.iter().filter(|m| m.id == id) {
            m.disabled.store(true, Ordering::Relaxed);
        }
    }

    /// Returns whether the algorithm is available for the requested
    /// usage.  An empty usage means "don't care".
    pub fn test_algo(&self, id: AlgoId, usage: Usage) -> Result<()> {
        match self.lookup(id) {
            None => Err(Error::UnsupportedPublicKeyAlgorithm(
                id.to_string()).into()),
            Some(m) if !m.usage.covers(usage) =>
                Err(Error::WrongKeyUsage(
                    format!("algorithm {} cannot {}", id,
                            if usage.sign { "sign" } else { "encrypt" }))
                    .into()),
            Some(m) if m.is_disabled() =>
                Err(Error::UnsupportedPublicKeyAlgorithm(
                    id.to_string()).into()),
            Some(_) => Ok(()),
        }
    }

    /// Returns the usage flags of an algorithm, or nothing at all
    /// for unknown ids.
    pub fn algo_usage(&self, id: AlgoId) -> Usage {
        self.lookup(id).map(|m| m.usage).unwrap_or_default()
    }

    /// Returns the number of public key parameters, or 0.
    pub fn algo_npkey(&self, id: AlgoId) -> usize {
        self.lookup(id).map(|m| m.npkey).unwrap_or(0)
    }

    /// Returns the number of secret key parameters, or 0.
    pub fn algo_nskey(&self, id: AlgoId) -> usize {
        self.lookup(id).map(|m| m.nskey).unwrap_or(0)
    }

    /// Returns the number of signature parameters, or 0.
    pub fn algo_nsig(&self, id: AlgoId) -> usize {
        self.lookup(id).map(|m| m.nsig).unwrap_or(0)
    }

    /// Returns the number of ciphertext parameters, or 0.
    pub fn algo_nenc(&self, id: AlgoId) -> usize {
        self.lookup(id).map(|m| m.nenc).unwrap_or(0)
    }

    /// Maps an algorithm name to its id.
    pub fn map_name(&self, name: &str) -> Option<AlgoId> {
        self.lookup_by_name(name).map(|m| m.id)
    }

    /// Maps an algorithm id to its canonical name.
    pub fn algo_name(&self, id: AlgoId) -> Option<String> {
        self.lookup(id).map(|m| m.name.clone())
    }
}

static DEFAULT: Lazy<Registry> = Lazy::new(Registry::with_builtins);

/// Returns the process-wide registry.
///
/// The built-in backends are installed on first use.
pub fn global() -> &'static Registry {
    &DEFAULT
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Null;
    impl Engine for Null {}

    fn null_spec() -> BackendSpec {
        BackendSpec {
            name: "null".into(), id: 0, usage: Usage::SIGN,
            npkey: 1, nskey: 2, nsig: 1, nenc: 0,
            engine: Box::new(Null),
        }
    }

    #[test]
    fn builtin_lookup() {
        let r = Registry::with_builtins();
        assert_eq!(r.lookup(PK_RSA).unwrap().name(), "rsa");
        assert_eq!(r.lookup_by_name("RSA").unwrap().id(), PK_RSA);
        assert_eq!(r.map_name("dsa"), Some(PK_DSA));
        assert_eq!(r.algo_name(PK_ELG).as_deref(), Some("elg"));
        assert!(r.lookup(4711).is_none());

        assert_eq!(r.algo_npkey(PK_RSA), 2);
        assert_eq!(r.algo_nskey(PK_RSA), 6);
        assert_eq!(r.algo_nsig(PK_DSA), 2);
        assert_eq!(r.algo_nenc(PK_ELG), 2);
        assert_eq!(r.algo_nenc(4711), 0);
    }

    #[test]
    fn counts_match_descriptors() {
        let r = Registry::with_builtins();
        for info in crate::tables::ALGO_INFO_TABLE {
            assert_eq!(r.algo_npkey(info.algo), info.npkey(), "{}", info.name);
            assert_eq!(r.algo_nskey(info.algo), info.nskey(), "{}", info.name);
        }
        for sig in crate::tables::SIG_INFO_TABLE {
            assert_eq!(r.algo_nsig(sig.algo), sig.elements.len(),
                       "{}", sig.name);
        }
        for enc in crate::tables::ENC_INFO_TABLE {
            assert_eq!(r.algo_nenc(enc.algo), enc.elements.len(),
                       "{}", enc.name);
        }
    }

    #[test]
    fn user_id_assignment() {
        let r = Registry::new();
        let (id0, _h0) = r.register(null_spec()).unwrap();
        let (id1, _h1) = r.register(null_spec()).unwrap();
        assert_eq!(id0, USER_ID_START);
        assert_eq!(id1, USER_ID_START + 1);
    }

    #[test]
    fn user_id_exhaustion() {
        let r = Registry::new();
        for _ in USER_ID_START..USER_ID_END {
            r.register(null_spec()).unwrap();
        }
        let err = r.register(null_spec()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::InternalError(_))));
    }

    #[test]
    fn handles_survive_unregistration() {
        let r = Registry::new();
        let (id, handle) = r.register(null_spec()).unwrap();
        r.unregister(&handle);
        assert!(r.lookup(id).is_none());

        // The record is still valid; its trap operations answer.
        assert_eq!(handle.engine().nbits(id, &[]), 0);
        assert!(handle.engine()
                .generate(id, 1024, 0)
                .is_err());
    }

    #[test]
    fn disable_and_reregister() {
        let r = Registry::with_builtins();
        assert!(r.test_algo(PK_RSA, Usage::default()).is_ok());

        r.disable_algo(PK_RSA);
        r.disable_algo(PK_RSA); // Idempotent.
        assert!(r.active(PK_RSA).is_err());
        let err = r.test_algo(PK_RSA, Usage::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::UnsupportedPublicKeyAlgorithm(_))));

        // A freshly registered backend restores the algorithm.
        r.register(BackendSpec {
            name: "rsa".into(), id: PK_RSA, usage: Usage::BOTH,
            npkey: 2, nskey: 6, nsig: 1, nenc: 1,
            engine: Box::new(crate::backend::rsa::Rsa),
        }).unwrap();
        assert!(r.test_algo(PK_RSA, Usage::default()).is_ok());
        assert!(r.active(PK_RSA).is_ok());
    }

    #[test]
    fn usage_mismatch() {
        let r = Registry::with_builtins();
        let err = r.test_algo(PK_DSA, Usage::ENCRYPT).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::WrongKeyUsage(_))));
        assert!(r.test_algo(PK_DSA, Usage::SIGN).is_ok());
        assert_eq!(r.algo_usage(PK_DSA), Usage::SIGN);
    }

    #[test]
    fn concurrent_lookups() {
        use std::sync::Arc;
        use std::thread;

        let r = Arc::new(Registry::with_builtins());
        let mut threads = Vec::new();
        for _ in 0..8 {
            let r = r.clone();
            threads.push(thread::spawn(move || {
                for _ in 0..500 {
                    let h = r.lookup(PK_RSA).unwrap();
                    assert_eq!(h.id(), PK_RSA);
                    drop(h);
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
    }
}
