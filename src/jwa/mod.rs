// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
////////////////////////////////////////////////////////////////////////////////

//! JWA algorithm registry (RFC 7518): the four capability categories, the
//! per-category manager, and the catalog of built-in implementations.

use crate::{Header, Jwk, JoseError, Result};
use serde_json::{Map, Value};
use std::sync::Arc;

mod enc;
mod keymgmt;
mod sign;
mod zip;

pub use enc::{A128CbcHs256, A128Gcm, A256CbcHs512, A256Gcm};
pub use keymgmt::{A128Kw, A192Kw, A256Kw, Dir, EcdhEs};
pub use sign::{Ed25519, Es256, Hs256, Hs384, Hs512, NoneAlgorithm};
pub use zip::Deflate;

#[cfg(test)]
mod tests;

/// Behaviour common to every algorithm: a stable name, used as the registry
/// key and as the wire `alg`/`enc`/`zip` value.
pub trait Algorithm {
    /// The wire identifier of the algorithm.
    fn name(&self) -> &str;
}

/// A digital signature or MAC algorithm (`alg` of a JWS).
pub trait SignatureAlgorithm: Algorithm {
    /// Sign `data` with `key`.
    fn sign(&self, key: &Jwk, data: &[u8]) -> Result<Vec<u8>>;

    /// Verify `signature` over `data` with `key`. A well-formed but wrong
    /// signature is `Ok(false)`; malformed inputs are errors.
    fn verify(&self, key: &Jwk, data: &[u8], signature: &[u8]) -> Result<bool>;
}

/// How a key management algorithm produces the content encryption key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyManagementMode {
    /// A random CEK is generated and wrapped for each recipient.
    Wrap,
    /// The shared key itself is the CEK; the encrypted key is empty.
    Direct,
    /// The CEK is derived from a key agreement; the encrypted key is empty.
    Agreement,
}

/// A key management algorithm (`alg` of a JWE recipient).
pub trait KeyManagementAlgorithm: Algorithm {
    /// The mode this algorithm operates in.
    fn mode(&self) -> KeyManagementMode;

    /// Produce the CEK for direct and agreement modes, recording any
    /// agreement parameters (such as `epk`) in the recipient header.
    fn derive_cek(
        &self,
        _key: &Jwk,
        _enc: &dyn ContentEncryptionAlgorithm,
        _header: &mut Header,
    ) -> Result<Vec<u8>> {
        Err(JoseError::CryptoFailure("algorithm does not derive keys"))
    }

    /// Wrap an externally generated CEK for one recipient (wrap mode only).
    fn wrap_cek(&self, _key: &Jwk, _cek: &[u8], _header: &mut Header) -> Result<Vec<u8>> {
        Err(JoseError::CryptoFailure("algorithm does not wrap keys"))
    }

    /// Recover the CEK on the consuming side from the recipient's encrypted
    /// key and the merged headers.
    fn unwrap_cek(
        &self,
        key: &Jwk,
        encrypted_key: &[u8],
        enc: &dyn ContentEncryptionAlgorithm,
        header: &Map<String, Value>,
    ) -> Result<Vec<u8>>;
}

/// An AEAD content encryption algorithm (`enc` of a JWE).
pub trait ContentEncryptionAlgorithm: Algorithm {
    /// Size of the CEK in bytes.
    fn cek_size(&self) -> usize;

    /// Size of the IV in bytes.
    fn iv_size(&self) -> usize;

    /// Encrypt `plaintext`, returning `(ciphertext, tag)`.
    fn encrypt(&self, cek: &[u8], iv: &[u8], aad: &[u8], plaintext: &[u8])
        -> Result<(Vec<u8>, Vec<u8>)>;

    /// Decrypt `ciphertext`, authenticating `aad` and `tag`.
    fn decrypt(
        &self,
        cek: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>>;
}

/// A payload compression algorithm (`zip` of a JWE).
pub trait CompressionAlgorithm: Algorithm {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// A name-to-implementation mapping scoped to one capability category.
///
/// Pipelines borrow a manager for the duration of one build/verify or
/// encrypt/decrypt call, so no mutation can be observed mid-operation.
pub struct AlgorithmManager<A: ?Sized> {
    algorithms: Vec<(String, Arc<A>)>,
}

impl<A: ?Sized + Algorithm> AlgorithmManager<A> {
    /// Create an empty manager.
    pub fn new() -> Self {
        AlgorithmManager {
            algorithms: Vec::new(),
        }
    }

    /// Register an algorithm under its own name. A no-op if the name is
    /// already present: the first registration wins.
    pub fn add(&mut self, algorithm: Arc<A>) {
        if !self.has(algorithm.name()) {
            self.algorithms
                .push((algorithm.name().to_owned(), algorithm));
        }
    }

    /// Remove the algorithm registered under `name`, if any.
    pub fn remove(&mut self, name: &str) {
        self.algorithms.retain(|(n, _)| n != name);
    }

    /// Indicate whether `name` is registered.
    pub fn has(&self, name: &str) -> bool {
        self.algorithms.iter().any(|(n, _)| n == name)
    }

    /// Look up the algorithm registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Arc<A>> {
        self.algorithms
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, a)| a)
    }

    /// All registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.algorithms.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Look up `name`, failing with [`JoseError::AlgorithmNotFound`].
    pub(crate) fn require(&self, name: &str) -> Result<&Arc<A>> {
        self.get(name)
            .ok_or_else(|| JoseError::AlgorithmNotFound(name.to_owned()))
    }
}

impl<A: ?Sized + Algorithm> Default for AlgorithmManager<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// A superset catalog from which scoped [`AlgorithmManager`]s are built.
///
/// Build the catalog once at process start and pass it by reference into
/// whatever constructs pipelines; [`create`](Self::create) is the sole point
/// at which managers come into existence.
pub struct AlgorithmManagerFactory<A: ?Sized> {
    available: Vec<(String, Arc<A>)>,
}

impl<A: ?Sized + Algorithm> AlgorithmManagerFactory<A> {
    /// Create an empty catalog.
    pub fn new() -> Self {
        AlgorithmManagerFactory {
            available: Vec::new(),
        }
    }

    /// Add an algorithm to the catalog under its own name. The first
    /// registration of a name wins.
    pub fn add(&mut self, algorithm: Arc<A>) {
        if !self.available.iter().any(|(n, _)| n == algorithm.name()) {
            self.available
                .push((algorithm.name().to_owned(), algorithm));
        }
    }

    /// All catalogued names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.available.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Resolve `names` against the catalog and return a scoped manager
    /// containing only those algorithms, failing with
    /// [`JoseError::UnknownAlgorithm`] if any name is not catalogued.
    pub fn create(&self, names: &[&str]) -> Result<AlgorithmManager<A>> {
        let mut manager = AlgorithmManager::new();
        for name in names {
            let (_, algorithm) = self
                .available
                .iter()
                .find(|(n, _)| n == name)
                .ok_or_else(|| JoseError::UnknownAlgorithm((*name).to_owned()))?;
            manager.add(algorithm.clone());
        }
        Ok(manager)
    }
}

impl<A: ?Sized + Algorithm> Default for AlgorithmManagerFactory<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Catalog of all built-in signature algorithms.
pub fn signature_algorithm_factory() -> AlgorithmManagerFactory<dyn SignatureAlgorithm> {
    let mut factory = AlgorithmManagerFactory::new();
    factory.add(Arc::new(NoneAlgorithm) as Arc<dyn SignatureAlgorithm>);
    factory.add(Arc::new(Hs256));
    factory.add(Arc::new(Hs384));
    factory.add(Arc::new(Hs512));
    factory.add(Arc::new(Ed25519));
    factory.add(Arc::new(Es256));
    factory
}

/// Catalog of all built-in key management algorithms.
pub fn key_management_algorithm_factory() -> AlgorithmManagerFactory<dyn KeyManagementAlgorithm> {
    let mut factory = AlgorithmManagerFactory::new();
    factory.add(Arc::new(Dir) as Arc<dyn KeyManagementAlgorithm>);
    factory.add(Arc::new(A128Kw));
    factory.add(Arc::new(A192Kw));
    factory.add(Arc::new(A256Kw));
    factory.add(Arc::new(EcdhEs));
    factory
}

/// Catalog of all built-in content encryption algorithms.
pub fn content_encryption_algorithm_factory(
) -> AlgorithmManagerFactory<dyn ContentEncryptionAlgorithm> {
    let mut factory = AlgorithmManagerFactory::new();
    factory.add(Arc::new(A128CbcHs256) as Arc<dyn ContentEncryptionAlgorithm>);
    factory.add(Arc::new(A256CbcHs512));
    factory.add(Arc::new(A128Gcm));
    factory.add(Arc::new(A256Gcm));
    factory
}

/// Catalog of all built-in compression algorithms.
pub fn compression_algorithm_factory() -> AlgorithmManagerFactory<dyn CompressionAlgorithm> {
    let mut factory = AlgorithmManagerFactory::new();
    factory.add(Arc::new(Deflate) as Arc<dyn CompressionAlgorithm>);
    factory
}
