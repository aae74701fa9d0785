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

//! Set of types for supporting [JSON Object Signing and Encryption (JOSE)][JOSE].
//!
//! Builds on the [`serde_json`](https://docs.rs/serde_json) crate for
//! underlying JSON support, and on external primitive crates for the actual
//! cryptography; this crate covers the object model and its transformation
//! pipelines.
//!
//! ## Usage
//!
//! ```
//! use jose::{
//!     jwa::signature_algorithm_factory, HeaderBuilder, Jws, JwsBuilder, JwsVerifier,
//!     JwkBuilder,
//! };
//!
//! // Build the algorithm catalog once and scope a manager to what this
//! // application actually uses.
//! let factory = signature_algorithm_factory();
//! let algorithms = factory.create(&["HS256"]).unwrap();
//!
//! // A fresh symmetric key.
//! let key = JwkBuilder::generate_symmetric_key(32).key_id("key-1").build();
//!
//! // Sign a payload.
//! let jws = JwsBuilder::new(&algorithms)
//!     .payload(*b"This is the content")
//!     .add_signature(
//!         &key,
//!         HeaderBuilder::new().alg("HS256".to_owned()).build(),
//!         jose::Header::default(),
//!     )
//!     .unwrap()
//!     .build();
//!
//! // Serialize to the compact wire form.
//! let token = jws.to_compact().unwrap();
//! println!("token: {token}");
//!
//! // At the receiving end, parse and verify.
//! let received = Jws::from_compact(&token).unwrap();
//! let verifier = JwsVerifier::new(&algorithms);
//! assert!(verifier.verify(&received, &key, 0).is_ok());
//! assert_eq!(received.payload, b"This is the content");
//!
//! // A different key won't verify.
//! let other_key = JwkBuilder::generate_symmetric_key(32).build();
//! assert!(verifier.verify(&received, &other_key, 0).is_err());
//! ```
//!
//! [JOSE]: https://datatracker.ietf.org/doc/html/rfc7515

#![deny(rustdoc::broken_intra_doc_links)]

#[macro_use]
pub(crate) mod util;
pub use util::{b64_decode, b64_encode};

pub mod jwa;

mod checker;
pub use checker::*;
mod common;
pub use common::*;
mod encrypt;
pub use encrypt::*;
mod header;
pub use header::*;
mod key;
pub use key::*;
mod sign;
pub use sign::*;
