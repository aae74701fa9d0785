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

//! Built-in content encryption algorithms (RFC 7518 section 5).

use super::{Algorithm, ContentEncryptionAlgorithm};
use crate::{JoseError, Result};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;

/// The authentication tag input of AES_CBC_HMAC_SHA2: the AAD length in bits
/// as a 64-bit big-endian value, appended after `aad || iv || ciphertext`.
fn aad_bit_length(aad: &[u8]) -> [u8; 8] {
    ((aad.len() as u64) * 8).to_be_bytes()
}

macro_rules! aes_cbc_hmac {
    ($(#[$attr:meta])* $alg:ident, $name:literal, $aes:ty, $digest:ty, $cek_len:expr) => {
        $(#[$attr])*
        pub struct $alg;

        impl $alg {
            const TAG_LEN: usize = $cek_len / 2;

            fn tag(mac_key: &[u8], iv: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
                // Qualified form: both `Mac` and the aead `KeyInit` supply a
                // `new_from_slice` for `Hmac`.
                let mut mac = <Hmac<$digest> as Mac>::new_from_slice(mac_key)
                    .map_err(|_| JoseError::CryptoFailure("invalid MAC key"))?;
                mac.update(aad);
                mac.update(iv);
                mac.update(ciphertext);
                mac.update(&aad_bit_length(aad));
                let mut tag = mac.finalize().into_bytes().to_vec();
                tag.truncate(Self::TAG_LEN);
                Ok(tag)
            }

            fn split_cek(cek: &[u8]) -> Result<(&[u8], &[u8])> {
                if cek.len() != $cek_len {
                    return Err(JoseError::CryptoFailure("wrong CEK size"));
                }
                Ok(cek.split_at($cek_len / 2))
            }
        }

        impl Algorithm for $alg {
            fn name(&self) -> &str {
                $name
            }
        }

        impl ContentEncryptionAlgorithm for $alg {
            fn cek_size(&self) -> usize {
                $cek_len
            }

            fn iv_size(&self) -> usize {
                16
            }

            fn encrypt(
                &self,
                cek: &[u8],
                iv: &[u8],
                aad: &[u8],
                plaintext: &[u8],
            ) -> Result<(Vec<u8>, Vec<u8>)> {
                let (mac_key, enc_key) = Self::split_cek(cek)?;
                let cipher = cbc::Encryptor::<$aes>::new_from_slices(enc_key, iv)
                    .map_err(|_| JoseError::CryptoFailure("invalid key or IV size"))?;
                let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
                let tag = Self::tag(mac_key, iv, aad, &ciphertext)?;
                Ok((ciphertext, tag))
            }

            fn decrypt(
                &self,
                cek: &[u8],
                iv: &[u8],
                aad: &[u8],
                ciphertext: &[u8],
                tag: &[u8],
            ) -> Result<Vec<u8>> {
                let (mac_key, enc_key) = Self::split_cek(cek)?;
                let expected = Self::tag(mac_key, iv, aad, ciphertext)?;
                if !bool::from(expected.as_slice().ct_eq(tag)) {
                    return Err(JoseError::DecryptionFailed);
                }
                let cipher = cbc::Decryptor::<$aes>::new_from_slices(enc_key, iv)
                    .map_err(|_| JoseError::CryptoFailure("invalid key or IV size"))?;
                cipher
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| JoseError::DecryptionFailed)
            }
        }
    };
}

aes_cbc_hmac! {
    /// AES-128-CBC with HMAC-SHA-256 (`A128CBC-HS256`).
    A128CbcHs256, "A128CBC-HS256", aes::Aes128, sha2::Sha256, 32
}
aes_cbc_hmac! {
    /// AES-256-CBC with HMAC-SHA-512 (`A256CBC-HS512`).
    A256CbcHs512, "A256CBC-HS512", aes::Aes256, sha2::Sha512, 64
}

macro_rules! aes_gcm {
    ($(#[$attr:meta])* $alg:ident, $name:literal, $aead:ty, $cek_len:expr) => {
        $(#[$attr])*
        pub struct $alg;

        impl $alg {
            const TAG_LEN: usize = 16;

            fn cipher(cek: &[u8]) -> Result<$aead> {
                <$aead>::new_from_slice(cek).map_err(|_| JoseError::CryptoFailure("wrong CEK size"))
            }
        }

        impl Algorithm for $alg {
            fn name(&self) -> &str {
                $name
            }
        }

        impl ContentEncryptionAlgorithm for $alg {
            fn cek_size(&self) -> usize {
                $cek_len
            }

            fn iv_size(&self) -> usize {
                12
            }

            fn encrypt(
                &self,
                cek: &[u8],
                iv: &[u8],
                aad: &[u8],
                plaintext: &[u8],
            ) -> Result<(Vec<u8>, Vec<u8>)> {
                if iv.len() != self.iv_size() {
                    return Err(JoseError::CryptoFailure("wrong IV size"));
                }
                let mut combined = Self::cipher(cek)?
                    .encrypt(
                        aes_gcm::Nonce::from_slice(iv),
                        Payload {
                            msg: plaintext,
                            aad,
                        },
                    )
                    .map_err(|_| JoseError::CryptoFailure("AES-GCM encryption failed"))?;
                // The aead crate appends the tag to the ciphertext.
                let tag = combined.split_off(combined.len() - Self::TAG_LEN);
                Ok((combined, tag))
            }

            fn decrypt(
                &self,
                cek: &[u8],
                iv: &[u8],
                aad: &[u8],
                ciphertext: &[u8],
                tag: &[u8],
            ) -> Result<Vec<u8>> {
                if iv.len() != self.iv_size() || tag.len() != Self::TAG_LEN {
                    return Err(JoseError::DecryptionFailed);
                }
                let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
                combined.extend_from_slice(ciphertext);
                combined.extend_from_slice(tag);
                Self::cipher(cek)?
                    .decrypt(
                        aes_gcm::Nonce::from_slice(iv),
                        Payload {
                            msg: &combined,
                            aad,
                        },
                    )
                    .map_err(|_| JoseError::DecryptionFailed)
            }
        }
    };
}

aes_gcm! {
    /// AES-128 in Galois/Counter Mode (`A128GCM`).
    A128Gcm, "A128GCM", aes_gcm::Aes128Gcm, 16
}
aes_gcm! {
    /// AES-256 in Galois/Counter Mode (`A256GCM`).
    A256Gcm, "A256GCM", aes_gcm::Aes256Gcm, 32
}
