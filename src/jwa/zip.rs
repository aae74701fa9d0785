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

//! Built-in compression algorithms (RFC 7516 section 4.1.3).

use super::{Algorithm, CompressionAlgorithm};
use crate::{JoseError, Result};
use flate2::read::{DeflateDecoder, DeflateEncoder};
use std::io::Read;

/// Raw DEFLATE payload compression (`DEF`).
pub struct Deflate;

impl Algorithm for Deflate {
    fn name(&self) -> &str {
        "DEF"
    }
}

impl CompressionAlgorithm for Deflate {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut compressed = Vec::new();
        DeflateEncoder::new(data, flate2::Compression::default())
            .read_to_end(&mut compressed)
            .map_err(|_| JoseError::CompressionFailed)?;
        Ok(compressed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        DeflateDecoder::new(data)
            .read_to_end(&mut decompressed)
            .map_err(|_| JoseError::CompressionFailed)?;
        Ok(decompressed)
    }
}
