// Copyright 2022 Matthew Ingwersen.
//
// Licensed under the Apache License, Version 2.0 (the "License"); you
// may not use this file except in compliance with the License. You may
// obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied. See the License for the specific language governing
// permissions and limitations under the License.

//! Implementation of the [`Error`] type for cache-building and lookup
//! operations.

use std::fmt;

use crate::name::MAX_OWNER_NAME_LEN;
use crate::provider::ProviderError;
use crate::rr::MAX_RDATA_LEN;

/// Errors that arise while building, refreshing, or directly querying
/// a zone cache.
///
/// The absence of an answer is *not* an error: lookups express it as
/// [`None`]. Every variant here aborts the enclosing operation, and the
/// enclosing operation always discards its partial work and leaves the
/// previously served cache (if any) fully intact.
#[derive(Debug)]
pub enum Error {
    /// A provider row carried a ttl/type/isp/location/idc field that is
    /// not parseable as an integer, or an empty owner name.
    Malformed {
        field: &'static str,
        value: String,
    },

    /// A provider row's owner name exceeded [`MAX_OWNER_NAME_LEN`]
    /// bytes.
    NameTooLong,

    /// A provider row's RDATA exceeded [`MAX_RDATA_LEN`] bytes.
    RdataTooLong,

    /// Memory could not be reserved while creating a node or record.
    OutOfMemory,

    /// The backing store was unreachable, and the single reconnect
    /// attempt also failed.
    Provider(ProviderError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Malformed { field, value } => {
                write!(f, "malformed {field} field in provider row: {value:?}")
            }
            Self::NameTooLong => write!(
                f,
                "a row's owner name is longer than {MAX_OWNER_NAME_LEN} bytes",
            ),
            Self::RdataTooLong => {
                write!(f, "a row's RDATA is longer than {MAX_RDATA_LEN} bytes")
            }
            Self::OutOfMemory => f.write_str("out of memory"),
            Self::Provider(e) => write!(f, "row provider unavailable: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Provider(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProviderError> for Error {
    fn from(error: ProviderError) -> Self {
        Self::Provider(error)
    }
}
