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

//! The [`OwnerName`] structure, a bounded owner-name text type.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use arrayvec::ArrayString;

/// The maximum length (in bytes) of an owner name.
pub const MAX_OWNER_NAME_LEN: usize = 254;

////////////////////////////////////////////////////////////////////////
// OWNER NAMES                                                        //
////////////////////////////////////////////////////////////////////////

/// The owner name of a [`Node`](crate::store::Node) or of a single
/// record row.
///
/// Owner names are textual, at most [`MAX_OWNER_NAME_LEN`] bytes long,
/// and compare (and hash) ASCII-case-insensitively, so that
/// `www.example.com` and `WWW.Example.COM` denote the same owner. A
/// name whose text literally begins with `*.` is a *wildcard owner*;
/// see [`OwnerName::is_wildcard`]. The length bound is a validated
/// invariant of the type: construction fails rather than truncating.
#[derive(Clone, Debug)]
pub struct OwnerName {
    text: ArrayString<MAX_OWNER_NAME_LEN>,
}

impl OwnerName {
    /// Creates a new `OwnerName` from `text`, which must be non-empty
    /// and at most [`MAX_OWNER_NAME_LEN`] bytes long.
    pub fn new(text: &str) -> Result<Self, Error> {
        if text.is_empty() {
            Err(Error::Empty)
        } else {
            let text = ArrayString::from(text).map_err(|_| Error::TooLong)?;
            Ok(Self { text })
        }
    }

    /// Creates the wildcard owner name `*.apex` covering every name
    /// directly under `apex`.
    pub fn wildcard_of(apex: &OwnerName) -> Result<Self, Error> {
        let mut text = ArrayString::new();
        text.try_push_str("*.").map_err(|_| Error::TooLong)?;
        text.try_push_str(apex.as_str()).map_err(|_| Error::TooLong)?;
        Ok(Self { text })
    }

    /// Returns the name's text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Returns whether this is a wildcard owner name, i.e. whether its
    /// text literally begins with `*.`.
    pub fn is_wildcard(&self) -> bool {
        self.text.starts_with("*.")
    }
}

impl PartialEq for OwnerName {
    fn eq(&self, other: &Self) -> bool {
        self.text.eq_ignore_ascii_case(&other.text)
    }
}

impl Eq for OwnerName {}

impl Hash for OwnerName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Must agree with the case-insensitive PartialEq above.
        for octet in self.text.bytes() {
            state.write_u8(octet.to_ascii_lowercase());
        }
    }
}

impl FromStr for OwnerName {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::new(text)
    }
}

impl fmt::Display for OwnerName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// Errors that arise when constructing an [`OwnerName`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    Empty,
    TooLong,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Empty => f.write_str("the owner name is empty"),
            Self::TooLong => write!(
                f,
                "the owner name is longer than {MAX_OWNER_NAME_LEN} bytes",
            ),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
