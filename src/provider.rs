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

//! The [`RowProvider`] trait, through which zone record rows are read
//! from the relational backing store.
//!
//! The backing store itself (its SQL dialect, connection management,
//! zone-to-table mapping, and authentication) is the provider
//! implementation's business. This module specifies only the interface
//! the cache-building machinery consumes: a liveness check, a single
//! reconnect operation, and the three row queries. All row fields are
//! delivered as raw text, exactly as a text-protocol SQL result set
//! produces them; parsing and validation happen on this side of the
//! interface (see [`cache`](crate::cache)).

use std::fmt;
use std::time::Instant;

use log::warn;

use crate::name::OwnerName;
use crate::rr::Type;

////////////////////////////////////////////////////////////////////////
// ROWS                                                               //
////////////////////////////////////////////////////////////////////////

/// One raw zone record row, as fetched from the backing store.
///
/// Every field is unparsed text. The `ttl`, `rdtype_id`, `isp_id`,
/// `location_id`, and `idc_id` fields must parse as integers; a row for
/// which they do not is *malformed* and aborts the enclosing operation.
/// Rows whose owner name begins with `*.` are wildcard-owner rows.
///
/// Providers must return only rows whose activity flag is set; rows
/// disabled in the backing store are never visible to this crate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ZoneRow {
    pub name: String,
    pub ttl: String,
    pub rdata: String,
    pub rdtype_id: String,
    pub isp_id: String,
    pub location_id: String,
    pub idc_id: String,
}

////////////////////////////////////////////////////////////////////////
// THE ROW PROVIDER TRAIT                                             //
////////////////////////////////////////////////////////////////////////

/// Trait for backing-store row sources.
///
/// All methods accept an optional deadline. Implementations should
/// abandon the underlying I/O once the deadline passes and report the
/// expiry as a [`ProviderError`]; the deadline is advisory for
/// implementations that cannot interrupt their I/O.
pub trait RowProvider {
    /// Checks that the backing-store session is still live.
    fn ping(&mut self, deadline: Option<Instant>) -> Result<(), ProviderError>;

    /// Re-establishes the backing-store session after a failed
    /// [`ping`](RowProvider::ping). Called at most once per operation;
    /// this crate never retries beyond that (see [`maybe_reconnect`]).
    fn reconnect(&mut self, deadline: Option<Instant>) -> Result<(), ProviderError>;

    /// Fetches every active row of `zone`, ordered by owner name.
    ///
    /// The ordering lets bulk loading append each row to the node it
    /// just created in amortized constant time; it is an expectation,
    /// not a correctness requirement.
    fn fetch_zone_rows(
        &mut self,
        zone: &OwnerName,
        deadline: Option<Instant>,
    ) -> Result<Vec<ZoneRow>, ProviderError>;

    /// Fetches the active rows of `zone` whose owner name is exactly
    /// `name` (case-insensitively).
    fn fetch_name_rows(
        &mut self,
        zone: &OwnerName,
        name: &OwnerName,
        deadline: Option<Instant>,
    ) -> Result<Vec<ZoneRow>, ProviderError>;

    /// Fetches the answer-candidate rows for a single query: the active
    /// rows of `zone` whose owner name is `qname` *or* the zone's
    /// wildcard name `*.zone`.
    ///
    /// `qtype` is a filtering hint. For an address query (A or AAAA)
    /// the provider must also return CNAME and NS rows for those
    /// owners, address rows first; for ANY or the unspecified type it
    /// must return every row; for any other type, rows of exactly that
    /// type suffice.
    fn fetch_candidates(
        &mut self,
        zone: &OwnerName,
        qname: &OwnerName,
        qtype: Type,
        deadline: Option<Instant>,
    ) -> Result<Vec<ZoneRow>, ProviderError>;
}

/// Checks that `provider` is live, making a single reconnect attempt if
/// it is not. A second failure is surfaced to the caller; there are no
/// retry loops and no backoff.
pub(crate) fn maybe_reconnect<P>(
    provider: &mut P,
    deadline: Option<Instant>,
) -> Result<(), ProviderError>
where
    P: RowProvider + ?Sized,
{
    match provider.ping(deadline) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Row provider ping failed ({e}); attempting to reconnect.");
            provider.reconnect(deadline)
        }
    }
}

////////////////////////////////////////////////////////////////////////
// ERRORS                                                             //
////////////////////////////////////////////////////////////////////////

/// The error reported by [`RowProvider`] implementations when the
/// backing store cannot be reached or a query against it fails.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProviderError {
    message: String,
}

impl ProviderError {
    /// Creates a new `ProviderError` with the given description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderError {}
