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

//! Meridian is a geo/network-aware answer-selection engine for DNS
//! zones, designed to be embedded in a larger name server and invoked
//! per query.
//!
//! Given a query name, record type, and the requester's
//! network-location tags (ISP, geographic location, and facility/IDC
//! identifiers), Meridian returns the most specific matching set of
//! zone records. The same owner name may carry many candidate records
//! differentiated only by their tags; a cascade of specificity levels
//! decides which of them answer a particular requester, falling back
//! level by level until something matches (see
//! [`store::cascade`]).
//!
//! ## Components
//!
//! * [`rr`] holds the data model: [`Record`], its [`Type`]/[`Ttl`]/
//!   [`Rdata`] fields, and the requester's [`RequestTags`].
//! * [`store`] provides the [`RecordStore`], a fixed-size hash table
//!   keyed by case-insensitive owner name, with the per-node record
//!   ordering the matcher relies on.
//! * [`provider`] specifies the [`RowProvider`] interface through
//!   which record rows are read from the relational backing store.
//! * [`cache`] ties them together: the [`ZoneCache`] handle bulk-loads
//!   a store, refreshes it (wholesale or one owner name at a time)
//!   while queries are concurrently served, and answers lookups. The
//!   [`lookup_direct`] function is the equivalent uncached entry
//!   point, running the identical cascade over rows fetched on demand.
//!
//! ## Concurrency
//!
//! The engine itself is synchronous. Any number of threads may query a
//! [`ZoneCache`] concurrently with at most one build or refresh per
//! zone; a full reload is published with a single atomic pointer swap,
//! and a single-name update excludes readers from exactly one hash
//! bucket while the replacement node is spliced in. Superseded stores
//! are reclaimed by reference counting once the last in-flight reader
//! is done with them.

pub mod cache;
pub mod error;
pub mod name;
pub mod provider;
pub mod rr;
pub mod store;

pub use cache::{lookup_direct, ZoneCache};
pub use error::Error;
pub use name::OwnerName;
pub use provider::{ProviderError, RowProvider, ZoneRow};
pub use rr::{Answer, Rdata, Record, RequestTags, Ttl, Type};
pub use store::RecordStore;
