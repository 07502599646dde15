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

//! The [`ZoneCache`] handle: building, refreshing, and querying the
//! record cache of one zone, plus the uncached [`lookup_direct`] entry
//! point.
//!
//! A `ZoneCache` owns the current [`RecordStore`] of its zone behind
//! an `RwLock<Arc<...>>`. Query threads clone the [`Arc`] under a
//! momentary read lock and run against that snapshot, so a full reload
//! publishes its freshly built store with a single pointer swap: no
//! reader ever observes a partially populated store, and a superseded
//! store is freed only once the last in-flight reader drops its
//! reference. Single-name refreshes instead splice one replacement
//! node into the current store (see [`RecordStore::replace_node`]),
//! leaving every other node untouched.
//!
//! Bulk loading is all-or-nothing: a malformed provider row or an
//! allocation failure discards the entire partially built store, and
//! the previously served cache (if any) remains in effect. The host is
//! expected to run at most one build or refresh at a time per zone;
//! queries may run concurrently with either.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use log::{debug, warn};

use crate::error::Error;
use crate::name::{self, OwnerName};
use crate::provider::{maybe_reconnect, RowProvider, ZoneRow};
use crate::rr::{Answer, Rdata, Record, RequestTags, Ttl, Type};
use crate::store::{cascade, Inserter, Node, RecordStore};

////////////////////////////////////////////////////////////////////////
// THE ZONE CACHE HANDLE                                              //
////////////////////////////////////////////////////////////////////////

/// The record cache of a single zone.
///
/// Constructed with [`ZoneCache::build`], kept current with
/// [`ZoneCache::refresh`], and queried with [`ZoneCache::lookup`].
/// Dropping the handle tears the cache down.
#[derive(Debug)]
pub struct ZoneCache {
    apex: OwnerName,
    wildcard: OwnerName,
    store: RwLock<Arc<RecordStore>>,
}

impl ZoneCache {
    /// Builds a new cache for `zone` by bulk-loading every active row
    /// from `provider`. On any failure no cache is produced and the
    /// provider's backing store is left untouched.
    pub fn build<P>(
        zone: &OwnerName,
        provider: &mut P,
        deadline: Option<Instant>,
    ) -> Result<Self, Error>
    where
        P: RowProvider + ?Sized,
    {
        let wildcard = OwnerName::wildcard_of(zone).map_err(|_| Error::NameTooLong)?;
        let store = load_store(zone, provider, deadline)?;
        Ok(Self {
            apex: zone.clone(),
            wildcard,
            store: RwLock::new(Arc::new(store)),
        })
    }

    /// Returns the name of the zone this cache serves.
    pub fn zone(&self) -> &OwnerName {
        &self.apex
    }

    /// Returns the cache's current store. In-flight queries against a
    /// previously returned store are unaffected by later refreshes.
    pub fn store(&self) -> Arc<RecordStore> {
        self.store.read().unwrap().clone()
    }

    /// Refreshes the cache from `provider`.
    ///
    /// With `name` absent this is a full reload: a brand-new store is
    /// built and, only on success, atomically published in place of the
    /// old one. With `name` present only that owner's node is rebuilt
    /// and swapped; every other node is untouched, which is the point
    /// of this variant for high-churn single-domain updates.
    ///
    /// On any failure the previously served cache remains fully intact
    /// and keeps answering queries.
    pub fn refresh<P>(
        &self,
        provider: &mut P,
        name: Option<&OwnerName>,
        deadline: Option<Instant>,
    ) -> Result<(), Error>
    where
        P: RowProvider + ?Sized,
    {
        match name {
            None => self.reload_all(provider, deadline),
            Some(name) => self.update_one(provider, name, deadline),
        }
    }

    fn reload_all<P>(&self, provider: &mut P, deadline: Option<Instant>) -> Result<(), Error>
    where
        P: RowProvider + ?Sized,
    {
        let store = load_store(&self.apex, provider, deadline)?;
        *self.store.write().unwrap() = Arc::new(store);
        Ok(())
    }

    fn update_one<P>(
        &self,
        provider: &mut P,
        name: &OwnerName,
        deadline: Option<Instant>,
    ) -> Result<(), Error>
    where
        P: RowProvider + ?Sized,
    {
        maybe_reconnect(provider, deadline)?;
        let rows = provider.fetch_name_rows(&self.apex, name, deadline)?;
        if rows.is_empty() {
            warn!(
                "No active rows for {name} in zone {}; cache left unchanged.",
                self.apex,
            );
            return Ok(());
        }

        let mut node = Node::new(name.clone());
        for row in &rows {
            let (_, record) = parse_row(row)?;
            node.insert(record)?;
        }

        let store = self.store.read().unwrap().clone();
        store.replace_node(node)?;
        debug!(
            "Replaced node {name} in zone {} ({} records).",
            self.apex,
            rows.len(),
        );
        Ok(())
    }

    /// Answers a query from the cache.
    ///
    /// The candidate set is the exact node for `qname` (if any)
    /// followed by the zone's wildcard node (if any); the cascade in
    /// [`cascade::select`] picks the answers. [`None`] means no answer
    /// exists, which is not an error.
    pub fn lookup(
        &self,
        qname: &OwnerName,
        qtype: Type,
        tags: RequestTags,
    ) -> Option<Vec<Answer>> {
        let store = self.store.read().unwrap().clone();
        let wildcard = (*qname != self.wildcard).then_some(&self.wildcard);
        store.query(qname, wildcard, qtype, tags)
    }
}

////////////////////////////////////////////////////////////////////////
// BULK LOADING AND ROW PARSING                                       //
////////////////////////////////////////////////////////////////////////

/// Builds a fresh store from every active row of `zone`. Any malformed
/// row or allocation failure discards the partial store.
fn load_store<P>(
    zone: &OwnerName,
    provider: &mut P,
    deadline: Option<Instant>,
) -> Result<RecordStore, Error>
where
    P: RowProvider + ?Sized,
{
    maybe_reconnect(provider, deadline)?;
    let rows = provider.fetch_zone_rows(zone, deadline)?;

    let mut store = RecordStore::new();
    let mut inserter = Inserter::new(&mut store);
    for row in &rows {
        let (owner, record) = parse_row(row)?;
        inserter.insert(&owner, record)?;
    }
    drop(inserter);

    debug!(
        "Loaded zone {zone}: {} nodes, {} records.",
        store.node_count(),
        store.record_count(),
    );
    Ok(store)
}

/// Parses one raw provider row into its owner name and record. The
/// numeric fields must parse as integers; anything else is malformed
/// and fatal for the enclosing operation.
fn parse_row(row: &ZoneRow) -> Result<(OwnerName, Record), Error> {
    let owner = OwnerName::new(&row.name).map_err(|e| match e {
        name::Error::TooLong => Error::NameTooLong,
        name::Error::Empty => Error::Malformed {
            field: "name",
            value: row.name.clone(),
        },
    })?;
    let ttl = parse_field::<u32>("ttl", &row.ttl)?;
    let rdtype = parse_field::<u16>("rdtype_id", &row.rdtype_id)?;
    let isp = parse_field::<i16>("isp_id", &row.isp_id)?;
    let location = parse_field::<i16>("location_id", &row.location_id)?;
    let idc = parse_field::<i16>("idc_id", &row.idc_id)?;
    let rdata = Rdata::new(&row.rdata).map_err(|_| Error::RdataTooLong)?;

    let record = Record {
        rr_type: Type::from(rdtype),
        ttl: Ttl::from(ttl),
        rdata,
        isp,
        location,
        idc,
        wildcard: owner.is_wildcard(),
    };
    Ok((owner, record))
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, Error> {
    value.trim().parse().map_err(|_| Error::Malformed {
        field,
        value: value.to_owned(),
    })
}

////////////////////////////////////////////////////////////////////////
// THE UNCACHED DIRECT PATH                                           //
////////////////////////////////////////////////////////////////////////

/// Answers a query directly from the provider, without a cache.
///
/// This runs the identical matching cascade over the candidate rows
/// fetched on demand for (`qname`, `*.zone`). Two short-circuits avoid
/// needless work, with no change to matcher semantics: a single
/// returned row is answered unconditionally, and of exactly two rows
/// where exactly one has a wildcard owner, the non-wildcard row wins
/// outright.
pub fn lookup_direct<P>(
    zone: &OwnerName,
    qname: &OwnerName,
    qtype: Type,
    tags: RequestTags,
    provider: &mut P,
    deadline: Option<Instant>,
) -> Result<Option<Vec<Answer>>, Error>
where
    P: RowProvider + ?Sized,
{
    maybe_reconnect(provider, deadline)?;
    let rows = provider.fetch_candidates(zone, qname, qtype, deadline)?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let (_, record) = parse_row(row)?;
        records.push(record);
    }

    if records.len() == 1 {
        return Ok(Some(vec![Answer::from(&records[0])]));
    }
    if records.len() == 2 && records.iter().filter(|r| r.wildcard).count() == 1 {
        if let Some(plain) = records.iter().find(|r| !r.wildcard) {
            return Ok(Some(vec![Answer::from(plain)]));
        }
    }

    let candidates: Vec<&Record> = records.iter().collect();
    let answers = cascade::select(&candidates, qtype, tags);
    Ok((!answers.is_empty()).then_some(answers))
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
