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

//! The in-memory zone record store.
//!
//! A [`RecordStore`] holds every active record of one zone, indexed by
//! owner name in a fixed-size hash table. One [`Node`] exists per
//! distinct owner name; each node owns its records as an ordered
//! sequence (see [`Node::insert`] for the ordering invariant). The
//! bucket count never changes: worst-case chain length is bounded only
//! by zone size, a deliberate simplicity/latency trade-off rather than
//! an oversight.
//!
//! Many query threads may read a store concurrently while (at most) one
//! writer per zone refreshes it. Each bucket's chain sits behind its
//! own [`RwLock`], so a single-node replacement excludes readers from
//! exactly one bucket for the duration of the splice, and a reader
//! observes either the fully-old or the fully-new node, never an
//! intermediate state. Whole-store replacement is handled one level up
//! (see [`ZoneCache`](crate::cache::ZoneCache)) by atomically swapping
//! an [`Arc`](std::sync::Arc) to a freshly built store.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::error::Error;
use crate::name::OwnerName;
use crate::rr::{Answer, Record, RequestTags, Type};

pub mod cascade;

/// The number of hash buckets in a [`RecordStore`]. Fixed for the life
/// of the store; there is no resizing.
pub const BUCKET_COUNT: usize = 64;

////////////////////////////////////////////////////////////////////////
// NODES                                                              //
////////////////////////////////////////////////////////////////////////

/// All of the records sharing one owner name, held in matcher order.
#[derive(Clone, Debug)]
pub struct Node {
    name: OwnerName,
    records: Vec<Record>,
}

impl Node {
    /// Creates a new `Node` for `name` with an empty record sequence.
    pub fn new(name: OwnerName) -> Self {
        Self {
            name,
            records: Vec::new(),
        }
    }

    /// Inserts `record` into the node's sequence, maintaining the
    /// ordering invariant: A records occupy the front of the sequence,
    /// a CNAME sits immediately after the run of A records (so it is
    /// never preceded by a non-A type), and every other type appends at
    /// the tail. The matcher depends on this order to decide in one
    /// pass whether an address answer has already been emitted.
    pub fn insert(&mut self, record: Record) -> Result<(), Error> {
        let index = match record.rr_type {
            Type::A | Type::CNAME => self
                .records
                .iter()
                .position(|r| r.rr_type != Type::A)
                .unwrap_or(self.records.len()),
            _ => self.records.len(),
        };
        self.records.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        self.records.insert(index, record);
        Ok(())
    }

    /// Returns the node's owner name.
    pub fn name(&self) -> &OwnerName {
        &self.name
    }

    /// Returns the node's record sequence, in matcher order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

////////////////////////////////////////////////////////////////////////
// THE RECORD STORE                                                   //
////////////////////////////////////////////////////////////////////////

/// The hash-indexed record cache for a single zone.
///
/// Owner names are the keys, compared and hashed without regard to
/// ASCII case. A given owner name appears in at most one [`Node`]
/// store-wide. The store exclusively owns every node reachable through
/// it, and each node exclusively owns its records; dropping the store
/// frees everything.
#[derive(Debug)]
pub struct RecordStore {
    buckets: Vec<RwLock<Vec<Node>>>,
    node_count: AtomicUsize,
    record_count: AtomicUsize,
}

impl RecordStore {
    /// Creates a new, empty `RecordStore`.
    pub fn new() -> Self {
        Self {
            buckets: (0..BUCKET_COUNT).map(|_| RwLock::new(Vec::new())).collect(),
            node_count: AtomicUsize::new(0),
            record_count: AtomicUsize::new(0),
        }
    }

    fn bucket_index(name: &OwnerName) -> usize {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        (hasher.finish() % BUCKET_COUNT as u64) as usize
    }

    /// Inserts a record for `owner`, finding or creating its node.
    ///
    /// A new node is appended at its bucket chain's tail; a record
    /// joining an existing node is placed per the ordering invariant
    /// (see [`Node::insert`]). On allocation failure the store is left
    /// as it was before the call.
    pub fn insert(&mut self, owner: &OwnerName, record: Record) -> Result<(), Error> {
        Inserter::new(self).insert(owner, record)
    }

    /// Atomically swaps the node for `node.name()` for `node` within
    /// its bucket chain, preserving the relative order of the chain's
    /// other nodes, and drops the superseded node with its records. If
    /// no node matches, `node` is appended at the chain tail. Readers
    /// of other buckets are unaffected.
    pub fn replace_node(&self, node: Node) -> Result<(), Error> {
        let added = node.records.len();
        let bucket = Self::bucket_index(&node.name);
        let mut chain = self.buckets[bucket].write().unwrap();
        if let Some(existing) = chain.iter_mut().find(|n| n.name == node.name) {
            let old = std::mem::replace(existing, node);
            self.record_count.fetch_sub(old.records.len(), Ordering::Relaxed);
            self.record_count.fetch_add(added, Ordering::Relaxed);
        } else {
            chain.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
            chain.push(node);
            self.node_count.fetch_add(1, Ordering::Relaxed);
            self.record_count.fetch_add(added, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Runs the matching cascade over the candidate set for `qname`:
    /// the records of its exact node (if any) followed by those of the
    /// zone's wildcard node (if supplied and present). Returns [`None`]
    /// when neither node exists or the cascade emits nothing.
    ///
    /// Exact-match lookup is all this method performs per name: the
    /// caller decides whether to supply the `*.zone` fallback name (the
    /// store performs no implicit wildcard expansion).
    pub fn query(
        &self,
        qname: &OwnerName,
        wildcard: Option<&OwnerName>,
        qtype: Type,
        tags: RequestTags,
    ) -> Option<Vec<Answer>> {
        let qname_bucket = Self::bucket_index(qname);
        match wildcard {
            None => {
                let chain = self.buckets[qname_bucket].read().unwrap();
                match_nodes(find_node(&chain, qname), None, qtype, tags)
            }
            Some(wildcard) => {
                let wildcard_bucket = Self::bucket_index(wildcard);
                if wildcard_bucket == qname_bucket {
                    let chain = self.buckets[qname_bucket].read().unwrap();
                    match_nodes(
                        find_node(&chain, qname),
                        find_node(&chain, wildcard),
                        qtype,
                        tags,
                    )
                } else {
                    let qname_chain = self.buckets[qname_bucket].read().unwrap();
                    let wildcard_chain = self.buckets[wildcard_bucket].read().unwrap();
                    match_nodes(
                        find_node(&qname_chain, qname),
                        find_node(&wildcard_chain, wildcard),
                        qtype,
                        tags,
                    )
                }
            }
        }
    }

    /// Returns a copy of the record sequence of the node for `name`,
    /// or [`None`] if no such node exists.
    pub fn node_records(&self, name: &OwnerName) -> Option<Vec<Record>> {
        let chain = self.buckets[Self::bucket_index(name)].read().unwrap();
        find_node(&chain, name).map(|node| node.records.to_vec())
    }

    /// Calls `f` once for every (owner name, record) pair in the store,
    /// bucket by bucket.
    pub fn for_each_record<F>(&self, mut f: F)
    where
        F: FnMut(&OwnerName, &Record),
    {
        for bucket in &self.buckets {
            let chain = bucket.read().unwrap();
            for node in chain.iter() {
                for record in &node.records {
                    f(&node.name, record);
                }
            }
        }
    }

    /// Returns the total number of nodes in the store.
    pub fn node_count(&self) -> usize {
        self.node_count.load(Ordering::Relaxed)
    }

    /// Returns the total number of records in the store.
    pub fn record_count(&self) -> usize {
        self.record_count.load(Ordering::Relaxed)
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn find_node<'a>(chain: &'a [Node], name: &OwnerName) -> Option<&'a Node> {
    chain.iter().find(|node| node.name == *name)
}

fn match_nodes(
    exact: Option<&Node>,
    wildcard: Option<&Node>,
    qtype: Type,
    tags: RequestTags,
) -> Option<Vec<Answer>> {
    if exact.is_none() && wildcard.is_none() {
        return None;
    }
    let candidates: Vec<&Record> = exact
        .into_iter()
        .chain(wildcard)
        .flat_map(|node| node.records.iter())
        .collect();
    let answers = cascade::select(&candidates, qtype, tags);
    (!answers.is_empty()).then_some(answers)
}

////////////////////////////////////////////////////////////////////////
// BULK INSERTION                                                     //
////////////////////////////////////////////////////////////////////////

/// Repeated-insertion helper that remembers the node it last touched.
///
/// Bulk loads receive their rows sorted by owner name, so consecutive
/// inserts usually target the same node; the remembered cursor turns
/// those into amortized constant-time appends. When the cursor misses,
/// insertion falls back to a full bucket-chain scan, so correctness
/// does not depend on the input order.
pub struct Inserter<'a> {
    store: &'a mut RecordStore,
    cursor: Option<(usize, usize)>,
}

impl<'a> Inserter<'a> {
    /// Creates a new `Inserter` for `store`.
    pub fn new(store: &'a mut RecordStore) -> Self {
        Self {
            store,
            cursor: None,
        }
    }

    /// Inserts a record for `owner`, as [`RecordStore::insert`] does.
    pub fn insert(&mut self, owner: &OwnerName, record: Record) -> Result<(), Error> {
        if let Some((bucket, position)) = self.cursor {
            let chain = self.store.buckets[bucket].get_mut().unwrap();
            if chain[position].name == *owner {
                chain[position].insert(record)?;
                *self.store.record_count.get_mut() += 1;
                return Ok(());
            }
        }

        let bucket = RecordStore::bucket_index(owner);
        let chain = self.store.buckets[bucket].get_mut().unwrap();
        if let Some(position) = chain.iter().position(|node| node.name == *owner) {
            chain[position].insert(record)?;
            self.cursor = Some((bucket, position));
        } else {
            chain.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
            let mut node = Node::new(owner.clone());
            node.insert(record)?;
            chain.push(node);
            self.cursor = Some((bucket, chain.len() - 1));
            *self.store.node_count.get_mut() += 1;
        }
        *self.store.record_count.get_mut() += 1;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Rdata, Ttl};

    fn record(rr_type: Type, rdata: &str) -> Record {
        tagged_record(rr_type, rdata, 0, 0, 0)
    }

    fn tagged_record(rr_type: Type, rdata: &str, isp: i16, location: i16, idc: i16) -> Record {
        Record {
            rr_type,
            ttl: Ttl::from(300),
            rdata: Rdata::new(rdata).unwrap(),
            isp,
            location,
            idc,
            wildcard: false,
        }
    }

    fn wildcard_record(rr_type: Type, rdata: &str) -> Record {
        Record {
            wildcard: true,
            ..record(rr_type, rdata)
        }
    }

    fn name(text: &str) -> OwnerName {
        text.parse().unwrap()
    }

    #[test]
    fn node_maintains_record_order() {
        let mut node = Node::new(name("www.example.com"));
        node.insert(record(Type::SOA, "soa")).unwrap();
        node.insert(record(Type::A, "1.1.1.1")).unwrap();
        node.insert(record(Type::A, "2.2.2.2")).unwrap();
        node.insert(record(Type::CNAME, "alias.example.com")).unwrap();
        node.insert(record(Type::NS, "ns.example.com")).unwrap();
        node.insert(record(Type::TXT, "hello")).unwrap();

        let types: Vec<Type> = node.records().iter().map(|r| r.rr_type).collect();
        assert_eq!(
            types,
            [Type::A, Type::A, Type::CNAME, Type::SOA, Type::NS, Type::TXT],
        );
        // A records keep their insertion order at the front.
        assert_eq!(node.records()[0].rdata.as_str(), "1.1.1.1");
        assert_eq!(node.records()[1].rdata.as_str(), "2.2.2.2");

        // The invariant proper: no CNAME is ever preceded by a non-A
        // record.
        for (index, r) in node.records().iter().enumerate() {
            if r.rr_type == Type::CNAME {
                assert!(node.records()[..index]
                    .iter()
                    .all(|prior| prior.rr_type == Type::A));
            }
        }
    }

    #[test]
    fn insert_and_lookup_are_case_insensitive() {
        let mut store = RecordStore::new();
        store
            .insert(&name("WWW.Example.COM"), record(Type::A, "1.1.1.1"))
            .unwrap();
        store
            .insert(&name("www.example.com"), record(Type::A, "2.2.2.2"))
            .unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.record_count(), 2);
        let records = store.node_records(&name("www.EXAMPLE.com")).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn insertion_order_does_not_change_node_contents() {
        let rows = [
            ("a.example.com", record(Type::A, "1.1.1.1")),
            ("a.example.com", record(Type::CNAME, "c.example.com")),
            ("b.example.com", record(Type::A, "2.2.2.2")),
            ("b.example.com", record(Type::TXT, "text")),
            ("c.example.com", record(Type::SOA, "soa")),
        ];

        let mut sorted = RecordStore::new();
        let mut inserter = Inserter::new(&mut sorted);
        for (owner, r) in &rows {
            inserter.insert(&name(owner), r.clone()).unwrap();
        }
        drop(inserter);

        let mut shuffled = RecordStore::new();
        for index in [4, 1, 3, 0, 2] {
            let (owner, r) = &rows[index];
            shuffled.insert(&name(owner), r.clone()).unwrap();
        }

        for owner in ["a.example.com", "b.example.com", "c.example.com"] {
            assert_eq!(
                sorted.node_records(&name(owner)),
                shuffled.node_records(&name(owner)),
            );
        }
        assert_eq!(sorted.node_count(), shuffled.node_count());
        assert_eq!(sorted.record_count(), shuffled.record_count());
    }

    #[test]
    fn replace_node_swaps_only_the_target() {
        let mut store = RecordStore::new();
        store
            .insert(&name("a.example.com"), record(Type::A, "1.1.1.1"))
            .unwrap();
        store
            .insert(&name("b.example.com"), record(Type::A, "2.2.2.2"))
            .unwrap();

        let mut replacement = Node::new(name("b.example.com"));
        replacement.insert(record(Type::A, "3.3.3.3")).unwrap();
        replacement.insert(record(Type::A, "4.4.4.4")).unwrap();
        store.replace_node(replacement).unwrap();

        let a = store.node_records(&name("a.example.com")).unwrap();
        assert_eq!(a[0].rdata.as_str(), "1.1.1.1");
        let b = store.node_records(&name("b.example.com")).unwrap();
        assert_eq!(b.len(), 2);
        assert_eq!(b[0].rdata.as_str(), "3.3.3.3");
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.record_count(), 3);
    }

    #[test]
    fn replace_node_appends_when_absent() {
        let store = RecordStore::new();
        let mut node = Node::new(name("new.example.com"));
        node.insert(record(Type::A, "5.5.5.5")).unwrap();
        store.replace_node(node).unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.record_count(), 1);
        assert!(store.node_records(&name("new.example.com")).is_some());
    }

    #[test]
    fn query_prefers_exact_node_over_wildcard() {
        let mut store = RecordStore::new();
        store
            .insert(&name("www.example.com"), record(Type::A, "1.1.1.1"))
            .unwrap();
        store
            .insert(&name("*.example.com"), wildcard_record(Type::A, "9.9.9.9"))
            .unwrap();

        let wildcard = name("*.example.com");
        let answers = store
            .query(
                &name("www.example.com"),
                Some(&wildcard),
                Type::A,
                RequestTags::default(),
            )
            .unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].rdata.as_str(), "1.1.1.1");
    }

    #[test]
    fn query_falls_back_to_wildcard_node() {
        let mut store = RecordStore::new();
        store
            .insert(&name("*.example.com"), wildcard_record(Type::A, "9.9.9.9"))
            .unwrap();

        let wildcard = name("*.example.com");
        let answers = store
            .query(
                &name("foo.example.com"),
                Some(&wildcard),
                Type::A,
                RequestTags::default(),
            )
            .unwrap();
        assert_eq!(answers[0].rdata.as_str(), "9.9.9.9");
    }

    #[test]
    fn query_returns_none_when_nothing_matches() {
        let mut store = RecordStore::new();
        store
            .insert(&name("www.example.com"), record(Type::A, "1.1.1.1"))
            .unwrap();
        assert!(store
            .query(
                &name("absent.example.com"),
                None,
                Type::A,
                RequestTags::default(),
            )
            .is_none());
        assert!(store
            .query(
                &name("www.example.com"),
                None,
                Type::MX,
                RequestTags::default(),
            )
            .is_none());
    }

    #[test]
    fn for_each_record_visits_everything() {
        let mut store = RecordStore::new();
        store
            .insert(&name("a.example.com"), record(Type::A, "1.1.1.1"))
            .unwrap();
        store
            .insert(&name("b.example.com"), record(Type::TXT, "text"))
            .unwrap();

        let mut seen = Vec::new();
        store.for_each_record(|owner, r| seen.push((owner.to_string(), r.rr_type)));
        seen.sort();
        assert_eq!(
            seen,
            [
                ("a.example.com".to_owned(), Type::A),
                ("b.example.com".to_owned(), Type::TXT),
            ],
        );
    }
}
