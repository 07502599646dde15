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

//! The specificity-cascade matcher.
//!
//! Given a candidate record set and the requester's network-location
//! tags, [`select`] picks the answer set. Candidates are filtered
//! through a cascade of [`Rule`]s, from the most specific level the
//! requester's tags support down to the unfiltered level, with
//! wildcard-owner records held back as the final fallback. The first
//! level that emits at least one record wins outright; levels are
//! never merged, and a less specific level is consulted only when the
//! current one matched nothing.
//!
//! The matcher is a pure function over its inputs: it never blocks,
//! never fails, and for a fixed candidate set and request always
//! produces the same answers. An empty result simply means "no
//! answer."

use log::{debug, trace};

use crate::rr::{Answer, Record, RequestTags, Type, ISP_INTERCONNECT, TAG_ANY};

////////////////////////////////////////////////////////////////////////
// RULES                                                              //
////////////////////////////////////////////////////////////////////////

/// One specificity level of the matching cascade.
///
/// The levels rank how tightly a candidate record's tags must match
/// the requester's, from IDC-exact (the most specific) down to no
/// filtering at all. [`Rule::WildcardOwner`] stands apart: records of
/// wildcard (`*.`-prefixed) owners are eligible exclusively there, with
/// no tag filtering, making them the last resort once every tagged
/// level has come up empty.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    IdcExact,
    IspAndLocation,
    IspOnly,
    LocationOnly,
    Unfiltered,
    WildcardOwner,
}

/// The full cascade, most specific level first.
const CASCADE: [Rule; 6] = [
    Rule::IdcExact,
    Rule::IspAndLocation,
    Rule::IspOnly,
    Rule::LocationOnly,
    Rule::Unfiltered,
    Rule::WildcardOwner,
];

impl Rule {
    /// The numeric level of this rule, as reported in log output.
    fn level(self) -> i8 {
        match self {
            Self::IdcExact => 4,
            Self::IspAndLocation => 3,
            Self::IspOnly => 2,
            Self::LocationOnly => 1,
            Self::Unfiltered => 0,
            Self::WildcardOwner => -1,
        }
    }

    /// Returns whether `record` is eligible under this rule for a
    /// requester tagged with `tags`.
    fn admits(self, record: &Record, tags: RequestTags) -> bool {
        if record.wildcard {
            return self == Self::WildcardOwner;
        }
        match self {
            Self::IdcExact => record.idc == tags.idc || record.idc == TAG_ANY,
            Self::IspAndLocation => {
                isp_matches(record.isp, tags.isp) && location_matches(record.location, tags.location)
            }
            Self::IspOnly => isp_matches(record.isp, tags.isp),
            Self::LocationOnly => location_matches(record.location, tags.location),
            Self::Unfiltered => true,
            Self::WildcardOwner => false,
        }
    }
}

fn isp_matches(record_isp: i16, requester_isp: i16) -> bool {
    record_isp == requester_isp
        || record_isp == TAG_ANY
        || (record_isp == ISP_INTERCONNECT && matches!(requester_isp, 1 | 2))
}

fn location_matches(record_location: i16, requester_location: i16) -> bool {
    record_location == requester_location || record_location == TAG_ANY
}

/// The index into [`CASCADE`] of the starting level for a requester
/// tagged with `tags`. A known IDC starts at the IDC-exact level;
/// otherwise the known subset of ISP and location picks the level.
fn start_index(tags: RequestTags) -> usize {
    if tags.idc_known() {
        0
    } else if tags.isp_known() && tags.location_known() {
        1
    } else if tags.isp_known() {
        2
    } else if tags.location_known() {
        3
    } else {
        4
    }
}

////////////////////////////////////////////////////////////////////////
// TYPE COMPATIBILITY                                                 //
////////////////////////////////////////////////////////////////////////

/// Returns whether `record` can answer a query of type `qtype`.
///
/// ANY and the unspecified type match everything. An address query (A
/// or AAAA) matches same-type records and CNAMEs, and additionally NS
/// records when `address_present` is false; NS is an alias substitute
/// of last resort, never shown alongside a real address record. Every
/// other query type requires an exact match.
fn type_compatible(record: &Record, qtype: Type, address_present: bool) -> bool {
    if qtype.matches_all() {
        true
    } else if qtype.is_address() {
        record.rr_type == qtype
            || record.rr_type == Type::CNAME
            || (!address_present && record.rr_type == Type::NS)
    } else {
        record.rr_type == qtype
    }
}

////////////////////////////////////////////////////////////////////////
// SELECTION                                                          //
////////////////////////////////////////////////////////////////////////

/// Selects the answer set for a query of type `qtype` from a requester
/// tagged with `tags`, over the candidate `records`. An empty result
/// means no answer exists at any level.
pub fn select(records: &[&Record], qtype: Type, tags: RequestTags) -> Vec<Answer> {
    let address_present = qtype.is_address()
        && records
            .iter()
            .any(|r| r.rr_type == qtype || r.rr_type == Type::CNAME);

    let start = start_index(tags);
    for rule in &CASCADE[start..] {
        trace!(
            "Trying rule {} for qtype {} (isp {}, location {}, idc {}).",
            rule.level(),
            qtype,
            tags.isp,
            tags.location,
            tags.idc,
        );
        let answers = scan_level(*rule, records, qtype, tags, address_present);
        if !answers.is_empty() {
            if *rule != CASCADE[start] && qtype.is_address() {
                debug!(
                    "Rule {} answered an address query after fallback \
                     (isp {}, location {}, idc {}).",
                    rule.level(),
                    tags.isp,
                    tags.location,
                    tags.idc,
                );
            }
            return answers;
        }
    }
    Vec::new()
}

/// Scans `records` in sequence order at a single cascade level,
/// emitting every eligible, type-compatible record subject to the
/// singular-answer constraint: at most one SOA, and at most one alias
/// (CNAME or NS) record. Emitting an address record also closes the
/// alias class, so no CNAME or NS ever trails an address answer.
fn scan_level(
    rule: Rule,
    records: &[&Record],
    qtype: Type,
    tags: RequestTags,
    address_present: bool,
) -> Vec<Answer> {
    let mut answers = Vec::new();
    let mut soa_emitted = false;
    let mut alias_emitted = false;
    for record in records {
        if !rule.admits(record, tags) || !type_compatible(record, qtype, address_present) {
            continue;
        }
        if (soa_emitted && record.rr_type == Type::SOA)
            || (alias_emitted && matches!(record.rr_type, Type::CNAME | Type::NS))
        {
            continue;
        }
        trace!(
            "Rule {} emits {} {} (isp {}, location {}, idc {}).",
            rule.level(),
            record.rr_type,
            record.rdata,
            record.isp,
            record.location,
            record.idc,
        );
        answers.push(Answer::from(*record));
        match record.rr_type {
            Type::SOA => soa_emitted = true,
            Type::A | Type::AAAA | Type::CNAME | Type::NS => alias_emitted = true,
            _ => {}
        }
    }
    answers
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rr::{Rdata, Ttl};

    fn record(rr_type: Type, rdata: &str, isp: i16, location: i16, idc: i16) -> Record {
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

    fn wildcard(rr_type: Type, rdata: &str) -> Record {
        Record {
            wildcard: true,
            ..record(rr_type, rdata, 0, 0, 0)
        }
    }

    fn rdatas(answers: &[Answer]) -> Vec<&str> {
        answers.iter().map(|a| a.rdata.as_str()).collect()
    }

    fn refs(records: &[Record]) -> Vec<&Record> {
        records.iter().collect()
    }

    #[test]
    fn start_level_follows_known_tags() {
        assert_eq!(start_index(RequestTags::new(0, 0, 7)), 0);
        assert_eq!(start_index(RequestTags::new(3, 5, 7)), 0);
        assert_eq!(start_index(RequestTags::new(3, 5, 0)), 1);
        assert_eq!(start_index(RequestTags::new(3, 0, 0)), 2);
        assert_eq!(start_index(RequestTags::new(0, 5, 0)), 3);
        assert_eq!(start_index(RequestTags::new(0, 0, 0)), 4);
    }

    #[test]
    fn isp_specific_record_wins_at_its_level() {
        let records = [
            record(Type::A, "1.1.1.1", 1, 0, 0),
            record(Type::A, "2.2.2.2", 2, 0, 0),
        ];
        let answers = select(&refs(&records), Type::A, RequestTags::new(1, 0, 0));
        assert_eq!(rdatas(&answers), ["1.1.1.1"]);
    }

    #[test]
    fn unmatched_isp_falls_back_to_both_records() {
        let records = [
            record(Type::A, "1.1.1.1", 1, 0, 0),
            record(Type::A, "2.2.2.2", 2, 0, 0),
        ];
        let answers = select(&refs(&records), Type::A, RequestTags::new(9, 0, 0));
        assert_eq!(rdatas(&answers), ["1.1.1.1", "2.2.2.2"]);
    }

    #[test]
    fn interconnect_isp_matches_requesters_one_and_two() {
        let records = [
            record(Type::A, "1.1.1.1", ISP_INTERCONNECT, 0, 0),
            record(Type::A, "2.2.2.2", 3, 0, 0),
        ];
        for isp in [1, 2] {
            let answers = select(&refs(&records), Type::A, RequestTags::new(isp, 0, 0));
            assert_eq!(rdatas(&answers), ["1.1.1.1"]);
        }
        // Requester ISP 3 matches the ISP-3 record instead; the
        // interconnect exception does not apply.
        let answers = select(&refs(&records), Type::A, RequestTags::new(3, 0, 0));
        assert_eq!(rdatas(&answers), ["2.2.2.2"]);
    }

    #[test]
    fn idc_level_ignores_other_tags() {
        let records = [
            record(Type::A, "1.1.1.1", 1, 1, 7),
            record(Type::A, "2.2.2.2", 2, 2, 0),
        ];
        // Both records are eligible at the IDC level: the first by IDC
        // match, the second by the "any" IDC tag.
        let answers = select(&refs(&records), Type::A, RequestTags::new(9, 9, 7));
        assert_eq!(rdatas(&answers), ["1.1.1.1", "2.2.2.2"]);
    }

    #[test]
    fn levels_are_never_merged() {
        let records = [
            record(Type::A, "1.1.1.1", 1, 5, 0),
            record(Type::A, "2.2.2.2", 1, 0, 0),
            record(Type::A, "3.3.3.3", 9, 9, 0),
        ];
        // ISP and location both known: the ISP+location level admits
        // the first two records and the cascade stops there.
        let answers = select(&refs(&records), Type::A, RequestTags::new(1, 5, 0));
        assert_eq!(rdatas(&answers), ["1.1.1.1", "2.2.2.2"]);
    }

    #[test]
    fn soa_is_emitted_at_most_once() {
        // Sequence order as a node stores it: A records first, others
        // at the tail.
        let records = [
            record(Type::A, "1.1.1.1", 0, 0, 0),
            record(Type::A, "1.1.1.2", 0, 0, 0),
            record(Type::SOA, "ns1. hostmaster. 1", 0, 0, 0),
            record(Type::SOA, "ns1. hostmaster. 2", 0, 0, 0),
        ];
        let answers = select(&refs(&records), Type::ANY, RequestTags::default());
        assert_eq!(rdatas(&answers), ["1.1.1.1", "1.1.1.2", "ns1. hostmaster. 1"]);
    }

    #[test]
    fn no_alias_trails_an_address_answer() {
        let records = [
            record(Type::A, "1.1.1.1", 0, 0, 0),
            record(Type::CNAME, "alias.example.com", 0, 0, 0),
        ];
        let answers = select(&refs(&records), Type::A, RequestTags::default());
        assert_eq!(rdatas(&answers), ["1.1.1.1"]);
    }

    #[test]
    fn at_most_one_alias_record_is_emitted() {
        let records = [
            record(Type::CNAME, "first.example.com", 0, 0, 0),
            record(Type::CNAME, "second.example.com", 0, 0, 0),
        ];
        let answers = select(&refs(&records), Type::A, RequestTags::default());
        assert_eq!(rdatas(&answers), ["first.example.com"]);
    }

    #[test]
    fn ns_substitutes_only_without_address_records() {
        let lone_ns = [record(Type::NS, "ns.example.com", 0, 0, 0)];
        let answers = select(&refs(&lone_ns), Type::A, RequestTags::default());
        assert_eq!(rdatas(&answers), ["ns.example.com"]);

        let with_address = [
            record(Type::A, "1.1.1.1", 0, 0, 0),
            record(Type::NS, "ns.example.com", 0, 0, 0),
        ];
        let answers = select(&refs(&with_address), Type::A, RequestTags::default());
        assert_eq!(rdatas(&answers), ["1.1.1.1"]);

        // A CNAME also counts as an address-class record for the
        // substitution check.
        let with_cname = [
            record(Type::CNAME, "alias.example.com", 0, 0, 0),
            record(Type::NS, "ns.example.com", 0, 0, 0),
        ];
        let answers = select(&refs(&with_cname), Type::A, RequestTags::default());
        assert_eq!(rdatas(&answers), ["alias.example.com"]);
    }

    #[test]
    fn exact_type_queries_require_exact_matches() {
        let records = [
            record(Type::A, "1.1.1.1", 0, 0, 0),
            record(Type::MX, "10 mail.example.com", 0, 0, 0),
        ];
        let answers = select(&refs(&records), Type::MX, RequestTags::default());
        assert_eq!(rdatas(&answers), ["10 mail.example.com"]);
        assert!(select(&refs(&records), Type::TXT, RequestTags::default()).is_empty());
    }

    #[test]
    fn wildcard_records_answer_only_as_a_last_resort() {
        let records = [
            record(Type::A, "1.1.1.1", 1, 0, 0),
            wildcard(Type::A, "9.9.9.9"),
        ];
        // The exact record matches at a tagged level before the
        // wildcard level is ever consulted.
        let answers = select(&refs(&records), Type::A, RequestTags::new(2, 0, 0));
        assert_eq!(rdatas(&answers), ["1.1.1.1"]);

        // With only wildcard records, every tagged level comes up
        // empty and the wildcard level answers without tag filtering.
        let only_wildcard = [wildcard(Type::A, "9.9.9.9")];
        let answers = select(&refs(&only_wildcard), Type::A, RequestTags::new(2, 3, 4));
        assert_eq!(rdatas(&answers), ["9.9.9.9"]);
    }

    #[test]
    fn selection_is_deterministic() {
        let records = [
            record(Type::A, "1.1.1.1", 1, 2, 0),
            record(Type::A, "2.2.2.2", 0, 0, 0),
            wildcard(Type::A, "9.9.9.9"),
        ];
        let tags = RequestTags::new(1, 2, 0);
        let first = select(&refs(&records), Type::A, tags);
        let second = select(&refs(&records), Type::A, tags);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_candidates_yield_no_answers() {
        assert!(select(&[], Type::A, RequestTags::default()).is_empty());
    }
}
