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

//! The resource-record data model: [`Type`], [`Ttl`], [`Rdata`],
//! [`Record`], [`RequestTags`], and [`Answer`].

use std::fmt;
use std::str::FromStr;

use arrayvec::ArrayString;

/// The maximum length (in bytes) of a record's RDATA text.
pub const MAX_RDATA_LEN: usize = 254;

/// The record tag value meaning "any": a record tagged 0 for a
/// dimension is eligible for every requester in that dimension.
pub const TAG_ANY: i16 = 0;

/// The "interconnect" ISP tag. A record carrying this ISP tag is
/// treated as matching requesters whose ISP tag is 1 or 2.
pub const ISP_INTERCONNECT: i16 = 8;

////////////////////////////////////////////////////////////////////////
// RR TYPES                                                           //
////////////////////////////////////////////////////////////////////////

/// Represents the RR type of a record.
///
/// An RR type is an unsigned 16-bit integer, so this is a wrapper
/// around `u16` with [`Debug`](fmt::Debug), [`Display`](fmt::Display),
/// and [`FromStr`] implementations for the common textual
/// representations. Constants for the types this engine handles
/// specially (e.g. [`Type::A`], [`Type::CNAME`]) are provided; any
/// other value round-trips through the RFC 3597 `TYPE12345` form.
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Type(u16);

impl Type {
    pub const A: Type = Type(1);
    pub const NS: Type = Type(2);
    pub const CNAME: Type = Type(5);
    pub const SOA: Type = Type(6);
    pub const PTR: Type = Type(12);
    pub const MX: Type = Type(15);
    pub const TXT: Type = Type(16);
    pub const AAAA: Type = Type(28);
    pub const SRV: Type = Type(33);
    pub const ANY: Type = Type(255);

    /// Returns whether this is an address type (A or AAAA).
    pub fn is_address(self) -> bool {
        self == Self::A || self == Self::AAAA
    }

    /// Returns whether, as a *query* type, this value matches records
    /// of every type. Both ANY and the unspecified type (0) do.
    pub fn matches_all(self) -> bool {
        self == Self::ANY || self.0 == 0
    }
}

impl From<u16> for Type {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<Type> for u16 {
    fn from(rr_type: Type) -> Self {
        rr_type.0
    }
}

/// A wrapper around [`str`] references whose [`PartialEq`] and [`Eq`]
/// implementations are ASCII-case-insensitive.
struct Caseless<'a>(&'a str);

impl PartialEq for Caseless<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(other.0)
    }
}

impl Eq for Caseless<'_> {}

impl FromStr for Type {
    type Err = &'static str;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match Caseless(text) {
            Caseless("A") => Ok(Self::A),
            Caseless("NS") => Ok(Self::NS),
            Caseless("CNAME") => Ok(Self::CNAME),
            Caseless("SOA") => Ok(Self::SOA),
            Caseless("PTR") => Ok(Self::PTR),
            Caseless("MX") => Ok(Self::MX),
            Caseless("TXT") => Ok(Self::TXT),
            Caseless("AAAA") => Ok(Self::AAAA),
            Caseless("SRV") => Ok(Self::SRV),
            Caseless("ANY") => Ok(Self::ANY),
            _ => {
                if text
                    .get(0..4)
                    .map_or(false, |prefix| prefix.eq_ignore_ascii_case("TYPE"))
                {
                    text[4..]
                        .parse::<u16>()
                        .map(Self::from)
                        .or(Err("type value is not a valid unsigned 16-bit integer"))
                } else {
                    Err("unknown type")
                }
            }
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::A => f.write_str("A"),
            Self::NS => f.write_str("NS"),
            Self::CNAME => f.write_str("CNAME"),
            Self::SOA => f.write_str("SOA"),
            Self::PTR => f.write_str("PTR"),
            Self::MX => f.write_str("MX"),
            Self::TXT => f.write_str("TXT"),
            Self::AAAA => f.write_str("AAAA"),
            Self::SRV => f.write_str("SRV"),
            Self::ANY => f.write_str("ANY"),
            Self(value) => write!(f, "TYPE{value}"), // RFC 3597 § 5
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TTLS                                                               //
////////////////////////////////////////////////////////////////////////

/// The time to live (TTL) of a record, in seconds.
///
/// Per [RFC 2181 § 8], TTL values are unsigned integers between 0 and
/// 2³¹ - 1, inclusive, and a value received with the most significant
/// bit set is interpreted as zero. `Ttl::from(u32)` implements that
/// interpretation, so the public API only ever holds values in range.
///
/// [RFC 2181 § 8]: https://datatracker.ietf.org/doc/html/rfc2181#section-8
#[derive(Clone, Copy, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Ttl(u32);

impl From<u32> for Ttl {
    fn from(raw: u32) -> Self {
        if raw > i32::MAX as u32 {
            Self(0)
        } else {
            Self(raw)
        }
    }
}

impl From<Ttl> for u32 {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl fmt::Debug for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

////////////////////////////////////////////////////////////////////////
// RDATA                                                              //
////////////////////////////////////////////////////////////////////////

/// The textual RDATA payload of a record, at most [`MAX_RDATA_LEN`]
/// bytes long. As with owner names, the bound is a validated invariant,
/// never a silent truncation.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Rdata {
    text: ArrayString<MAX_RDATA_LEN>,
}

impl Rdata {
    /// Creates a new `Rdata` from `text`, which must be at most
    /// [`MAX_RDATA_LEN`] bytes long.
    pub fn new(text: &str) -> Result<Self, RdataTooLongError> {
        let text = ArrayString::from(text).map_err(|_| RdataTooLongError)?;
        Ok(Self { text })
    }

    /// Returns the RDATA text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Rdata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// The error returned when RDATA text exceeds [`MAX_RDATA_LEN`] bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RdataTooLongError;

impl fmt::Display for RdataTooLongError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RDATA was longer than {MAX_RDATA_LEN} bytes")
    }
}

impl std::error::Error for RdataTooLongError {}

////////////////////////////////////////////////////////////////////////
// RECORDS AND REQUEST TAGS                                           //
////////////////////////////////////////////////////////////////////////

/// A single answer-candidate record.
///
/// In addition to the usual type/TTL/RDATA triple, a record carries the
/// network-location tags that the matching cascade filters on (ISP,
/// geographic location, and IDC; [`TAG_ANY`] in a dimension makes the
/// record eligible for every requester in that dimension) and a flag
/// recording whether its owner name is a wildcard (`*.`-prefixed)
/// name. Wildcard-owned records answer only as a last resort; see
/// [`store::cascade`](crate::store).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub rr_type: Type,
    pub ttl: Ttl,
    pub rdata: Rdata,
    pub isp: i16,
    pub location: i16,
    pub idc: i16,
    pub wildcard: bool,
}

/// The network-location tags of the requester, as supplied by the
/// caller for each query. A tag is *known* when it is greater than
/// zero; zero (or a negative value) means the dimension is unknown,
/// and the cascade will not filter on it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RequestTags {
    pub isp: i16,
    pub location: i16,
    pub idc: i16,
}

impl RequestTags {
    /// Creates a new set of requester tags.
    pub fn new(isp: i16, location: i16, idc: i16) -> Self {
        Self { isp, location, idc }
    }

    pub fn isp_known(&self) -> bool {
        self.isp > 0
    }

    pub fn location_known(&self) -> bool {
        self.location > 0
    }

    pub fn idc_known(&self) -> bool {
        self.idc > 0
    }
}

/// One record of an answer set, as returned to the host server. The
/// host text-encodes `rr_type` via its [`Display`](fmt::Display)
/// implementation when emitting the answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Answer {
    pub rr_type: Type,
    pub ttl: Ttl,
    pub rdata: Rdata,
}

impl From<&Record> for Answer {
    fn from(record: &Record) -> Self {
        Self {
            rr_type: record.rr_type,
            ttl: record.ttl,
            rdata: record.rdata.clone(),
        }
    }
}

////////////////////////////////////////////////////////////////////////
// TESTS                                                              //
////////////////////////////////////////////////////////////////////////
