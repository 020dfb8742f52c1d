//! Well-known property URIs and the attribute mask used by the property
//! registry.
use bitflags::bitflags;
use chrono::{DateTime, Utc};

pub const TITLE: &str = "ivo://ivoa.net/vospace/core#title";
pub const CREATOR: &str = "ivo://ivoa.net/vospace/core#creator";
pub const SUBJECT: &str = "ivo://ivoa.net/vospace/core#subject";
pub const DESCRIPTION: &str = "ivo://ivoa.net/vospace/core#description";
pub const PUBLISHER: &str = "ivo://ivoa.net/vospace/core#publisher";
pub const CONTRIBUTOR: &str = "ivo://ivoa.net/vospace/core#contributor";
pub const DATE: &str = "ivo://ivoa.net/vospace/core#date";
pub const TYPE: &str = "ivo://ivoa.net/vospace/core#type";
pub const FORMAT: &str = "ivo://ivoa.net/vospace/core#format";
pub const IDENTIFIER: &str = "ivo://ivoa.net/vospace/core#identifier";
pub const SOURCE: &str = "ivo://ivoa.net/vospace/core#source";
pub const LANGUAGE: &str = "ivo://ivoa.net/vospace/core#language";
pub const RELATION: &str = "ivo://ivoa.net/vospace/core#relation";
pub const COVERAGE: &str = "ivo://ivoa.net/vospace/core#coverage";
pub const RIGHTS: &str = "ivo://ivoa.net/vospace/core#rights";
pub const AVAILABLE_SPACE: &str = "ivo://ivoa.net/vospace/core#availableSpace";
pub const LENGTH: &str = "ivo://ivoa.net/vospace/core#length";
pub const MD5: &str = "ivo://ivoa.net/vospace/core#MD5";
pub const GROUPREAD: &str = "ivo://ivoa.net/vospace/core#groupread";
pub const GROUPWRITE: &str = "ivo://ivoa.net/vospace/core#groupwrite";
pub const PUBLICREAD: &str = "ivo://ivoa.net/vospace/core#publicread";
/// Legacy alias of [PUBLICREAD].
pub const ISPUBLIC: &str = "ivo://ivoa.net/vospace/core#ispublic";
/// Creation time.
pub const BTIME: &str = "ivo://ivoa.net/vospace/core#btime";
/// Metadata change time.
pub const CTIME: &str = "ivo://ivoa.net/vospace/core#ctime";
/// Data modification time.
pub const MTIME: &str = "ivo://ivoa.net/vospace/core#mtime";

/// MD5 of zero bytes, which is what a freshly touched object hashes to.
pub const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

bitflags! {
    /// Where a property may show up, as reported by property introspection.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct PropertyAttributes: u8 {
        const ACCEPTS = 1;
        const PROVIDES = 2;
        const CONTAINS = 4;
    }
}

/// The properties every space knows about from the start, with their
/// read-only flag. Server computed values are read-only to clients.
pub const CORE_PROPERTIES: &[(&str, bool)] = &[
    (TITLE, false),
    (CREATOR, false),
    (SUBJECT, false),
    (DESCRIPTION, false),
    (PUBLISHER, false),
    (CONTRIBUTOR, false),
    (DATE, true),
    (TYPE, false),
    (FORMAT, false),
    (IDENTIFIER, false),
    (SOURCE, false),
    (LANGUAGE, false),
    (RELATION, false),
    (COVERAGE, false),
    (RIGHTS, false),
    (AVAILABLE_SPACE, true),
    (LENGTH, true),
    (MD5, true),
    (GROUPREAD, false),
    (GROUPWRITE, false),
    (PUBLICREAD, false),
    (ISPUBLIC, false),
    (BTIME, true),
    (CTIME, true),
    (MTIME, true),
];

/// Formats a timestamp the way node properties carry them,
/// e.g. `2024-03-01T12:00:00.000+0000`.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()
}

/// Interprets a boolean-ish property value.
pub fn is_true(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some(v) if v.eq_ignore_ascii_case("true"))
}
