//! Validated node identifiers.
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::Error;

/// Suffix asking the service to generate a unique name.
pub const AUTO_NODE: &str = ".auto";
/// Suffix naming the "discard" endpoint of a move or copy.
pub const NULL_NODE: &str = ".null";

const SCHEME: &str = "vos://";

lazy_static! {
    static ref VOS_PATTERN: Regex = Regex::new(
        r"^vos://[\w\d][\w\d\-_\.~\*'\(\)\+=]*(![\w\d\-_\.~\*'\(\)\+=]+)+(/[\w\d\-_\.~\*'\(\)\+=]+)*$"
    )
    .expect("invalid identifier pattern");
}

/// Checks an identifier against the node URI grammar.
///
/// On top of the character classes, this rejects `.`/`..` traversal,
/// unbalanced parentheses, an authority shorter than three characters, and
/// reserved suffixes anywhere but on the final path segment.
pub fn is_valid_identifier(id: &str) -> bool {
    if !VOS_PATTERN.is_match(id) || id.contains("..") {
        return false;
    }

    let rest = &id[SCHEME.len()..];
    let (authority, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], Some(&rest[pos + 1..])),
        None => (rest, None),
    };
    if authority.len() < 3 || !balanced(authority) {
        return false;
    }

    let Some(path) = path else {
        return true;
    };
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len() - 1;
    segments.iter().enumerate().all(|(i, segment)| {
        *segment != "."
            && balanced(segment)
            && (i == last || !(segment.ends_with(AUTO_NODE) || segment.ends_with(NULL_NODE)))
    })
}

fn balanced(segment: &str) -> bool {
    let mut depth = 0usize;
    for c in segment.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// A syntactically valid node identifier, such as `vos://example.org!vospace/a/b`.
///
/// The part up to the first `/` names the space itself (its root container),
/// everything after is the `/`-delimited path inside the space.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeUri(String);

impl NodeUri {
    pub fn parse(id: &str) -> Result<Self, Error> {
        if !is_valid_identifier(id) {
            return Err(Error::InvalidUri(id.to_string()));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn root_len(&self) -> usize {
        SCHEME.len()
            + self.0[SCHEME.len()..]
                .find('/')
                .unwrap_or(self.0.len() - SCHEME.len())
    }

    /// The root container of the space this node lives in.
    pub fn root(&self) -> NodeUri {
        NodeUri(self.0[..self.root_len()].to_string())
    }

    pub fn is_root(&self) -> bool {
        self.root_len() == self.0.len()
    }

    /// The path below the root, without a leading slash. Empty for the root.
    pub fn path(&self) -> &str {
        self.0[self.root_len()..].trim_start_matches('/')
    }

    /// The final path segment. Empty for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// All but the last path segment, or None for the root.
    pub fn parent(&self) -> Option<NodeUri> {
        if self.is_root() {
            return None;
        }
        self.0.rfind('/').map(|pos| NodeUri(self.0[..pos].to_string()))
    }

    /// Appends a (possibly multi-segment) relative path.
    pub fn join(&self, rel: &str) -> Result<NodeUri, Error> {
        if rel.is_empty() {
            return Ok(self.clone());
        }
        NodeUri::parse(&format!("{}/{}", self.0, rel.trim_start_matches('/')))
    }

    pub fn is_auto(&self) -> bool {
        !self.is_root() && self.name().ends_with(AUTO_NODE)
    }

    pub fn is_null(&self) -> bool {
        !self.is_root() && self.name().ends_with(NULL_NODE)
    }

    /// Replaces the final segment with a freshly generated unique name.
    pub fn with_generated_name(&self) -> NodeUri {
        let parent = self.parent().unwrap_or_else(|| self.clone());
        NodeUri(format!("{}/{}", parent.0, uuid::Uuid::new_v4()))
    }

    /// Whether this node is `ancestor` or lives below it.
    pub fn is_within(&self, ancestor: &NodeUri) -> bool {
        self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0) && self.0[ancestor.0.len()..].starts_with('/'))
    }

    /// Rewrites the `from` prefix of this node to `to`, as done for the
    /// descendants of a moved or copied container.
    pub fn rebase(&self, from: &NodeUri, to: &NodeUri) -> Option<NodeUri> {
        if !self.is_within(from) {
            return None;
        }
        Some(NodeUri(format!("{}{}", to.0, &self.0[from.0.len()..])))
    }
}

impl Display for NodeUri {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl AsRef<str> for NodeUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodeUri {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !is_valid_identifier(&value) {
            return Err(Error::InvalidUri(value));
        }
        Ok(Self(value))
    }
}

impl TryFrom<&str> for NodeUri {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        NodeUri::parse(value)
    }
}

impl FromStr for NodeUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeUri::parse(s)
    }
}

impl From<NodeUri> for String {
    fn from(value: NodeUri) -> Self {
        value.0
    }
}

impl serde::Serialize for NodeUri {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NodeUri {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        NodeUri::try_from(s).map_err(serde::de::Error::custom)
    }
}
