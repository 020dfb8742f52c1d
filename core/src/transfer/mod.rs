//! Transfer jobs: moving bytes into, out of and around a space.
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::uri::NodeUri;
use crate::Error;

mod engine;
mod scheduler;

#[cfg(test)]
mod tests;

pub use self::engine::TransferEngine;
pub use self::scheduler::{JobScheduler, JobStatus};
pub use crate::protocol::Protocol;

/// Where the bytes of a transfer go.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    /// The client uploads to an endpoint handed out by the space.
    PushToSpace,
    /// The space fetches from an endpoint supplied by the client.
    PullToSpace,
    /// The space uploads to an endpoint supplied by the client.
    PushFromSpace,
    /// The client downloads from an endpoint handed out by the space.
    PullFromSpace,
    /// Move or copy to another node of the space.
    Space(NodeUri),
}

impl Direction {
    pub fn is_external(&self) -> bool {
        !matches!(self, Direction::Space(_))
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pushToVoSpace" => Direction::PushToSpace,
            "pullToVoSpace" => Direction::PullToSpace,
            "pushFromVoSpace" => Direction::PushFromSpace,
            "pullFromVoSpace" => Direction::PullFromSpace,
            s if s.starts_with("vos") => Direction::Space(NodeUri::parse(s)?),
            s => return Err(Error::InvalidUri(format!("unknown direction {}", s))),
        })
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::PushToSpace => f.write_str("pushToVoSpace"),
            Direction::PullToSpace => f.write_str("pullToVoSpace"),
            Direction::PushFromSpace => f.write_str("pushFromVoSpace"),
            Direction::PullFromSpace => f.write_str("pullFromVoSpace"),
            Direction::Space(uri) => Display::fmt(uri, f),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Direction> for String {
    fn from(value: Direction) -> Self {
        value.to_string()
    }
}

/// A transfer request, and once negotiated, the transfer document results
/// are published as.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub target: NodeUri,
    pub direction: Direction,
    /// Requested view URI, external transfers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<Protocol>,
    /// Copy instead of move, for transfers inside the space.
    #[serde(default)]
    pub keep_bytes: bool,
}

impl Transfer {
    pub fn new(target: NodeUri, direction: Direction) -> Self {
        Self {
            target,
            direction,
            view: None,
            protocols: vec![],
            keep_bytes: false,
        }
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocols.push(protocol);
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn keep_bytes(mut self, keep: bool) -> Self {
        self.keep_bytes = keep;
        self
    }

    pub fn to_document(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Job phases. Terminal phases are final.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Pending,
    Queued,
    Executing,
    Completed,
    Error,
    Aborted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Error | Phase::Aborted)
    }
}

/// How a pullFromVoSpace job decides the client is done downloading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionStrategy {
    /// Checks the completion flag every export check interval, and assumes
    /// completion once the export ceiling has passed.
    #[default]
    ElapsedHeuristic,
    /// Waits for the completion flag only.
    PollUntilFlagged,
}

/// How a job body ended, short of failing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Carries the negotiated transfer document.
    Completed(Transfer),
    Aborted,
}
