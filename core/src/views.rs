//! Data formats a node can accept or provide.
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::Error;

/// The view recorded for stored bytes whose format could not be inferred.
pub const BLOB_VIEW: &str = "ivo://ivoa.net/vospace/views/blob";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Any,
    Binary,
    Default,
    Votable,
    Ascii,
    Jpeg,
    Png,
    Fits,
    Csv,
    #[serde(rename = "votable-1.1")]
    Votable11,
    FitsTable,
    Tar,
}

impl View {
    pub const ALL: [View; 12] = [
        View::Any,
        View::Binary,
        View::Default,
        View::Votable,
        View::Ascii,
        View::Jpeg,
        View::Png,
        View::Fits,
        View::Csv,
        View::Votable11,
        View::FitsTable,
        View::Tar,
    ];

    pub fn uri(&self) -> &'static str {
        match self {
            View::Any => "ivo://ivoa.net/vospace/core#anyview",
            View::Binary => "ivo://ivoa.net/vospace/core#binaryview",
            View::Default => "ivo://ivoa.net/vospace/core#defaultview",
            View::Votable => "ivo://ivoa.net/vospace/core#votable",
            View::Ascii => "ivo://ivoa.net/vospace/core#ascii",
            View::Jpeg => "ivo://ivoa.net/vospace/views/image#jpeg",
            View::Png => "ivo://ivoa.net/vospace/views/image#png",
            View::Fits => "ivo://ivoa.net/vospace/views/image#fits",
            View::Csv => "ivo://ivoa.net/vospace/views/tabular#csv",
            View::Votable11 => "ivo://ivoa.net/vospace/views/tabular#votable-1.1",
            View::FitsTable => "ivo://ivoa.net/vospace/views/tabular#fits-table",
            View::Tar => "ivo://ivoa.net/vospace/views/archive#tar",
        }
    }

    pub fn from_uri(uri: &str) -> Option<View> {
        View::ALL.into_iter().find(|v| v.uri() == uri.trim())
    }
}

impl Display for View {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.uri())
    }
}

impl FromStr for View {
    type Err = Error;

    /// Accepts either the full view URI or its short name (`jpeg`, `csv`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(view) = View::from_uri(s) {
            return Ok(view);
        }
        serde_json::from_value(serde_json::Value::String(s.trim().to_lowercase()))
            .map_err(|_| Error::ViewNotSupported(s.to_string()))
    }
}

/// Infers the stored view of an object from the extension of its name.
pub fn infer_view(name: &str) -> &'static str {
    let Some((_, extension)) = name.rsplit_once('.') else {
        return BLOB_VIEW;
    };
    match extension.to_ascii_lowercase().as_str() {
        "fits" | "fit" | "fts" => View::Fits.uri(),
        "jpeg" | "jpg" => View::Jpeg.uri(),
        "png" => View::Png.uri(),
        "csv" => View::Csv.uri(),
        "vot" | "votable" => View::Votable11.uri(),
        "tar" => View::Tar.uri(),
        _ => BLOB_VIEW,
    }
}

/// Views grouped the way a space advertises them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewLists {
    #[serde(default)]
    pub image: Vec<View>,
    #[serde(default)]
    pub table: Vec<View>,
    #[serde(default)]
    pub archive: Vec<View>,
    #[serde(default)]
    pub other: Vec<View>,
}

impl ViewLists {
    /// The views applicable to structured data: everything but archives.
    pub fn structured(&self) -> impl Iterator<Item = View> + '_ {
        self.image
            .iter()
            .chain(self.table.iter())
            .chain(self.other.iter())
            .copied()
    }

    pub fn all(&self) -> impl Iterator<Item = View> + '_ {
        self.structured().chain(self.archive.iter().copied())
    }

    pub fn contains(&self, view: View) -> bool {
        self.all().any(|v| v == view)
    }
}
