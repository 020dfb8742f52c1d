use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use vospace_core::manager::Detail;
use vospace_core::nodes::{NodeType, Property};
use vospace_core::properties::PropertyAttributes;
use vospace_core::transfer::{Direction, Protocol};
use vospace_core::NodeUri;

/// Administers a VOSpace from its configuration file.
///
/// Every command opens the metadata store and storage backend named in the
/// configuration, and prints its result as JSON.
#[derive(Parser, Clone, Debug)]
#[command(name = "vospace")]
pub struct Args {
    /// A global log level to use when printing logs.
    /// It's also possible to set `RUST_LOG` according to
    /// `tracing_subscriber::filter::EnvFilter`, which will always have
    /// priority.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Log JSON objects instead of text lines.
    #[arg(long)]
    pub json_logs: bool,

    /// Path to the TOML space configuration.
    #[arg(long, short, env = "VOSPACE_CONFIG")]
    pub config: PathBuf,

    /// Identity nodes are created and transfers are run as.
    #[arg(long, env = "VOSPACE_OWNER", default_value = "root")]
    pub owner: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Command {
    /// Creates a node, or updates it with --overwrite.
    Create {
        uri: NodeUri,

        /// Node type, e.g. `ContainerNode` or `vos:UnstructuredDataNode`.
        #[arg(long = "type", short = 't', default_value = "DataNode")]
        node_type: NodeType,

        /// Target of a link node.
        #[arg(long)]
        target: Option<NodeUri>,

        /// A property as `<uri>=<value>`. An empty value removes the
        /// property on overwrite.
        #[arg(long = "property", short = 'p', value_parser = parse_property)]
        properties: Vec<(String, Property)>,

        #[arg(long)]
        overwrite: bool,
    },

    /// Prints a node.
    Get {
        uri: NodeUri,

        /// One of `max`, `min` or `properties`.
        #[arg(long, default_value = "max")]
        detail: Detail,

        /// Maximum number of children to list.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Deletes a node and everything below it.
    Delete { uri: NodeUri },

    /// Runs a transfer job to completion. Ctrl-C aborts the job.
    Transfer {
        target: NodeUri,

        /// `pushToVoSpace`, `pullToVoSpace`, `pushFromVoSpace`,
        /// `pullFromVoSpace`, or the node to move to.
        direction: Direction,

        /// A protocol as `<uri>` or `<uri>=<endpoint>`.
        #[arg(long = "protocol", value_parser = parse_protocol)]
        protocols: Vec<Protocol>,

        /// Requested view URI.
        #[arg(long)]
        view: Option<String>,

        /// Copy instead of move.
        #[arg(long)]
        keep_bytes: bool,
    },

    /// Flags the transfer behind an endpoint complete.
    Complete { endpoint: String },

    /// Lists the views the space accepts and provides.
    Views,

    /// Lists the protocols the space supports in either role.
    Protocols,

    /// Lists known properties.
    Properties {
        #[arg(long, value_enum, default_value_t = Attribute::Contains)]
        attribute: Attribute,
    },

    /// Lists the capabilities of the space.
    Capabilities,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Attribute {
    Accepts,
    Provides,
    Contains,
}

impl From<Attribute> for PropertyAttributes {
    fn from(value: Attribute) -> Self {
        match value {
            Attribute::Accepts => PropertyAttributes::ACCEPTS,
            Attribute::Provides => PropertyAttributes::PROVIDES,
            Attribute::Contains => PropertyAttributes::CONTAINS,
        }
    }
}

fn parse_property(s: &str) -> Result<(String, Property), String> {
    let (uri, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <uri>=<value>, got {}", s))?;
    if uri.is_empty() {
        return Err("property uri must not be empty".to_string());
    }
    let property = if value.is_empty() {
        Property::nil()
    } else {
        Property::new(value)
    };
    Ok((uri.to_string(), property))
}

fn parse_protocol(s: &str) -> Result<Protocol, String> {
    match s.split_once('=') {
        Some((uri, endpoint)) if !endpoint.is_empty() => {
            Ok(Protocol::new(uri).with_endpoint(endpoint))
        }
        Some((uri, _)) => Ok(Protocol::new(uri)),
        None => Ok(Protocol::new(s)),
    }
}
