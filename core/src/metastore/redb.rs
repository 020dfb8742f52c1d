use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use std::{path::PathBuf, sync::Arc};
use tracing::{instrument, warn};

use super::{targets_any, MetadataStore, NodeRecord, PropertyRecord, TransferRecord};
use crate::nodes::Node;
use crate::properties::PropertyAttributes;
use crate::uri::NodeUri;
use crate::Error;

/// JSON encoded [NodeRecord]s, keyed by node URI.
const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
/// JSON encoded [PropertyRecord]s, keyed by property URI.
const PROPERTIES: TableDefinition<&str, &[u8]> = TableDefinition::new("properties");
/// JSON encoded [TransferRecord]s, keyed by endpoint.
const TRANSFERS: TableDefinition<&str, &[u8]> = TableDefinition::new("transfers");
const RESULTS: TableDefinition<&str, &str> = TableDefinition::new("results");
/// Port of active capabilities, 0 when inactive.
const CAPABILITIES: TableDefinition<(&str, &str), u16> = TableDefinition::new("capabilities");

#[derive(Clone)]
pub struct RedbMetadataStore {
    // We wrap the db in an Arc to be able to move it into spawn_blocking,
    // as discussed in https://github.com/cberner/redb/issues/789
    db: Arc<Database>,
}

impl RedbMetadataStore {
    /// Constructs a new instance using the specified filesystem path for
    /// storage.
    pub async fn new(path: PathBuf) -> Result<Self, Error> {
        if path == PathBuf::from("/") {
            return Err(Error::InternalFault(
                "cowardly refusing to open / with redb".to_string(),
            ));
        }

        let db = tokio::task::spawn_blocking(|| -> Result<_, redb::Error> {
            let db = redb::Database::create(path)?;
            create_schema(&db)?;
            Ok(db)
        })
        .await??;

        Ok(Self { db: Arc::new(db) })
    }

    /// Constructs a new instance using the in-memory backend.
    pub fn new_temporary() -> Result<Self, Error> {
        let db =
            redb::Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;

        create_schema(&db)?;

        Ok(Self { db: Arc::new(db) })
    }

    async fn read<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&redb::ReadTransaction) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read()?;
            f(&txn)
        })
        .await?
    }

    /// Runs `f` in a write transaction, committing only if it succeeds.
    async fn write<T, F>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce(&redb::WriteTransaction) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_write()?;
            let out = f(&txn)?;
            txn.commit()?;
            Ok(out)
        })
        .await?
    }
}

/// Ensures all tables are present.
fn create_schema(db: &redb::Database) -> Result<(), redb::Error> {
    let txn = db.begin_write()?;
    txn.open_table(NODES)?;
    txn.open_table(PROPERTIES)?;
    txn.open_table(TRANSFERS)?;
    txn.open_table(RESULTS)?;
    txn.open_table(CAPABILITIES)?;
    txn.commit()?;

    Ok(())
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(data).map_err(|e| {
        warn!(err=%e, "failed to parse stored record");
        Error::InternalFault("failed to parse stored record".to_string())
    })
}

fn descendants(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    uri: &NodeUri,
) -> Result<Vec<NodeUri>, Error> {
    // every descendant key sorts between "<uri>/" and "<uri>0"
    let lower = format!("{}/", uri);
    let upper = format!("{}0", uri);

    let mut out = vec![];
    for entry in table.range::<&str>(lower.as_str()..upper.as_str())? {
        let (key, _) = entry?;
        out.push(NodeUri::parse(key.value())?);
    }
    Ok(out)
}

fn get_node_record(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    uri: &NodeUri,
) -> Result<Option<NodeRecord>, Error> {
    match table.get(uri.as_str())? {
        None => Ok(None),
        Some(data) => Ok(Some(decode(data.value())?)),
    }
}

#[async_trait]
impl MetadataStore for RedbMetadataStore {
    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn get_record(&self, uri: &NodeUri) -> Result<Option<NodeRecord>, Error> {
        let uri = uri.clone();
        self.read(move |txn| get_node_record(&txn.open_table(NODES)?, &uri))
            .await
    }

    #[instrument(skip_all, fields(node.uri = %record.uri))]
    async fn store_data(&self, record: NodeRecord) -> Result<(), Error> {
        self.write(move |txn| {
            let mut table = txn.open_table(NODES)?;
            if table.get(record.uri.as_str())?.is_some() {
                return Err(Error::DuplicateNode(record.uri.to_string()));
            }
            table.insert(record.uri.as_str(), serde_json::to_vec(&record)?.as_slice())?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, node), fields(node.uri = %uri))]
    async fn update_data(&self, uri: &NodeUri, node: &Node) -> Result<(), Error> {
        let uri = uri.clone();
        let mut node = node.clone();
        node.clear_children();

        self.write(move |txn| {
            let mut table = txn.open_table(NODES)?;
            let mut record = get_node_record(&table, &uri)?
                .ok_or_else(|| Error::NodeNotFound(uri.to_string()))?;

            record.node = node;
            record.last_modified = Utc::now();
            table.insert(uri.as_str(), serde_json::to_vec(&record)?.as_slice())?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, node), fields(node.uri = %old, node.new_uri = %new))]
    async fn rename_data(
        &self,
        old: &NodeUri,
        new: &NodeUri,
        location: &str,
        node: &Node,
    ) -> Result<(), Error> {
        let (old, new) = (old.clone(), new.clone());
        let location = location.to_string();
        let mut node = node.clone();
        node.clear_children();

        self.write(move |txn| {
            let mut table = txn.open_table(NODES)?;
            if old != new && table.get(new.as_str())?.is_some() {
                return Err(Error::DuplicateNode(new.to_string()));
            }
            let mut record = get_node_record(&table, &old)?
                .ok_or_else(|| Error::NodeNotFound(old.to_string()))?;
            table.remove(old.as_str())?;

            record.uri = new.clone();
            record.location = location;
            record.node = node;
            record.last_modified = Utc::now();
            table.insert(new.as_str(), serde_json::to_vec(&record)?.as_slice())?;

            // capability registrations follow the node
            let mut caps = txn.open_table(CAPABILITIES)?;
            let mut moved = vec![];
            for entry in caps.range::<(&str, &str)>((old.as_str(), "")..)? {
                let (key, port) = entry?;
                let (n, c) = key.value();
                if n != old.as_str() {
                    break;
                }
                moved.push((c.to_string(), port.value()));
            }
            for (c, port) in moved {
                caps.remove((old.as_str(), c.as_str()))?;
                caps.insert((new.as_str(), c.as_str()), port)?;
            }
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn remove_data(
        &self,
        uri: &NodeUri,
        recursive: bool,
    ) -> Result<Vec<NodeRecord>, Error> {
        let uri = uri.clone();
        self.write(move |txn| {
            let mut table = txn.open_table(NODES)?;
            if table.get(uri.as_str())?.is_none() {
                return Err(Error::NodeNotFound(uri.to_string()));
            }

            let mut removed = vec![uri.clone()];
            if recursive {
                removed.extend(descendants(&table, &uri)?);
            }
            for r in &removed {
                table.remove(r.as_str())?;
            }

            let mut links = vec![];
            for entry in table.iter()? {
                let (_, data) = entry?;
                let record: NodeRecord = decode(data.value())?;
                if targets_any(&record, &removed) {
                    links.push(record);
                }
            }
            for link in &links {
                table.remove(link.uri.as_str())?;
            }

            let mut caps = txn.open_table(CAPABILITIES)?;
            let mut stale = vec![];
            for entry in caps.iter()? {
                let (key, _) = entry?;
                let (n, c) = key.value();
                if removed.iter().any(|r| r.as_str() == n)
                    || links.iter().any(|l| l.uri.as_str() == n)
                {
                    stale.push((n.to_string(), c.to_string()));
                }
            }
            for (n, c) in stale {
                caps.remove((n.as_str(), c.as_str()))?;
            }

            Ok(links)
        })
        .await
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn get_children(
        &self,
        uri: &NodeUri,
        limit: Option<usize>,
    ) -> Result<Vec<NodeUri>, Error> {
        let uri = uri.clone();
        self.read(move |txn| {
            let table = txn.open_table(NODES)?;
            Ok(descendants(&table, &uri)?
                .into_iter()
                .filter(|c| c.parent().as_ref() == Some(&uri))
                .take(limit.unwrap_or(usize::MAX))
                .collect())
        })
        .await
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn get_all_children(&self, uri: &NodeUri) -> Result<Vec<NodeUri>, Error> {
        let uri = uri.clone();
        self.read(move |txn| descendants(&txn.open_table(NODES)?, &uri))
            .await
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn set_busy(&self, uri: &NodeUri, expected: bool, busy: bool) -> Result<bool, Error> {
        let uri = uri.clone();
        self.write(move |txn| {
            let mut table = txn.open_table(NODES)?;
            let mut record = get_node_record(&table, &uri)?
                .ok_or_else(|| Error::NodeNotFound(uri.to_string()))?;

            if !record.node_type.is_data() {
                return Ok(true);
            }
            if record.node.busy() != expected {
                return Ok(false);
            }
            record.node.set_busy(busy);
            record.last_modified = Utc::now();
            table.insert(uri.as_str(), serde_json::to_vec(&record)?.as_slice())?;
            Ok(true)
        })
        .await
    }

    async fn get_property(&self, property: &str) -> Result<Option<PropertyRecord>, Error> {
        let property = property.to_string();
        self.read(move |txn| {
            let table = txn.open_table(PROPERTIES)?;
            let data = table.get(property.as_str())?;
            data.map(|d| decode(d.value())).transpose()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn register_property(
        &self,
        property: &str,
        attributes: PropertyAttributes,
        read_only: bool,
    ) -> Result<(), Error> {
        let property = property.to_string();
        let record = serde_json::to_vec(&PropertyRecord {
            attributes,
            read_only,
        })?;
        self.write(move |txn| {
            txn.open_table(PROPERTIES)?
                .insert(property.as_str(), record.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn get_properties(&self, attributes: PropertyAttributes) -> Result<Vec<String>, Error> {
        self.read(move |txn| {
            let table = txn.open_table(PROPERTIES)?;
            let mut out = vec![];
            for entry in table.iter()? {
                let (key, data) = entry?;
                let record: PropertyRecord = decode(data.value())?;
                if record.attributes.intersects(attributes) {
                    out.push(key.value().to_string());
                }
            }
            Ok(out)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn store_transfer(&self, job_id: &str, endpoint: &str) -> Result<(), Error> {
        let record = TransferRecord {
            job_id: job_id.to_string(),
            endpoint: endpoint.to_string(),
            created: Utc::now(),
            completed: false,
        };
        self.write(move |txn| {
            txn.open_table(TRANSFERS)?.insert(
                record.endpoint.as_str(),
                serde_json::to_vec(&record)?.as_slice(),
            )?;
            Ok(())
        })
        .await
    }

    async fn get_transfer(&self, endpoint: &str) -> Result<Option<TransferRecord>, Error> {
        let endpoint = endpoint.to_string();
        self.read(move |txn| {
            let table = txn.open_table(TRANSFERS)?;
            let data = table.get(endpoint.as_str())?;
            data.map(|d| decode(d.value())).transpose()
        })
        .await
    }

    async fn is_completed(&self, job_id: &str) -> Result<bool, Error> {
        let job_id = job_id.to_string();
        self.read(move |txn| {
            let table = txn.open_table(TRANSFERS)?;
            for entry in table.iter()? {
                let (_, data) = entry?;
                let record: TransferRecord = decode(data.value())?;
                if record.job_id == job_id && record.completed {
                    return Ok(true);
                }
            }
            Ok(false)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn complete_transfer(&self, endpoint: &str) -> Result<(), Error> {
        let endpoint = endpoint.to_string();
        self.write(move |txn| {
            let mut table = txn.open_table(TRANSFERS)?;
            let mut record: TransferRecord = match table.get(endpoint.as_str())? {
                None => return Err(Error::NodeNotFound(endpoint.clone())),
                Some(data) => decode(data.value())?,
            };
            record.completed = true;
            table.insert(endpoint.as_str(), serde_json::to_vec(&record)?.as_slice())?;
            Ok(())
        })
        .await
    }

    async fn add_result(&self, job_id: &str, result: &str) -> Result<(), Error> {
        let (job_id, result) = (job_id.to_string(), result.to_string());
        self.write(move |txn| {
            txn.open_table(RESULTS)?
                .insert(job_id.as_str(), result.as_str())?;
            Ok(())
        })
        .await
    }

    async fn get_result(&self, job_id: &str) -> Result<Option<String>, Error> {
        let job_id = job_id.to_string();
        self.read(move |txn| {
            let table = txn.open_table(RESULTS)?;
            let result = table.get(job_id.as_str())?;
            Ok(result.map(|r| r.value().to_string()))
        })
        .await
    }

    async fn register_capability(&self, uri: &NodeUri, capability: &str) -> Result<(), Error> {
        let (uri, capability) = (uri.clone(), capability.to_string());
        self.write(move |txn| {
            let mut table = txn.open_table(CAPABILITIES)?;
            let key = (uri.as_str(), capability.as_str());
            if table.get(key)?.is_none() {
                table.insert(key, 0)?;
            }
            Ok(())
        })
        .await
    }

    async fn is_active(&self, uri: &NodeUri, capability: &str) -> Result<Option<u16>, Error> {
        let (uri, capability) = (uri.clone(), capability.to_string());
        self.read(move |txn| {
            let table = txn.open_table(CAPABILITIES)?;
            let port = table.get((uri.as_str(), capability.as_str()))?;
            Ok(port.map(|p| p.value()).filter(|p| *p > 0))
        })
        .await
    }

    #[instrument(skip(self), fields(node.uri = %uri))]
    async fn set_active(
        &self,
        uri: &NodeUri,
        capability: &str,
        port: Option<u16>,
    ) -> Result<(), Error> {
        let (uri, capability) = (uri.clone(), capability.to_string());
        self.write(move |txn| {
            let mut table = txn.open_table(CAPABILITIES)?;
            let key = (uri.as_str(), capability.as_str());
            if table.get(key)?.is_none() {
                return Err(Error::NodeNotFound(format!(
                    "capability {} is not registered on {}",
                    capability, uri
                )));
            }
            table.insert(key, port.unwrap_or(0))?;
            Ok(())
        })
        .await
    }

    async fn get_cap_port(&self) -> Result<Option<u16>, Error> {
        self.read(move |txn| {
            let table = txn.open_table(CAPABILITIES)?;
            let mut max = None;
            for entry in table.iter()? {
                let (_, port) = entry?;
                let port = port.value();
                if port > 0 && max.map_or(true, |m| port > m) {
                    max = Some(port);
                }
            }
            Ok(max)
        })
        .await
    }
}
