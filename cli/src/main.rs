use std::sync::Arc;

use clap::Parser;
use serde_json::{json, Value};
use tracing::{info, warn};
use vospace_core::config::SpaceConfig;
use vospace_core::nodes::Node;
use vospace_core::transfer::{JobScheduler, Transfer, TransferEngine};
use vospace_core::{Error, NamespaceManager};
use vospace_tracing::TracingBuilder;

mod args;

use args::{Args, Command};

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, Error> {
    Ok(serde_json::to_value(value)?)
}

/// Prints the transfer document as soon as the job published it, so clients
/// learn the endpoints of pushToVoSpace and pullFromVoSpace jobs while the
/// job still waits for them.
async fn announce(
    manager: &NamespaceManager,
    scheduler: &JobScheduler,
    job_id: &str,
) -> Result<(), Error> {
    let Some(mut rx) = scheduler.subscribe(job_id) else {
        return Ok(());
    };
    loop {
        if let Some(doc) = manager.store().get_result(job_id).await? {
            println!("{}", doc);
            return Ok(());
        }
        if rx.borrow().phase.is_terminal() {
            return Ok(());
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
        }
    }
}

async fn transfer(
    manager: Arc<NamespaceManager>,
    config: &SpaceConfig,
    transfer: Transfer,
    owner: &str,
) -> Result<Value, Error> {
    let engine = TransferEngine::new(manager.clone(), config.transfers.clone());
    let scheduler = JobScheduler::new(Arc::new(engine));
    let job_id = scheduler.submit(transfer, owner);
    info!(%job_id, "submitted transfer");

    let run = async {
        announce(&manager, &scheduler, &job_id).await?;
        scheduler.wait(&job_id).await
    };
    let status = tokio::select! {
        status = run => status?,
        _ = tokio::signal::ctrl_c() => {
            warn!(%job_id, "interrupted, aborting transfer");
            scheduler.abort(&job_id)?;
            scheduler.wait(&job_id).await?
        }
    };

    Ok(json!({
        "jobId": job_id,
        "phase": status.phase,
        "error": status.error.map(|e| json!({
            "fault": e.fault_name(),
            "message": e.to_string(),
        })),
        "results": status.results,
    }))
}

async fn run(args: Args) -> Result<Value, Error> {
    let config = SpaceConfig::load(&args.config).await?;
    let manager = Arc::new(NamespaceManager::from_config(&config).await?);

    match args.command {
        Command::Create {
            uri,
            node_type,
            target,
            properties,
            overwrite,
        } => {
            let mut node = match target {
                Some(target) => Node::link(uri, target),
                None => Node::new(uri, node_type)?,
            };
            node.properties.extend(properties);
            to_json(&manager.create(node, &args.owner, overwrite).await?)
        }
        Command::Get { uri, detail, limit } => {
            to_json(&manager.get_node(&uri, detail, limit).await?)
        }
        Command::Delete { uri } => {
            manager.delete(&uri).await?;
            Ok(json!({ "deleted": uri }))
        }
        Command::Transfer {
            target,
            direction,
            protocols,
            view,
            keep_bytes,
        } => {
            let mut request = Transfer::new(target, direction).keep_bytes(keep_bytes);
            request.protocols = protocols;
            request.view = view;
            transfer(manager, &config, request, &args.owner).await
        }
        Command::Complete { endpoint } => {
            manager.complete_transfer(&endpoint).await?;
            Ok(json!({ "completed": endpoint }))
        }
        Command::Views => Ok(json!({
            "accepts": manager.accepted_views(),
            "provides": manager.provided_views(),
        })),
        Command::Protocols => Ok(json!({
            "server": manager.protocols().server_protocols(),
            "client": manager.protocols().client_protocols(),
        })),
        Command::Properties { attribute } => {
            to_json(&manager.properties(attribute.into()).await?)
        }
        Command::Capabilities => Ok(json!(manager
            .capabilities()
            .uris()
            .collect::<Vec<_>>())),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = TracingBuilder::default()
        .level(args.log_level)
        .json(args.json_logs)
        .build()
    {
        eprintln!("failed to initialize tracing: {}", e);
        std::process::exit(1);
    }

    match run(args).await {
        Ok(output) => println!("{:#}", output),
        Err(e) => {
            println!(
                "{:#}",
                json!({ "fault": e.fault_name(), "message": e.to_string() })
            );
            std::process::exit(1);
        }
    }
}
