use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use azure_monitor_batcher::{
    batch_url, group_queries, partition, telemetry, BatchRunner, Config, Query, ReqwestHttpClient,
    SubscriptionNames,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "AZMON_BATCHER_CONFIG", default_value = "azmon-batcher.yaml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print how a JSON array of queries would be batched, without calling Azure
    Plan {
        queries: PathBuf,
    },
    /// Execute the queries against Azure and print per-query results
    Run {
        queries: PathBuf,
        /// Environment variable holding an Azure access token
        #[arg(long, default_value = "AZURE_ACCESS_TOKEN")]
        token_env: String,
        /// JSON object mapping subscription ids to display names
        #[arg(long)]
        subscription_names: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct PlannedBatch {
    key: String,
    chunk: usize,
    url: String,
    resource_count: usize,
    ref_ids: Vec<String>,
}

#[derive(Serialize)]
struct Plan {
    batches: Vec<PlannedBatch>,
    non_batchable: Vec<String>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    telemetry::init_telemetry(&config.log_filter)?;

    match args.command {
        Command::Plan { queries } => {
            let queries: Vec<Query> = read_json(&queries)?;
            let (batchable, non_batchable) = partition(queries);
            let groups = group_queries(&batchable, config.max_resources_per_batch);

            let batches = groups
                .iter()
                .map(|group| -> azure_monitor_batcher::Result<PlannedBatch> {
                    Ok(PlannedBatch {
                        key: group.key.clone(),
                        chunk: group.chunk,
                        url: batch_url(group, &config.api_version)?.to_string(),
                        resource_count: group.resource_ids.len(),
                        ref_ids: group.queries.iter().map(|q| q.ref_id.clone()).collect(),
                    })
                })
                .collect::<azure_monitor_batcher::Result<Vec<_>>>()?;

            let plan = Plan {
                batches,
                non_batchable: non_batchable.into_iter().map(|q| q.ref_id).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Run {
            queries,
            token_env,
            subscription_names,
        } => {
            let queries: Vec<Query> = read_json(&queries)?;
            let token = std::env::var(&token_env)
                .with_context(|| format!("environment variable {token_env} is not set"))?;
            let names: SubscriptionNames = match subscription_names {
                Some(path) => read_json::<HashMap<String, String>>(&path)?.into(),
                None => SubscriptionNames::new(),
            };

            let client =
                Arc::new(ReqwestHttpClient::new(config.request_timeout)?.with_bearer_token(token));
            let runner = BatchRunner::new(client, &config).with_subscription_names(names);

            let cancel = CancellationToken::new();
            let ctrl_c = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                })
            };

            let outcome = runner.run(queries, &cancel).await;
            ctrl_c.abort();

            for query in &outcome.non_batchable {
                tracing::warn!(ref_id = %query.ref_id, "Query not batchable, skipped");
            }
            println!("{}", serde_json::to_string_pretty(&outcome.results)?);
        }
    }

    Ok(())
}
