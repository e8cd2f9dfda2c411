//! GroupQ CLI - submit jobs and inspect queues over the daemon's JSON-RPC API

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "groupq")]
#[command(about = "GroupQ dispatch engine CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "GROUPQ_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a job to a queue
    Submit {
        /// Queue category (message, import, export)
        category: String,

        /// Payload as JSON object
        #[arg(long)]
        payload: String,

        /// Order within the group (default: submission time)
        #[arg(long)]
        order_key: Option<i64>,

        /// Delay before the job becomes eligible
        #[arg(long)]
        delay_ms: Option<i64>,

        /// Explicit group, overrides payload-derived grouping
        #[arg(short, long)]
        group_id: Option<String>,

        /// In-slot wait before the handler runs
        #[arg(long)]
        timeout_ms: Option<i64>,
    },

    /// Show queue counts (all queues when no category is given)
    Status {
        category: Option<String>,
    },

    /// List handlers instantiated so far
    Handlers,

    /// Show one job
    Job {
        category: String,
        job_id: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct SubmitResult {
    job_id: String,
    category: String,
    group_id: String,
    state: String,
    order_key: i64,
}

#[derive(Deserialize)]
struct Counts {
    waiting: u64,
    active: u64,
    completed: u64,
    failed: u64,
    delayed: u64,
}

#[derive(Deserialize)]
struct StatusResult {
    category: String,
    name: String,
    concurrency: usize,
    counts: Counts,
}

#[derive(Deserialize)]
struct StatusAllResult {
    queues: Vec<StatusResult>,
}

#[derive(Tabled)]
struct StatusRow {
    queue: String,
    name: String,
    concurrency: usize,
    waiting: u64,
    delayed: u64,
    active: u64,
    completed: u64,
    failed: u64,
}

impl From<StatusResult> for StatusRow {
    fn from(status: StatusResult) -> Self {
        Self {
            queue: status.category,
            name: status.name,
            concurrency: status.concurrency,
            waiting: status.counts.waiting,
            delayed: status.counts.delayed,
            active: status.counts.active,
            completed: status.counts.completed,
            failed: status.counts.failed,
        }
    }
}

#[derive(Deserialize)]
struct JobResult {
    job_id: String,
    group_id: String,
    state: String,
    order_key: i64,
    enqueued_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    failure_reason: Option<String>,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn submit_params(
    category: String,
    payload: &str,
    order_key: Option<i64>,
    delay_ms: Option<i64>,
    group_id: Option<String>,
    timeout_ms: Option<i64>,
) -> Result<serde_json::Value> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Invalid JSON payload")?;
    if !payload.is_object() {
        anyhow::bail!("Payload must be a JSON object");
    }
    Ok(json!({
        "category": category,
        "payload": payload,
        "order_key": order_key,
        "delay_ms": delay_ms,
        "group_id": group_id,
        "timeout_ms": timeout_ms,
    }))
}

fn optional_millis(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            category,
            payload,
            order_key,
            delay_ms,
            group_id,
            timeout_ms,
        } => {
            let params =
                submit_params(category, &payload, order_key, delay_ms, group_id, timeout_ms)?;
            let result = call_rpc(&cli.rpc_url, "queue.submit.v1", params).await?;
            let submitted: SubmitResult = serde_json::from_value(result)?;

            println!("{}", "✓ Job submitted successfully".green().bold());
            println!();
            println!("{}", Table::new(vec![submitted]));
        }

        Commands::Status { category } => {
            let statuses = match category {
                Some(category) => {
                    let result =
                        call_rpc(&cli.rpc_url, "queue.status.v1", json!({ "category": category }))
                            .await?;
                    vec![serde_json::from_value::<StatusResult>(result)?]
                }
                None => {
                    let result = call_rpc(&cli.rpc_url, "queue.status_all.v1", json!({})).await?;
                    serde_json::from_value::<StatusAllResult>(result)?.queues
                }
            };

            println!("{}", "Queue Status".cyan().bold());
            println!();
            let rows: Vec<StatusRow> = statuses.into_iter().map(StatusRow::from).collect();
            println!("{}", Table::new(rows));
        }

        Commands::Handlers => {
            let result = call_rpc(&cli.rpc_url, "queue.handlers.v1", json!({})).await?;
            let instantiated: Vec<String> = serde_json::from_value(
                result
                    .get("instantiated")
                    .cloned()
                    .unwrap_or_else(|| json!([])),
            )?;

            if instantiated.is_empty() {
                println!("{}", "No handlers instantiated yet".yellow());
            } else {
                println!("{}", "Instantiated handlers".cyan().bold());
                for category in instantiated {
                    println!("  {} {}", "•".bold(), category);
                }
            }
        }

        Commands::Job { category, job_id } => {
            let params = json!({ "category": category, "job_id": job_id });
            let result = call_rpc(&cli.rpc_url, "queue.job.v1", params).await?;
            let job: JobResult = serde_json::from_value(result)?;

            let state = match job.state.as_str() {
                "COMPLETED" => job.state.green(),
                "FAILED" => job.state.red(),
                "ACTIVE" => job.state.cyan(),
                _ => job.state.yellow(),
            };
            println!("  {} {}", "Job:".bold(), job.job_id);
            println!("  {} {}", "Group:".bold(), job.group_id);
            println!("  {} {}", "State:".bold(), state);
            println!("  {} {}", "Order key:".bold(), job.order_key);
            println!("  {} {}", "Enqueued:".bold(), job.enqueued_at);
            println!("  {} {}", "Started:".bold(), optional_millis(job.started_at));
            println!("  {} {}", "Finished:".bold(), optional_millis(job.finished_at));
            if let Some(reason) = job.failure_reason {
                println!("  {} {}", "Failure:".bold(), reason.red());
            }
        }
    }

    Ok(())
}
