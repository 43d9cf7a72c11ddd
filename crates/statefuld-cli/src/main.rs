//! `statefuldctl`: thin admin CLI over [`statefuld::CoreApi`] — this tool
//! has one job, drive the Core API, and exits, rather than running a
//! full REPL.
//!
//! The control plane itself has no standalone server process in this
//! repo, so each invocation builds its own in-process [`CoreApi`] against
//! a real [`HttpAgentClient`] and a node candidate list read from a JSON
//! file, runs one command, and exits. A long-running deployment would wire
//! the same `CoreApi` behind a persistent server instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use statefuld::CoreApi;
use statefuld_agent_client::{AgentClient, HttpAgentClient};
use statefuld_config::StatefuldConfig;
use statefuld_placement::{FakeNodeScheduler, NodeCandidate, NodeScheduler};
use statefuld_types::{CoreError, Name, Namespace, Ordinal, Owner, ServiceId, ServiceSpec};

#[derive(Parser)]
#[command(name = "statefuldctl", version, about = "Administer statefuld-managed services")]
struct Cli {
    /// Project directory to load `statefuld.toml` / `statefuld.local.toml` from.
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// JSON file listing candidate nodes (`Vec<NodeCandidate>`); the node
    /// scheduler is an external system this tool has no access to, so it
    /// stands in a static table read once at startup.
    #[arg(long, global = true)]
    nodes: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Declare a new service from a JSON `ServiceSpec` file.
    Create {
        owner: OwnerArg,
        #[arg(long)]
        spec: PathBuf,
    },
    /// Fetch a service by id.
    Get { id: ServiceIdArg },
    /// Fetch a service by namespace/name.
    GetByName {
        namespace: String,
        name: String,
    },
    /// List every service owned by `owner`.
    List { owner: OwnerArg },
    /// Change the declared replica count.
    Scale {
        id: ServiceIdArg,
        owner: OwnerArg,
        replicas: u32,
    },
    /// Recover a single replica ordinal in place.
    Failover { id: ServiceIdArg, ordinal: u32 },
    /// Force a leader re-election.
    ElectLeader { id: ServiceIdArg },
    /// Print the current leader replica, if any.
    GetLeader { id: ServiceIdArg },
    /// Tear the service down.
    Terminate { id: ServiceIdArg, owner: OwnerArg },
}

#[tokio::main]
async fn main() -> Result<()> {
    statefuld::init_tracing();
    let cli = Cli::parse();

    let config = match &cli.project_dir {
        Some(dir) => StatefuldConfig::load_from_dir(dir).context("loading statefuld config")?,
        None => StatefuldConfig::load().context("loading statefuld config")?,
    };

    let candidates = match &cli.nodes {
        Some(path) => {
            let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<Vec<NodeCandidate>>(&raw).context("parsing node candidate list")?
        }
        None => Vec::new(),
    };

    let agent: Arc<dyn AgentClient> = Arc::new(HttpAgentClient::new(
        Duration::from_secs(u64::from(config.node_agent.request_timeout_seconds)),
        config.node_agent.retry_count,
    ));
    let scheduler: Arc<dyn NodeScheduler> = Arc::new(FakeNodeScheduler::new(candidates));
    let api = CoreApi::new(agent, scheduler, &config);

    run(&api, cli.command).await
}

async fn run(api: &CoreApi, command: Command) -> Result<()> {
    match command {
        Command::Create { owner, spec } => {
            let raw = std::fs::read_to_string(&spec).with_context(|| format!("reading {}", spec.display()))?;
            let spec: ServiceSpec = serde_json::from_str(&raw).context("parsing service spec")?;
            let service = api.create(owner.0, spec).await.map_err(core_error)?;
            print_json(&service)
        }
        Command::Get { id } => match api.get(id.0).await {
            Some(service) => print_json(&service),
            None => anyhow::bail!("service {} not found", id.0),
        },
        Command::GetByName { namespace, name } => {
            let namespace = Namespace::parse(namespace).context("invalid namespace")?;
            let name = Name::parse(name).context("invalid name")?;
            match api.get_by_name(&namespace, &name).await {
                Some(service) => print_json(&service),
                None => anyhow::bail!("service {namespace}/{name} not found"),
            }
        }
        Command::List { owner } => {
            let services = api.list_by_owner(owner.0).await;
            print_json(&services)
        }
        Command::Scale { id, owner, replicas } => {
            api.scale(id.0, owner.0, replicas).await.map_err(core_error)?;
            println!("scaled {} to {replicas} replicas", id.0);
            Ok(())
        }
        Command::Failover { id, ordinal } => {
            api.failover(id.0, Ordinal::new(ordinal)).await.map_err(core_error)?;
            println!("recovered {} ordinal {ordinal}", id.0);
            Ok(())
        }
        Command::ElectLeader { id } => {
            let leader = api.elect_leader(id.0).await.map_err(core_error)?;
            println!("new leader: ordinal {leader}");
            Ok(())
        }
        Command::GetLeader { id } => match api.get_leader(id.0).await {
            Some(replica) => print_json(&replica),
            None => {
                println!("no leader elected");
                Ok(())
            }
        },
        Command::Terminate { id, owner } => {
            api.terminate(id.0, owner.0).await.map_err(core_error)?;
            println!("terminated {}", id.0);
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn core_error(err: CoreError) -> anyhow::Error {
    anyhow::Error::new(err)
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ArgParseError(String);

#[derive(Clone)]
struct OwnerArg(Owner);

impl std::str::FromStr for OwnerArg {
    type Err = ArgParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Owner::try_from(raw.to_string()).map(OwnerArg).map_err(|e| ArgParseError(e.to_string()))
    }
}

#[derive(Clone)]
struct ServiceIdArg(ServiceId);

impl std::str::FromStr for ServiceIdArg {
    type Err = ArgParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ServiceId::try_from(raw.to_string()).map(ServiceIdArg).map_err(|e| ArgParseError(e.to_string()))
    }
}
