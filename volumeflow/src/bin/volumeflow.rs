//! Command-line driver for volume workflows.
//!
//! The catalog lives in the runtime home and persists across invocations.
//! Pools are in-memory and are rebuilt from `--pools` on every run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::oneshot;

use volumeflow::backend::{MemoryImageTransfer, MemoryPools};
use volumeflow::volume::constants::GIB;
use volumeflow::{
    Completion, PoolId, TemplateId, VolumeApiResult, VolumeDiskType, VolumeEntity, VolumeId,
    VolumeOrchestrator, VolumeType, VolumeflowOptions, VolumeflowRuntime,
};

#[derive(Parser)]
#[command(author, version, about = "Drive volume lifecycle workflows", long_about = None)]
struct Cli {
    /// Runtime home directory (default: $VOLUMEFLOW_HOME or ~/.volumeflow)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// In-memory pool ids to register (comma-separated)
    #[arg(long, value_delimiter = ',', default_value = "1", global = true)]
    pools: Vec<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Allocate a catalog-only volume
    Allocate {
        #[arg(long)]
        name: String,
        #[arg(long, default_value_t = 1)]
        size_gib: u64,
        #[arg(long = "type", default_value = "DATADISK")]
        volume_type: VolumeType,
        #[arg(long)]
        template: Option<u64>,
    },
    /// Materialize an allocated volume on a pool
    Create {
        id: u64,
        #[arg(long)]
        pool: u64,
        #[arg(long, default_value = "THIN")]
        disk_type: VolumeDiskType,
    },
    /// Stage a template if needed, then materialize the volume from it
    CreateFromTemplate {
        id: u64,
        #[arg(long)]
        pool: u64,
        #[arg(long)]
        template: u64,
        #[arg(long, default_value = "QCOW2")]
        disk_type: VolumeDiskType,
    },
    /// Delete a volume
    Delete { id: u64 },
    /// Show one volume
    Show { id: u64 },
    /// List all volumes
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let options = match cli.home {
        Some(home) if home.is_relative() => {
            VolumeflowOptions::with_home(std::env::current_dir()?.join(home))
        }
        Some(home) => VolumeflowOptions::with_home(home),
        None => VolumeflowOptions::default(),
    };

    let pools = MemoryPools::new();
    for id in &cli.pools {
        pools.add(PoolId(*id));
    }
    let transfer = Arc::new(MemoryImageTransfer::new(pools.clone()));
    let runtime = VolumeflowRuntime::new(options, Arc::new(pools), transfer)
        .context("failed to start volumeflow runtime")?;
    let orchestrator = runtime.orchestrator();

    match cli.command {
        Command::Allocate {
            name,
            size_gib,
            volume_type,
            template,
        } => {
            let size = size_gib
                .checked_mul(GIB)
                .context("size overflows u64 bytes")?;
            let volume = orchestrator.allocate(size, volume_type, &name, template.map(TemplateId))?;
            print_json(&volume)
        }
        Command::Create {
            id,
            pool,
            disk_type,
        } => {
            let volume = load(orchestrator, id)?;
            let (done, rx) = Completion::channel();
            orchestrator.create_volume(volume, PoolId(pool), disk_type, done)?;
            report(rx).await
        }
        Command::CreateFromTemplate {
            id,
            pool,
            template,
            disk_type,
        } => {
            let volume = load(orchestrator, id)?;
            let (done, rx) = Completion::channel();
            orchestrator.create_volume_from_template(
                volume,
                PoolId(pool),
                disk_type,
                TemplateId(template),
                done,
            )?;
            report(rx).await
        }
        Command::Delete { id } => {
            let volume = load(orchestrator, id)?;
            let (done, rx) = Completion::channel();
            orchestrator.delete_volume(volume, done)?;
            report(rx).await
        }
        Command::Show { id } => print_json(&load(orchestrator, id)?),
        Command::List => print_json(&orchestrator.list()?),
    }
}

fn load(orchestrator: &VolumeOrchestrator, id: u64) -> Result<VolumeEntity> {
    orchestrator
        .lookup(VolumeId(id))?
        .with_context(|| format!("volume {} not found", id))
}

async fn report(rx: oneshot::Receiver<VolumeApiResult>) -> Result<()> {
    let result = rx.await.context("workflow ended without a result")?;
    print_json(&result)?;
    if let Some(failure) = result.failure {
        bail!("{}", failure);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
