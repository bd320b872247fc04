//! flowcore CLI - compile, run and inspect workflows

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{Map, Value};

use flowcore::dag::{compile, CompiledWorkflow, NodeConfig, WorkflowSchema};
use flowcore::error::{FixSuggestion, FlowError};
use flowcore::nodes::database::InMemoryDatabase;
use flowcore::nodes::http::{preview, ReqwestTransport};
use flowcore::runtime::{ExecuteMode, ExecutionContext, RunOutcome, Runner};
use flowcore::signal::MemorySignalStore;
use flowcore::EngineConfig;

#[derive(Parser)]
#[command(name = "flowcore")]
#[command(about = "flowcore - workflow execution core")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file
    Run {
        /// Path to a .yaml or .json workflow
        file: PathBuf,

        /// Run input as a JSON object (becomes the entry node's output)
        #[arg(short, long)]
        input: Option<String>,

        #[arg(long, default_value_t = 1)]
        execution_id: i64,

        /// User id recorded as the operator of database calls
        #[arg(long, default_value_t = 0)]
        operator: i64,

        /// normal, debug or node-debug
        #[arg(short, long, default_value = "normal")]
        mode: ExecuteMode,
    },

    /// Compile a workflow file and print its execution order
    Validate {
        /// Path to a .yaml or .json workflow
        file: PathBuf,
    },

    /// Show the request an HTTP node would send, without sending it
    Preview {
        /// Path to a .yaml or .json workflow
        file: PathBuf,

        /// Key of the HTTP requester node
        node: String,

        /// Node input as a JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Mask credential values
        #[arg(long)]
        redact: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            file,
            input,
            execution_id,
            operator,
            mode,
        } => run_workflow(&file, input.as_deref(), execution_id, operator, mode).await,
        Commands::Validate { file } => validate_workflow(&file),
        Commands::Preview {
            file,
            node,
            input,
            redact,
        } => preview_node(&file, &node, input.as_deref(), redact),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<FlowError>().and_then(|f| f.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load(file: &Path) -> anyhow::Result<CompiledWorkflow> {
    let schema = WorkflowSchema::from_file(file)
        .with_context(|| format!("loading workflow '{}'", file.display()))?;
    Ok(compile(schema)?)
}

fn parse_input(input: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    match input {
        None => Ok(Map::new()),
        Some(raw) => serde_json::from_str(raw).context("--input must be a JSON object"),
    }
}

async fn run_workflow(
    file: &Path,
    input: Option<&str>,
    execution_id: i64,
    operator: i64,
    mode: ExecuteMode,
) -> anyhow::Result<()> {
    let config = EngineConfig::load()?.with_env();
    let workflow = load(file)?;
    let input = parse_input(input)?;

    println!(
        "{} Running {} nodes | execution {} | mode: {}",
        "→".cyan(),
        workflow.len(),
        execution_id,
        mode.to_string().cyan().bold()
    );

    let runner = Runner::new(workflow)
        .with_transport(Arc::new(ReqwestTransport::new(&config.http)?))
        .with_database(Arc::new(InMemoryDatabase::new()))
        .with_http_settings(config.http.clone());
    let signals = Arc::new(MemorySignalStore::with_ttl(config.cancel.flag_ttl()));
    let ctx = ExecutionContext::new(execution_id, signals)
        .with_mode(mode)
        .with_operator(operator);

    let outcome = runner.run(&ctx, input).await?;
    match &outcome {
        RunOutcome::Completed { .. } => println!("{} Done!", "✓".green()),
        RunOutcome::Cancelled { .. } => println!("{} Cancelled", "⊘".yellow()),
    }
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(())
}

fn validate_workflow(file: &Path) -> anyhow::Result<()> {
    let workflow = load(file)?;

    println!("{} Workflow '{}' is valid", "✓".green(), file.display());
    println!("  Nodes: {}", workflow.len());
    for (i, node) in workflow.iter().enumerate() {
        println!("  {:>3}. {} ({})", i + 1, node.key, node.schema.kind.to_string().dimmed());
    }

    Ok(())
}

fn preview_node(file: &Path, node: &str, input: Option<&str>, redact: bool) -> anyhow::Result<()> {
    let workflow = load(file)?;
    let Some(compiled) = workflow.node(node) else {
        bail!("no node '{node}' in '{}'", file.display());
    };
    let NodeConfig::Http(config) = &compiled.config else {
        bail!("node '{node}' is a {} node, not an HTTP requester", compiled.schema.kind);
    };

    let described = preview(config, parse_input(input)?, redact)?;
    println!("{}", serde_json::to_string_pretty(&Value::Object(described))?);

    Ok(())
}
