use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use actionflow_editor::{ModalRequest, SaveOutcome, SavePayload, WorkflowEditor};
use actionflow_model::{ActionId, ActionPayload, WorkflowId};
use actionflow_remote::{ClientConfig, HttpRemoteStore};

/// Actionflow - edit action workflows held by a remote workflow store
#[derive(Parser)]
#[command(name = "actionflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the client config file (default: ~/.actionflow/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Root URL of the store API, overriding the config file
  #[arg(long, global = true, env = "ACTIONFLOW_BASE_URL")]
  base_url: Option<String>,

  /// Bearer token, overriding the config file
  #[arg(long, global = true, env = "ACTIONFLOW_TOKEN", hide_env_values = true)]
  token: Option<String>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Work with the workflow list
  Workflows {
    #[command(subcommand)]
    command: WorkflowsCommand,
  },

  /// Work with one workflow
  Workflow {
    #[command(subcommand)]
    command: WorkflowCommand,
  },

  /// Edit the actions of a workflow
  Action {
    #[command(subcommand)]
    command: ActionCommand,
  },

  /// List saved provider connections
  Connections {
    /// Only show connections for this driver
    #[arg(long)]
    driver: Option<String>,
  },
}

#[derive(Subcommand)]
enum WorkflowsCommand {
  /// List workflows with their triggers and action counts
  List,
}

#[derive(Subcommand)]
enum WorkflowCommand {
  /// Print a workflow and its action tree
  Show { id: u64 },

  /// Delete a workflow
  Delete { id: u64 },
}

#[derive(Subcommand)]
enum ActionCommand {
  /// Add an action; its config is read from stdin as JSON
  Add {
    /// The workflow to add to
    #[arg(long)]
    workflow: u64,

    #[arg(long = "type")]
    action_type: u64,

    #[arg(long)]
    provider: u64,

    /// Create inside this container action
    #[arg(long)]
    parent: Option<u64>,

    /// Link the new action after this sibling
    #[arg(long)]
    after: Option<u64>,
  },

  /// Remove an action (and the body of a container)
  Remove {
    #[arg(long)]
    workflow: u64,

    id: u64,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let Some(command) = cli.command else {
    println!("actionflow - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    let config_path = match cli.config {
      Some(path) => path,
      None => dirs::home_dir()
        .context("could not determine home directory")?
        .join(".actionflow")
        .join("config.json"),
    };
    let editor = connect(config_path, cli.base_url, cli.token).await?;
    run(&editor, command).await
  })
}

async fn connect(
  config_path: PathBuf,
  base_url: Option<String>,
  token: Option<String>,
) -> Result<WorkflowEditor> {
  let mut config = ClientConfig::load(&config_path)
    .await
    .with_context(|| format!("failed to load config: {}", config_path.display()))?;
  if let Some(base_url) = base_url {
    config.base_url = base_url;
  }
  if token.is_some() {
    config.token = token;
  }

  let remote = HttpRemoteStore::new(&config).context("failed to create store client")?;
  Ok(WorkflowEditor::new(Arc::new(remote)))
}

async fn run(editor: &WorkflowEditor, command: Commands) -> Result<()> {
  match command {
    Commands::Workflows {
      command: WorkflowsCommand::List,
    } => {
      let workflows = editor
        .fetch_workflows()
        .await
        .context("failed to list workflows")?;
      println!("{}", serde_json::to_string_pretty(&workflows)?);
    }
    Commands::Workflow { command } => match command {
      WorkflowCommand::Show { id } => {
        open(editor, id).await?;
        println!("{}", editor.pretty_workflow()?);
      }
      WorkflowCommand::Delete { id } => {
        editor
          .fetch_workflows()
          .await
          .context("failed to list workflows")?;
        editor
          .delete_workflow(WorkflowId(id))
          .await
          .with_context(|| format!("failed to delete workflow {id}"))?;
        eprintln!("Deleted workflow {id}");
      }
    },
    Commands::Action { command } => match command {
      ActionCommand::Add {
        workflow,
        action_type,
        provider,
        parent,
        after,
      } => {
        open(editor, workflow).await?;
        let config = read_config_from_stdin()?;

        let mut request = match parent {
          Some(parent) => ModalRequest::nested_in(ActionId(parent)),
          None => ModalRequest::new_action(),
        };
        if let Some(after) = after {
          request = request.after(ActionId(after));
        }
        editor.open_modal(request)?;

        let payload = ActionPayload::new(action_type, provider, config);
        let outcome = editor
          .save(SavePayload::Action(payload))
          .await
          .context("failed to add action")?;
        if let SaveOutcome::ActionCreated {
          action,
          linked_after,
        } = outcome
        {
          if let Some(after) = linked_after {
            eprintln!("Linked action {} after {after}", action.id);
          }
          println!("{}", serde_json::to_string_pretty(&action)?);
        }
      }
      ActionCommand::Remove { workflow, id } => {
        open(editor, workflow).await?;
        editor
          .sync()
          .delete_action(ActionId(id))
          .await
          .with_context(|| format!("failed to remove action {id}"))?;
        eprintln!("Removed action {id}");
      }
    },
    Commands::Connections { driver } => {
      let mut connections = editor
        .sync()
        .fetch_connections()
        .await
        .context("failed to list connections")?;
      if let Some(driver) = driver {
        connections = editor.sync().connections_by_driver(&driver);
      }
      println!("{}", serde_json::to_string_pretty(&connections)?);
    }
  }

  Ok(())
}

/// Load the workflow list and bind workflow `id` for editing.
async fn open(editor: &WorkflowEditor, id: u64) -> Result<()> {
  editor
    .fetch_workflows()
    .await
    .context("failed to list workflows")?;
  editor
    .edit_workflow(WorkflowId(id))
    .await
    .with_context(|| format!("failed to open workflow {id}"))?;
  Ok(())
}

fn read_config_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read action config from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse action config JSON from stdin")
  }
}
