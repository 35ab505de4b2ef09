//! # dbt-rag CLI
//!
//! ```bash
//! dbt-rag --project ./my_dbt_project parse
//! dbt-rag load --include marts
//! dbt-rag query "daily revenue"
//! dbt-rag ask "Which model holds customer emails?"
//! dbt-rag document fct_orders --write-yaml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dbt_rag::types::{GenerateOptions, ModelFilter};
use dbt_rag::{Config, DocsClient};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "dbt-rag",
    about = "Retrieval and documentation for dbt projects",
    version,
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ", built ",
        env!("BUILD_TIMESTAMP"),
        ")"
    )
)]
struct Cli {
    /// Configuration file (TOML); defaults to the platform config directory
    #[arg(long, global = true, env = "DBT_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Root of the dbt project, overrides `project.root`
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the project and save the model directory
    Parse,

    /// Show one directory entry as JSON
    Show {
        model: String,
    },

    /// List models in the directory
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Embed documented models into the vector index
    Load {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Remove every model from the vector index
    Reset,

    /// Print the models closest to a question
    Query {
        question: String,

        /// Number of models to return
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Ask questions about the project; reads from stdin when no question is given
    #[command(alias = "chat")]
    Ask {
        question: Option<String>,
    },

    /// Generate documentation for a model and its undocumented dependencies
    Document {
        model: String,

        /// Write the result to the model's metadata file
        #[arg(long)]
        write_yaml: bool,

        /// Replace the record in an existing metadata file
        #[arg(long, requires = "write_yaml")]
        overwrite: bool,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Select models by name
    #[arg(long = "name")]
    names: Vec<String>,

    /// Select models whose path contains this fragment
    #[arg(long = "include")]
    included: Vec<String>,

    /// Drop models whose path contains this fragment
    #[arg(long = "exclude")]
    excluded: Vec<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> ModelFilter {
        let mut filter = ModelFilter::all();
        if !self.names.is_empty() {
            filter = filter.with_names(self.names.iter().cloned());
        }
        if !self.included.is_empty() {
            filter = filter.including(self.included.iter().cloned());
        }
        if !self.excluded.is_empty() {
            filter = filter.excluding(self.excluded.iter().cloned());
        }
        filter
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default()?,
    };
    config.apply_env_overrides();
    if let Some(project) = &cli.project {
        config.project.root = project.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = load_config(&cli).context("Failed to load configuration")?;
    let client = DocsClient::with_config(config).await?;

    match cli.command {
        Commands::Parse => {
            let response = client.parse_project().await?;
            for warning in &response.warnings {
                eprintln!("warning: {}", warning);
            }
            println!(
                "Parsed {} models ({} from SQL, {} documentation only) and {} sources in {} ms",
                response.models,
                response.sql_models,
                response.documentation_only,
                response.sources,
                response.duration_ms
            );
        }
        Commands::Show { model } => {
            let entry = client
                .get_model(&model)?
                .with_context(|| format!("Model '{}' is not in the directory", model))?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        Commands::List { filter } => {
            for entry in client.list_models(&filter.to_filter())? {
                println!("{}\t{}", entry.name, entry.relative_path().unwrap_or("-"));
            }
        }
        Commands::Load { filter } => {
            let response = client.load_models(&filter.to_filter()).await?;
            println!(
                "Loaded {} models in {} ms",
                response.models_loaded, response.duration_ms
            );
            if !response.skipped.is_empty() {
                println!("Skipped (no documentation): {}", response.skipped.join(", "));
            }
        }
        Commands::Reset => {
            client.reset_model_index().await?;
            println!("Vector index cleared");
        }
        Commands::Query { question, k } => {
            for result in client.query_models(&question, k).await? {
                println!("{:.4}\t{}", result.distance, result.id);
            }
        }
        Commands::Ask { question } => {
            let mut session = client.chat_session();
            match question {
                Some(question) => {
                    let answer = session.ask(&question).await?;
                    println!("{}", answer.answer);
                }
                None => {
                    let stdin = std::io::stdin();
                    print!("> ");
                    std::io::stdout().flush()?;
                    for line in stdin.lock().lines() {
                        let line = line?;
                        if !line.trim().is_empty() {
                            match session.ask(line.trim()).await {
                                Ok(answer) => println!("{}\n", answer.answer),
                                Err(e) => eprintln!("error: {:#}", e),
                            }
                        }
                        print!("> ");
                        std::io::stdout().flush()?;
                    }
                }
            }
        }
        Commands::Document {
            model,
            write_yaml,
            overwrite,
        } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_interrupt.cancel();
                }
            });

            let options = GenerateOptions {
                write_yaml,
                overwrite_existing: overwrite,
            };
            let documentation = client
                .generate_documentation(&model, options, &cancel)
                .await?;
            println!("{}", serde_yaml::to_string(&documentation)?);
        }
    }

    Ok(())
}
