use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use poml_nodes::templates::{self, get_template};
use poml_nodes::{Capability, Config, NodeRegistry, RenderMode, RenderRequest, Renderer};

/// POML - Render prompt markup to plain text
#[derive(Parser)]
#[command(name = "poml", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Never delegate to the POML SDK
    #[arg(long, env = "POML_DISABLE_SDK", global = true)]
    no_sdk: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a POML document
    Render {
        /// Markup file; reads stdin when omitted or "-"
        file: Option<PathBuf>,
        /// Render mode (standard, optimized, debug)
        #[arg(short, long)]
        mode: Option<String>,
        /// Variables as a JSON object
        #[arg(long, conflicts_with = "vars_file")]
        vars: Option<String>,
        /// File holding the variables JSON object
        #[arg(long)]
        vars_file: Option<PathBuf>,
        /// Character cap on the output (0 = unlimited)
        #[arg(long)]
        max_length: Option<usize>,
        /// Directory relative `src` attributes resolve against
        #[arg(long)]
        base_dir: Option<PathBuf>,
        /// Print prompt and metadata together as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a library template
    Template {
        /// Template name
        #[arg(default_value = templates::DEFAULT_TEMPLATE)]
        name: String,
        /// Variables as a JSON object
        #[arg(long)]
        vars: Option<String>,
    },
    /// List library template names
    Templates,
    /// Show which optional capabilities are available
    Capabilities,
    /// Print node descriptors as JSON
    Nodes,
    /// Invoke a node with JSON inputs
    Invoke {
        /// Node registration name (e.g. `PomlProcessor`)
        node: String,
        /// Inputs as a JSON object
        #[arg(long, default_value = "{}")]
        inputs: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,poml_nodes=info",
        1 => "info,poml_nodes=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if cli.no_sdk {
        config.disable_sdk = true;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Render {
            file,
            mode,
            vars,
            vars_file,
            max_length,
            base_dir,
            json,
        } => {
            let renderer = Renderer::from_config(&config);
            let markup = read_markup(file.as_deref())?;

            let mode = match mode {
                Some(mode) => mode.parse::<RenderMode>()?,
                None => config.default_mode,
            };
            let vars_json = match (vars, vars_file) {
                (Some(json), _) => json,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, None) => String::new(),
            };

            let mut request = RenderRequest::new(markup)
                .mode(mode)
                .variables_outcome(renderer.parse_variables(&vars_json))
                .max_length(max_length.unwrap_or(config.max_length));
            // Relative sources follow the document unless told otherwise
            let dir = base_dir.or(config.base_dir).or_else(|| {
                file.as_deref()
                    .filter(|f| *f != Path::new("-"))
                    .and_then(Path::parent)
                    .map(Path::to_path_buf)
            });
            if let Some(dir) = dir {
                request = request.base_dir(dir);
            }

            let result = renderer.render(&request)?;
            if json {
                let out = serde_json::json!({
                    "prompt": result.text,
                    "metadata": result.metadata,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", result.text);
            }
        }
        Command::Template { name, vars } => {
            let template = get_template(&name)?;
            match vars {
                Some(json) => {
                    let renderer = Renderer::from_config(&config);
                    let outcome = renderer.parse_variables(&json);
                    if let Some(error) = &outcome.error {
                        anyhow::bail!("invalid variables: {error}");
                    }
                    println!(
                        "{}",
                        poml_nodes::poml::substitute_str(template, &outcome.variables)
                    );
                }
                None => println!("{template}"),
            }
        }
        Command::Templates => {
            for name in templates::names() {
                println!("{name}");
            }
        }
        Command::Capabilities => {
            let renderer = Renderer::from_config(&config);
            let caps = renderer.capabilities();
            for capability in Capability::ALL {
                let mark = if caps.is_available(capability) { "yes" } else { "no" };
                println!("{:<12} {:<24} {mark}", capability.name(), capability.feature());
            }
        }
        Command::Nodes => {
            let registry = registry(&config);
            println!("{}", serde_json::to_string_pretty(&registry.descriptors())?);
        }
        Command::Invoke { node, inputs } => {
            let inputs: serde_json::Value =
                serde_json::from_str(&inputs).context("inputs must be a JSON object")?;
            let result = registry(&config).invoke(&node, &inputs);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.ok {
                anyhow::bail!(
                    "node '{node}' failed: {}",
                    result.error.unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

fn registry(config: &Config) -> NodeRegistry {
    let renderer = Arc::new(Renderer::from_config(config));
    NodeRegistry::with_defaults(renderer, config.base_dir.clone())
}

fn read_markup(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut markup = String::new();
            std::io::stdin()
                .read_to_string(&mut markup)
                .context("failed to read markup from stdin")?;
            Ok(markup)
        }
    }
}
