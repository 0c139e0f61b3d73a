// crates/flowcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcodec::WriterOptions;
use flowcompile::{CompilerConfig, FlowCompiler, LoweringMode};
use flowcore::{count_errors, Diagnostic, FlowGraph, PassThruSynthesizer, ScopeResolver};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow graph toolchain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON on stdout
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a graph file and list every problem found
    Validate {
        /// Path to the graph text file
        file: PathBuf,
    },

    /// Show the per-scope segments of every connection
    Segments {
        file: PathBuf,
    },

    /// Lower a graph into its wiring plan
    Wire {
        file: PathBuf,

        /// JSON compiler configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Lowering mode: per-connection or flattened
        #[arg(short, long)]
        mode: Option<LoweringMode>,

        /// Fail when any diagnostic is reported
        #[arg(long)]
        deny_diagnostics: bool,
    },

    /// Rewrite a graph file in the current format
    Fmt {
        file: PathBuf,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Spaces per nesting level
        #[arg(long, default_value_t = 4)]
        indent: usize,

        /// Leave out lines holding default values
        #[arg(long)]
        compact: bool,
    },

    /// Replace plain boundary ports with pass-thru ports where possible
    Upgrade {
        file: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create an example graph file
    Init {
        #[arg(short, long, default_value = "example.flow")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Validate { file } => validate_graph(&file, cli.json)?,
        Commands::Segments { file } => show_segments(&file, cli.json)?,
        Commands::Wire {
            file,
            config,
            mode,
            deny_diagnostics,
        } => {
            let config = compiler_config(config.as_deref(), mode, deny_diagnostics)?;
            wire_graph(&file, config, cli.json)?;
        }
        Commands::Fmt {
            file,
            output,
            indent,
            compact,
        } => {
            let options = WriterOptions {
                indent,
                emit_defaults: !compact,
            };
            let graph = load_graph(&file)?;
            emit_text(&flowcodec::serialize_with(&graph, &options), output.as_deref())?;
        }
        Commands::Upgrade { file, output } => upgrade_graph(&file, output.as_deref())?,
        Commands::Init { output } => create_example_graph(&output)?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for text and JSON output.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn load_graph(file: &Path) -> Result<FlowGraph> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let graph = flowcodec::deserialize(&text)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    tracing::debug!("Loaded graph {} from {}", graph.name, file.display());
    Ok(graph)
}

fn emit_text(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// File settings first, then flags on top.
fn compiler_config(
    path: Option<&Path>,
    mode: Option<LoweringMode>,
    deny_diagnostics: bool,
) -> Result<CompilerConfig> {
    let mut config = match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Invalid compiler config {}", path.display()))?
        }
        None => CompilerConfig::default(),
    };
    if let Some(mode) = mode {
        config.mode = mode;
    }
    if deny_diagnostics {
        config.deny_diagnostics = true;
    }
    Ok(config)
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let label = if diagnostic.is_error() { "error" } else { "warning" };
        println!("   {} {}", label, diagnostic);
    }
}

fn validate_graph(file: &Path, json: bool) -> Result<()> {
    let graph = load_graph(file)?;
    let diagnostics = graph.validate();
    let errors = count_errors(&diagnostics);

    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        let stats = graph.stats();
        println!("🔍 Validating graph: {}", graph.name);
        println!("   Nodes: {} ({} graph nodes)", stats.node_count(), stats.graph_nodes);
        println!(
            "   Connections: {} ({} internal)",
            stats.connection_count(),
            stats.internal_connections
        );
        println!("   Depth: {}", stats.max_depth);
        if diagnostics.is_empty() {
            println!("✅ Graph is valid");
        } else {
            println!();
            print_diagnostics(&diagnostics);
        }
    }

    if errors > 0 {
        bail!("{} has {} structural errors", file.display(), errors);
    }
    Ok(())
}

fn show_segments(file: &Path, json: bool) -> Result<()> {
    let graph = load_graph(file)?;
    let resolution = ScopeResolver::new(&graph).resolve_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    for resolved in &resolution.resolved {
        println!("{}", resolved.connection_id);
        for segment in &resolved.segments {
            println!(
                "   [{}] {}.{} -> {}.{}",
                segment.scope_node_id.as_deref().unwrap_or("root"),
                segment.source_node_id,
                segment.source_port_id,
                segment.target_node_id,
                segment.target_port_id
            );
        }
    }
    if !resolution.diagnostics.is_empty() {
        println!();
        print_diagnostics(&resolution.diagnostics);
    }
    Ok(())
}

fn wire_graph(file: &Path, config: CompilerConfig, json: bool) -> Result<()> {
    let graph = load_graph(file)?;
    let compiler = FlowCompiler::new(config);
    let compilation = compiler
        .compile(&graph)
        .with_context(|| format!("Failed to compile {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&compilation)?);
        return Ok(());
    }

    println!("🔧 Wiring plan for {} ({} mode)", graph.name, compiler.config().mode);
    for statement in &compilation.plan.statements {
        println!("   {}", statement);
    }
    match compilation.plan.topological_order() {
        Ok(order) => println!("   Start order: {}", order.join(", ")),
        Err(err) => println!("   No start order: {}", err),
    }
    if !compilation.diagnostics.is_empty() {
        println!();
        print_diagnostics(&compilation.diagnostics);
    }
    Ok(())
}

fn upgrade_graph(file: &Path, output: Option<&Path>) -> Result<()> {
    let graph = load_graph(file)?;
    let (upgraded, diagnostics) = PassThruSynthesizer::new(&graph).upgrade();
    for diagnostic in &diagnostics {
        tracing::warn!("{}", diagnostic);
    }
    emit_text(&flowcodec::serialize(&upgraded), output)
}

const EXAMPLE_GRAPH: &str = r#"format 2
flowGraph "Example" version "1.0.0" {
    description "Sensor readings averaged inside a nested group"
    target "jvm"
    codeNode "Sensor" {
        type GENERATOR
        position 100.0 100.0
        output "reading" : "Int"
    }
    graphNode "Analytics" {
        position 300.0 100.0
        input "in" : "Int"
        output "mean" : "Double"
        map "in" -> "Window" "in"
        map "mean" -> "Average" "out"
        codeNode "Window" {
            type TRANSFORMER
            input "in" : "Int"
            output "out" : "Int"
        }
        codeNode "Average" {
            type TRANSFORMER
            input "in" : "Int"
            output "out" : "Double"
        }
        connect "Window" "Window.out.out" -> "Average" "Average.in.in" { capacity 8 }
    }
    codeNode "Display" {
        type SINK
        position 500.0 100.0
        input "value" : "Double"
    }
    connect "Sensor" "Sensor.out.reading" -> "Analytics" "Analytics.in.in"
    connect "Analytics" "Analytics.out.mean" -> "Display" "Display.in.value" { capacity -1 }
}
"#;

fn create_example_graph(output: &Path) -> Result<()> {
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    fs::write(output, EXAMPLE_GRAPH)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("✨ Created example graph: {}", output.display());
    println!();
    println!("Try:");
    println!("  flow validate {}", output.display());
    println!("  flow wire --mode flattened {}", output.display());
    Ok(())
}
