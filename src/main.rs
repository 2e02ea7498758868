use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lark_host::host::Buffer;
use lark_host::{Bridge, ConfigEngine, Host, HostSettings, MemoryHost, rpc};

#[derive(Parser)]
#[command(name = "lark-host", version, about = "Rhai script host for the lark editor")]
struct Cli {
    /// Config script (defaults to <config dir>/lark/host.rhai)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_filter: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve bridge requests over stdin/stdout
    Serve,

    /// Apply a body to every line of a file, in place
    Apply {
        file: PathBuf,

        /// First line, 1-based
        #[arg(long, default_value_t = 1)]
        start: i64,

        /// Last line, inclusive (defaults to the end of the file)
        #[arg(long)]
        stop: Option<i64>,

        /// Rhai code run with `line` and `linenr`; return text, or () to delete
        #[arg(long)]
        body: String,

        /// Script run first, in the same context
        #[arg(long)]
        setup: Option<PathBuf>,

        /// Runtime directories searched by `import`
        #[arg(long = "runtime-path")]
        runtime_paths: Vec<PathBuf>,
    },
}

fn load_settings(path: Option<&Path>) -> Result<HostSettings, String> {
    let mut config = ConfigEngine::new();
    match path {
        Some(path) => config.load_file(path)?,
        None => config.load_default()?,
    }
    Ok(config.settings())
}

fn apply_file(
    settings: HostSettings,
    file: PathBuf,
    start: i64,
    stop: Option<i64>,
    body: &str,
    setup: Option<PathBuf>,
    runtime_paths: Vec<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let host = MemoryHost::with_buffer(Buffer::from_file(file.clone())?);
    host.set_runtime_paths(runtime_paths);
    let stop = match stop {
        Some(stop) => stop,
        None => host.line_count()? as i64,
    };

    let mut bridge = Bridge::new(Arc::new(host.clone()), settings);
    let result = setup
        .map(|setup| bridge.execute_file(&setup, start, stop))
        .unwrap_or(Ok(()))
        .and_then(|_| bridge.apply_range(start, stop, body));
    bridge.teardown();

    print!("{}", host.output());
    eprint!("{}", host.errors());

    let stats = result.map_err(|e| e.to_response().text)?;
    host.save()?;
    info!(
        "{}: {} lines, {} replaced, {} deleted",
        file.display(),
        stats.lines,
        stats.replaced,
        stats.deleted
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let filter = cli
        .log_filter
        .clone()
        .unwrap_or_else(|| settings.log_filter.clone());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Serving on stdio");
            rpc::serve(tokio::io::stdin(), tokio::io::stdout(), settings).await?;
        }
        Command::Apply {
            file,
            start,
            stop,
            body,
            setup,
            runtime_paths,
        } => apply_file(settings, file, start, stop, &body, setup, runtime_paths)?,
    }

    Ok(())
}
