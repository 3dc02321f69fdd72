use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "sqlgen", version, about = "MCP server exposing a SQL database to AI agents")]
struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true, default_value = "sqlgen.yaml", env = "SQLGEN_CONFIG")]
    config: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the MCP server (SSE transport plus REST routes).
    Serve {
        /// HTTP port. Overrides the config file.
        #[arg(long)]
        port: Option<u16>,

        /// Schema document directory. Overrides the config file.
        #[arg(long)]
        schema_dir: Option<PathBuf>,
    },

    /// Extract the database schema into JSON documents.
    Extract {
        /// Output directory. Defaults to the configured schema directory.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print the tool definitions the server advertises, as JSON.
    Tools,
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    match cli.cmd {
        Command::Serve { port, schema_dir } => {
            commands::serve::run(&cli.config, port, schema_dir).await?
        }
        Command::Extract { output_dir } => commands::extract::run(&cli.config, output_dir).await?,
        Command::Tools => commands::tools::list(&cli.config)?,
    }

    Ok(())
}
