use crate::server;
use clap::{Args, Parser, Subcommand};
use scholarship_intake::error::AppError;
use scholarship_intake::workflows::scholarship::Rut;

#[derive(Parser, Debug)]
#[command(
    name = "Scholarship Intake",
    about = "Run the scholarship application intake service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Validate a RUT and print its canonical form
    Rut(RutArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Keep rows and documents in memory instead of Google Sheets and Drive
    #[arg(long)]
    pub(crate) offline: bool,
}

#[derive(Args, Debug)]
struct RutArgs {
    /// Identifier with or without dots and dash, e.g. 12.345.678-5
    value: String,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rut(args) => {
            println!("{}", canonical_rut(&args.value)?);
            Ok(())
        }
    }
}

fn canonical_rut(raw: &str) -> Result<String, AppError> {
    Ok(Rut::parse(raw)?.display_form())
}
