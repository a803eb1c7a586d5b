//! Seclog CLI binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use seclog_cli::cli::{Cli, Commands, LogFormat};
use seclog_cli::commands::{
    ActiveCommand, ArchiveNowCommand, ArchivesCommand, DaemonCommand, StatsCommand, WriteCommand,
};
use seclog_cli::output::OutputFormat;
use seclog_core::SecurityLogService;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), seclog_cli::CliError> {
    let config = cli.engine_config()?;
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    let service = Arc::new(SecurityLogService::new(config)?);

    match cli.command {
        Commands::Active(args) => {
            let cmd = ActiveCommand::new(&service);
            cmd.execute(&mut stdout, &format, &args)?;
        }
        Commands::Archives => {
            let cmd = ArchivesCommand::new(&service);
            cmd.list(&mut stdout, &format)?;
        }
        Commands::Archive { id, page } => {
            let cmd = ArchivesCommand::new(&service);
            cmd.show(&mut stdout, &format, &id, &page)?;
        }
        Commands::ArchiveNow => {
            let cmd = ArchiveNowCommand::new(&service);
            cmd.execute(&mut stdout, &format)?;
        }
        Commands::Stats => {
            let cmd = StatsCommand::new(&service);
            cmd.execute(&mut stdout, &format)?;
        }
        Commands::Write(args) => {
            let cmd = WriteCommand::new(&service.config().log_root);
            cmd.execute(&mut stdout, &format, &args)?;
        }
        Commands::Daemon { interval } => {
            let cmd = DaemonCommand::new(service);
            cmd.execute(&mut stdout, &format, interval).await?;
        }
    }

    Ok(())
}
