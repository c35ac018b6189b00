use crate::cli::args::{Args, Command, ConfigArgs, ConfigCommand, RunArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::{Bridge, BridgeConfig, ConnectionMultiplexer, MultiplexerOptions};
use crate::domain::config::MuxConfig;
use crate::domain::error::MuxError;
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{list_ports, SerialPortLink};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Execute CLI command
pub async fn execute_command(args: Args) -> Result<(), MuxError> {
    let writer = ConsoleWriter::new(args.output);

    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = config_manager.load_config()?;

    let run_args = match &args.command {
        None => Some(RunArgs::default()),
        Some(Command::Run(run_args)) => Some(run_args.clone()),
        Some(_) => None,
    };
    if let Some(run_args) = &run_args {
        run_args.apply(&mut config);
        config.validate()?;
    }

    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command {
        None | Some(Command::Run(_)) => execute_run(config, &writer).await,
        Some(Command::Ports) => {
            let ports = list_ports()?;
            writer.write_ports(&ports)?;
            Ok(())
        }
        Some(Command::Config(config_args)) => {
            execute_config_command(config_args, &writer, &config, &config_manager)
        }
        Some(Command::Version) => {
            writer.write_message(&format!("sermux {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Bind, open the device, then bridge until Ctrl-C or either side closes.
async fn execute_run(config: MuxConfig, writer: &ConsoleWriter) -> Result<(), MuxError> {
    let multiplexer = ConnectionMultiplexer::start_with_options(
        &config.network.bind_addr(),
        MultiplexerOptions::from(&config.network),
    )?;
    let mut link = SerialPortLink::open(&config.serial)?;
    // stale device output must not reach the first clients
    link.clear_input()?;
    let mut bridge = Bridge::new(multiplexer, link, BridgeConfig::from(&config));

    let shutdown = Arc::new(AtomicBool::new(false));
    let bridge_shutdown = Arc::clone(&shutdown);
    let mut handle = tokio::task::spawn_blocking(move || bridge.run(&bridge_shutdown));

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            shutdown.store(true, Ordering::Relaxed);
            handle.await
        }
    };

    let stats = joined.map_err(|e| MuxError::Task(e.to_string()))??;
    writer.write_bridge_stats(&stats)?;
    Ok(())
}

fn execute_config_command(
    args: ConfigArgs,
    writer: &ConsoleWriter,
    config: &MuxConfig,
    config_manager: &ConfigManager,
) -> Result<(), MuxError> {
    match args.command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let result = match &file {
                Some(path) => config_manager.load_config_from_path(Path::new(path)),
                None => config_manager.load_config(),
            };
            match result {
                Ok(_) => writer.write_message("Configuration is valid")?,
                Err(e) => {
                    writer.write_error(&format!("Configuration validation failed: {}", e))?;
                    return Err(e);
                }
            }
            Ok(())
        }
        ConfigCommand::Init { path, force } => {
            let written = config_manager.init_config(path.as_deref().map(Path::new), force)?;
            writer.write_message(&format!(
                "Configuration initialized at '{}'",
                written.display()
            ))?;
            Ok(())
        }
    }
}
