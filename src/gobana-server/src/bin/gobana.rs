use clap::Parser;
use gobana_core::OutputOptions;
use gobana_server::cli::{build_handler, exit, GobanaCli};
use gobana_server::telemetry;
use std::io::Write;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = GobanaCli::parse();

    let (config, origin) = match cli.load_config() {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(exit::CONFIG);
        }
    };

    let _guard = match telemetry::init_telemetry(config.loglevel, &config.logfile) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Could not initialize logging: {:#}", e);
            return ExitCode::from(exit::CONFIG);
        }
    };
    origin.log();
    tracing::debug!(loglevel = config.loglevel, logfile = %config.logfile, "Logging configured");

    let handler = match build_handler(&config) {
        Ok(handler) => handler,
        Err(e) => {
            tracing::error!("Can't create query handler: {:#}", e);
            return ExitCode::from(exit::BUILD);
        }
    };

    let result = match handler.execute().await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(class = ?e.class(), "Query failed: {}", e);
            return ExitCode::from(exit::EXECUTE);
        }
    };

    if !config.jsonoutput.is_empty() {
        if let Err(e) = result.write_file(&config.jsonoutput) {
            tracing::error!("{}", e);
            return ExitCode::from(exit::OUTPUT);
        }
    }

    let options = OutputOptions {
        value_only: config.valueonly,
    };
    let mut stdout = std::io::stdout().lock();

    if !config.singlevalue.is_empty() {
        if let Err(e) = result.single_value(&config.singlevalue, options, &mut stdout) {
            tracing::error!("Can't print single values: {}", e);
            return ExitCode::from(exit::OUTPUT);
        }
    }

    if !config.aggregation.is_empty() {
        if let Err(e) = result.get_aggregation(&config.aggregation, options, &mut stdout) {
            tracing::error!("Can't print aggregation: {}", e);
            return ExitCode::from(exit::OUTPUT);
        }
    }

    if let Err(e) = stdout.flush() {
        tracing::error!("Can't flush output: {}", e);
        return ExitCode::from(exit::OUTPUT);
    }

    ExitCode::SUCCESS
}
