//! alertconf - Bosun-style alert configuration tool
//!
//! A command-line tool for validating and inspecting alert configuration
//! files and sending test notifications.

use alertconf::cli::args::{generate_completions, Cli, Commands};
use alertconf::commands::{
    run_alerts, run_check, run_escalation, run_lookup, run_notify, run_squelched,
};
use alertconf::config::ConfigBuilder;
use alertconf::error::{AppError, ConfError, NotifyError};
use clap::Parser;

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Run the appropriate command
    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    if let Commands::Completions { shell } = &cli.command {
        generate_completions(*shell);
        return Ok(());
    }

    let http_timeout = match &cli.command {
        Commands::Notify(args) => args.http_timeout,
        _ => None,
    };

    let settings = ConfigBuilder::new()
        .with_file(cli.config.as_deref())?
        .with_verbose(cli.verbose.then_some(true))
        .with_conf_path(cli.conf.clone())
        .with_http_timeout(http_timeout)
        .build()?;

    // Set log level based on verbose flag
    if settings.general.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    match &cli.command {
        Commands::Check => run_check(&settings, cli.format),

        Commands::Alerts(args) => run_alerts(args, &settings, cli.format),

        Commands::Lookup { table, tags, key } => {
            run_lookup(table, tags, key, &settings, cli.format)
        }

        Commands::Squelched { alert, tags } => run_squelched(alert, tags, &settings, cli.format),

        Commands::Escalation { notification } => {
            run_escalation(notification, &settings, cli.format)
        }

        Commands::Notify(args) => run_notify(args, &settings, cli.format),

        Commands::Completions { .. } => Ok(()),
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Conf(ConfError::General { file, .. }) if !std::path::Path::new(file).exists() => {
            eprintln!();
            eprintln!("Hint: Pass the configuration path with --conf or set");
            eprintln!("      [conf] path in alertconf.toml.");
        }
        AppError::Notify(NotifyError::Email(_)) => {
            eprintln!();
            eprintln!("Hint: Check smtpHost and emailFrom in the configuration.");
        }
        AppError::NotFound { kind: "alert", .. } => {
            eprintln!();
            eprintln!("Hint: Run 'alertconf alerts' to list the defined alerts.");
        }
        _ => {}
    }
}
