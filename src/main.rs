use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;

use url_shortener::cli::{Cli, Commands, ConfigCommands};
use url_shortener::config::{AppConfig, load_config};
use url_shortener::system::logging::init_logging;
use url_shortener::system::server::run_server;

fn write_sample_config(output_path: Option<String>, force: bool) -> Result<()> {
    let sample = AppConfig::generate_sample_config();
    let Some(path) = output_path else {
        print!("{}", sample);
        return Ok(());
    };

    if Path::new(&path).exists() && !force {
        bail!("{} already exists, use --force to overwrite", path);
    }
    std::fs::write(&path, sample).with_context(|| format!("could not write {}", path))?;
    println!("Sample configuration written to {}", path);
    Ok(())
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Config {
            action: ConfigCommands::Sample { output_path, force },
        } => write_sample_config(output_path, force),
        Commands::Serve => {
            let config = match load_config(cli.config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("{}", e.format_colored());
                    std::process::exit(1);
                }
            };

            // 保持 guard 存活，确保日志写入
            let _guard = init_logging(&config)?;
            run_server(config).await
        }
    }
}
