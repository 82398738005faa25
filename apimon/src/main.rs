//! apimon CLI Entry Point

use apimon::cli::{Cli, Commands};
use apimon::{logging, MonitorConfig};
use clap::Parser;

fn main() {
    let cli = Cli::parse();

    let guard = match logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    let config = MonitorConfig::from_env();
    let result = runtime.block_on(async {
        match cli.command {
            Commands::Test(args) => apimon::cli::test::execute(&args, config).await,
            Commands::Monitor(args) => apimon::cli::monitor::execute(&args, config).await,
        }
    });

    // exit()はデストラクタを実行しないため、先にログをフラッシュする
    drop(runtime);
    drop(guard);

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
