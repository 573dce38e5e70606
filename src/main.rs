// src/main.rs

use catapply::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level, args.quiet) {
        eprintln!("catapply: {err:#}");
        std::process::exit(1);
    }

    if let Err(err) = run(args).await {
        eprintln!("catapply: {err}");
        std::process::exit(1);
    }
}
