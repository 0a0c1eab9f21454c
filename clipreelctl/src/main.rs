use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = clipreelctl::Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = clipreelctl::run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
