use clap::Parser;
use env_logger::Builder;
use log::{debug, LevelFilter};

use bgpd_contacts::cli::{self, Args};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();

    let (contacts_level, other_level) = match args.verbose {
        0 => (LevelFilter::Info, LevelFilter::Warn),
        1 => (LevelFilter::Debug, LevelFilter::Warn),
        2 => (LevelFilter::Trace, LevelFilter::Warn),
        _ => (LevelFilter::Trace, LevelFilter::Trace),
    };
    Builder::new()
        .filter(Some("bgpd_contacts"), contacts_level)
        .filter(None, other_level)
        .init();
    debug!("Logging at levels {}/{}", contacts_level, other_level);

    cli::run(&args).await;
}
