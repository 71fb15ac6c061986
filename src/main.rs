use clap::Parser;
use imagerelay::config::setup_logging;
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = imagerelay::cli::CliOptions::parse();

    if let Err(err) = setup_logging(cli.debug) {
        eprintln!("Logging setup error: {}", err);
        return;
    }

    let relay = match cli.build_relay() {
        Ok(relay) => relay,
        Err(err) => {
            error!("Configuration error: {:#}", err);
            return;
        }
    };

    if let Err(err) =
        imagerelay::web::setup_server(&cli.listen_address, cli.port, relay).await
    {
        error!("Application error: {}", err);
    }
}
