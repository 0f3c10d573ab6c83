//! Binary entrypoint for the `tankobon` CLI.

#[tokio::main]
async fn main() {
    let exit_code = tankobon_cli::run().await;
    std::process::exit(exit_code);
}
