#[tokio::main]
async fn main() {
    if let Err(e) = azure_ad_auth_cli::run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
