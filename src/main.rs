use healthgate::cli::{output, Cli};

#[tokio::main]
async fn main() {
    // Initialize CLI and execute command
    if let Err(e) = Cli::run().await {
        output::print_error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}
