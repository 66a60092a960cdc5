mod app;
mod commands;
mod config;
mod feed;
mod format;
mod logging;
mod native;
mod player;
mod setup;
mod ui;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("podwave exited with error: {e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
