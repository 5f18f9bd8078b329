mod action;
mod app;
mod components;
mod controller;
mod http;
mod session;
mod theme;
mod widgets;

use scriba_proto::gateway::Gateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = scriba_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("scriba.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; default to debug for app code but suppress noisy
    // connection-level DEBUG from HTTP client internals (hyper_util, reqwest).
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    // Print log path to stderr so the operator can tail it immediately.
    eprintln!("scriba log: {}", log_path.display());

    tracing::info!("scriba starting…");

    let config = scriba_proto::config::Config::load().unwrap_or_default();

    let (gateway, gateway_rx) = Gateway::channel(64);
    let _driver = http::start_driver(&config.backend, gateway_rx);

    let app = app::App::new(&config, gateway);
    app.run().await
}
