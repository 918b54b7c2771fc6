use log::error;
use timetabling::config::ServerConfig;
use timetabling::server;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(2);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .init();

    if let Err(e) = server::run_server(&config).await {
        error!("server stopped: {e}");
        std::process::exit(1);
    }
}
