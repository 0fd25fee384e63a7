use clap::Parser;
use dotenv::dotenv;
use log::error;
use persona_chat::cli::Args;
use persona_chat::error::ChatError;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match persona_chat::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(config_err) = e.downcast_ref::<ChatError>() {
                error!("Startup aborted: {}", config_err);
            } else {
                error!("Server stopped: {}", e);
            }
            ExitCode::FAILURE
        }
    }
}
