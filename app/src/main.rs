use clap::Parser;
use deferred_app::{AppArgs, run};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    deferred_graphics::init();

    let args = AppArgs::parse();
    log::debug!("{:?}", args);

    match run(&args) {
        Ok(summary) => log::info!("{summary}"),
        Err(e) => deferred_graphics::error::fatal("frame loop", &e),
    }
}
