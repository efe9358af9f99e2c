use clap::Parser;
use log::info;
use wolbutton::config::{Args, Config};
use wolbutton::web::App;

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("INFO"))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .init();

    let config = Config::load(args)?;
    let listen_address = config.listen_address.clone();

    let server = App::new(config).bind(listen_address)?;
    info!("Starting server on {}", server.server_addr());
    server.run();
    Ok(())
}
