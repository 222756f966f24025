use clap::Parser;

use parley_worker::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	parley_worker::run(Args::parse()).await
}
