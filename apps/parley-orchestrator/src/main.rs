use clap::Parser;

use parley_orchestrator::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	parley_orchestrator::run(Args::parse()).await
}
