use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = civic_worker::Args::parse();

	civic_worker::run(args).await
}
