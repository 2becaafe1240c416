use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = civic_api::Args::parse();

	civic_api::run(args).await
}
