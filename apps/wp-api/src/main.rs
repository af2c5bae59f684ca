use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = wp_api::Args::parse();

	wp_api::run(args).await
}
