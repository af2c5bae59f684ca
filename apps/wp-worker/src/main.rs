use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = wp_worker::Args::parse();

	wp_worker::run(args).await
}
