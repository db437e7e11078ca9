use depotfetch_lib::cli::{ResolvedCommand, parse_args, resolve_command, run_download, run_verify};
use depotfetch_lib::error::DepotFetchError;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), DepotFetchError> {
    color_eyre::install()?;

    let args = parse_args();
    let command = resolve_command(args.command)?;

    match command {
        ResolvedCommand::Download(params) => run_download(params).await?,
        ResolvedCommand::Verify(params) => run_verify(params).await?,
    }

    Ok(())
}
