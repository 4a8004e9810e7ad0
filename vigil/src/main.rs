use vigil::commands::command_argument_builder;
use vigil::handlers::{config_from_matches, handle_scan, tracing_level_for};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = command_argument_builder();
    let matches = cmd.get_matches();

    let config = config_from_matches(&matches)?;
    tracing_subscriber::fmt()
        .with_max_level(tracing_level_for(config.verbosity))
        .init();

    if !matches.get_flag("quiet") {
        vigil_core::print_banner();
    }

    handle_scan(&matches, &config).await
}
