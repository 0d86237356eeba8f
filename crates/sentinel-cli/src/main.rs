use clap::Parser;
use sentinel_cli::{cli, logging, root};

fn main() {
    let cli = cli::Cli::parse();
    let root = root::resolve_root(cli.root.as_deref());

    logging::init(
        &root,
        cli.command.component(),
        cli.command.default_level(),
    );

    if let Err(e) = cli::execute(&root, cli.command, cli.json) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
