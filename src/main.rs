use clap::Parser;
use env_logger::Env;
use sortodoco::cli::{Cli, run};
use sortodoco::output::OutputFormatter;

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    if let Err(e) = run(cli) {
        OutputFormatter::error(&e.to_string());
        std::process::exit(e.exit_code() as i32);
    }
}
