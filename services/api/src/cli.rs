use crate::demo::{run_demo, DemoArgs};
use crate::server;
use admissions::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "admissions",
    about = "Run the college admissions service or walk through a scripted admission cycle",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run an in-memory admission cycle, including a race for the last seats
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_defaults_to_serve() {
        let cli = Cli::try_parse_from(["admissions"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn demo_accepts_race_parameters() {
        let cli = Cli::try_parse_from([
            "admissions",
            "demo",
            "--seats",
            "1",
            "--contenders",
            "6",
            "--year",
            "2027",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Demo(args)) => {
                assert_eq!(args.seats, 1);
                assert_eq!(args.contenders, 6);
                assert_eq!(args.year, "2027");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
