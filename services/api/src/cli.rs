use crate::demo::{run_demo, DemoArgs};
use crate::server;
use armonia::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Armonía",
    about = "Run the Armonía condominium backend or walk through an assembly from the command line",
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
    /// Run an owners' assembly end to end against in-memory storage
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
        Command::Demo(args) => run_demo(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["armonia-api"]).expect("parses without arguments");
        assert!(cli.command.is_none());
    }

    #[test]
    fn demo_accepts_a_schema() {
        let cli = Cli::try_parse_from(["armonia-api", "demo", "--schema", "torres_del_parque"])
            .expect("parses demo");
        match cli.command {
            Some(Command::Demo(args)) => assert_eq!(args.schema.as_str(), "torres_del_parque"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_overrides_are_optional() {
        let cli = Cli::try_parse_from(["armonia-api", "serve", "--port", "8080"])
            .expect("parses serve");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.port, Some(8080));
                assert!(args.host.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
