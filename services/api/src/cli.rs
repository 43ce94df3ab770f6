use crate::demo::{run_demo, run_portfolio_report, run_search_report, DemoArgs, PortfolioArgs, SearchArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use lern::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "LERN",
    about = "Serve and explore learner competency portfolios from the command line",
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
    /// Print a learner's public portfolio from the demo dataset or a ratings export
    Portfolio(PortfolioArgs),
    /// Find learners meeting every competency threshold
    Search(SearchArgs),
    /// Walk through ratings, onboarding, portfolios, and search end to end
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
    /// Preload the demo organization, learners, and ratings
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Portfolio(args) => run_portfolio_report(args),
        Command::Search(args) => run_search_report(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
