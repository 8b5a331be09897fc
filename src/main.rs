use clap::{Parser, Subcommand};

mod cmd;

/// Czech tax calculator for securities, dividends and additional income
#[derive(Parser, Debug)]
#[command(name = "cztax", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Yearly overview of sales, dividends and additional income
    Report(cmd::report::ReportCommand),
    /// CSV log of every lot consumed by every sale
    Sales(cmd::sales::SalesCommand),
    /// Print the JSON schema of the transaction input
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Report(report) => report.exec(),
        Command::Sales(sales) => sales.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
