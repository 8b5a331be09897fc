//! Sales command - every lot consumed by every sale as CSV

use super::CalculationArgs;
use clap::Args;
use cztax::export::write_sales_csv;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct SalesCommand {
    #[command(flatten)]
    calculation: CalculationArgs,

    /// Write the CSV to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl SalesCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let reports = self.calculation.calculate()?;
        match &self.output {
            Some(path) => {
                write_sales_csv(&reports, File::create(path)?)?;
                log::info!("Sales log written to {}", path.display());
            }
            None => write_sales_csv(&reports, io::stdout().lock())?,
        }
        Ok(())
    }
}
