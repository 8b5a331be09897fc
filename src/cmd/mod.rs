pub mod report;
pub mod sales;
pub mod schema;

use clap::Args;
use cztax::input::{self, TransactionRecord};
use cztax::rates::RateBook;
use cztax::tax::{self, CalculationOptions, Report};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Options shared by every command computing reports
#[derive(Args, Debug)]
pub struct CalculationArgs {
    /// JSON file containing transactions (or "-" for stdin)
    #[arg(short, long)]
    file: PathBuf,

    /// Last tax year to report, earlier years with sales are reported too
    #[arg(short, long)]
    year: String,

    /// CSV file with daily CZK rates (date,currency,amount,rate)
    #[arg(long)]
    day_rates: Option<PathBuf>,

    /// CSV file with unified yearly CZK rates (year,currency,rate)
    #[arg(long)]
    year_rates: Option<PathBuf>,

    /// Do not exempt lots held for more than three years
    #[arg(long)]
    no_time_test: bool,

    /// Fail when a sale is not fully covered by earlier purchases
    #[arg(long)]
    strict: bool,
}

impl CalculationArgs {
    pub fn options(&self) -> CalculationOptions {
        CalculationOptions {
            time_test: !self.no_time_test,
            strict: self.strict,
            ..Default::default()
        }
    }

    /// Read the input, resolve rates and run one calculation per asset
    /// class. Stock reports come first, then crypto reports.
    pub fn calculate(&self) -> anyhow::Result<Vec<Report>> {
        let book = self.rate_book()?;
        let records = read_records(&self.file)?;
        let options = self.options();

        let mut reports = Vec::new();
        for log in input::records_to_logs(&records, &book)? {
            reports.extend(tax::calculate(&log, &self.year, &options)?);
        }
        Ok(reports)
    }

    fn rate_book(&self) -> anyhow::Result<RateBook> {
        let mut book = RateBook::new();
        if let Some(path) = &self.day_rates {
            let count = book.read_daily_csv(BufReader::new(File::open(path)?))?;
            log::info!("Loaded {} day rates from {}", count, path.display());
        }
        if let Some(path) = &self.year_rates {
            let count = book.read_yearly_csv(BufReader::new(File::open(path)?))?;
            log::info!("Loaded {} yearly rates from {}", count, path.display());
        }
        Ok(book)
    }
}

/// Read transaction records from a JSON file (or stdin with "-")
pub fn read_records(path: &Path) -> anyhow::Result<Vec<TransactionRecord>> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        BufReader::new(io::stdin().lock()).read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        Ok(input::read_transactions_json(buffer.as_slice())?)
    } else {
        let file = File::open(path)?;
        Ok(input::read_transactions_json(BufReader::new(file))?)
    }
}
