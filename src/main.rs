use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod config;
mod console;
mod gitlab;
mod issue;
mod ledger;
mod logger;
mod note;
mod report_command;
mod time_entry;

use config::Config;
use console::Layout;
use report_command::{report_command, ReportArgs};

/// GitLabのissueに記録された作業時間を集計するCLIアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run -- day --filter-by-author alice --filter-by-date-begin 2024-01-01
/// $ cargo run -- issue --filter-by-search my-group --filter-by-milestone v1.0
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(long, global = true, help = "Print out processing steps")]
    debug: bool,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。サブコマンドごとに集計単位が異なる。
#[derive(Debug, Subcommand)]
enum SubCommands {
    #[clap(about = "Show every time entry")]
    Entries(ReportArgs),
    #[clap(about = "Show time spent per day")]
    Day(ReportArgs),
    #[clap(about = "Show time spent per issue")]
    Issue(ReportArgs),
    #[clap(about = "Show time spent per user")]
    User(ReportArgs),
}

impl SubCommands {
    fn into_parts(self) -> (Layout, ReportArgs) {
        match self {
            SubCommands::Entries(args) => (Layout::Entries, args),
            SubCommands::Day(args) => (Layout::Day, args),
            SubCommands::Issue(args) => (Layout::Issue, args),
            SubCommands::User(args) => (Layout::User, args),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logger::init(args.debug)?;
    let config = Config::load().context("Failed to load config")?;

    let (layout, report_args) = args.subcommand.into_parts();
    report_command(layout, report_args, &config).await?;

    Ok(())
}
