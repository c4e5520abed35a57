use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "bingetrack",
    version,
    about = "Track episode progress on a streaming page and auto-advance playback"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the series page in a WebDriver session and run the watch loop
    Watch {
        /// Series page URL
        url: String,
        /// WebDriver endpoint to drive
        #[arg(long, default_value = "http://localhost:9515")]
        webdriver_url: String,
        /// Seconds between progress polls
        #[arg(long, default_value_t = 5)]
        interval: u64,
        /// Settling delay in seconds before simulated player interactions
        #[arg(long, default_value_t = 2)]
        settle: u64,
    },
    /// List stored per-series progress
    Progress,
    /// Show or set the skip-delay for a series
    SkipDelay {
        series_id: String,
        /// New skip-delay in seconds; omit to print the current value
        #[arg(allow_negative_numbers = true)]
        seconds: Option<i64>,
    },
    /// Drop the stored progress record for a series
    Forget { series_id: String },
}
