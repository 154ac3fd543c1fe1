use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "data-waster",
    version,
    about = "Consume bandwidth by downloading a URL over and over until a byte budget is spent",
    long_about = None
)]
pub struct Cli {
    /// Stop after this many megabytes have been sent and received (default 10)
    #[arg(index = 1, value_name = "MB")]
    pub megabytes: Option<String>,

    /// Number of concurrent workers
    #[arg(short = 'j', value_name = "NUM", default_value_t = crate::DEFAULT_WORKER_NUM)]
    pub workers: usize,

    /// Target URL
    #[arg(short = 'u', value_name = "URL", default_value = crate::DEFAULT_TARGET_URL)]
    pub url: String,

    /// Custom User-Agent header
    #[arg(long, value_name = "STRING")]
    pub user_agent: Option<String>,

    /// Print the error of every failed request
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub verbose: bool,
}
