use clap::Parser;

const DEFAULT_CONFIG_PATH: &str = "/etc/lonelog.conf";

#[derive(Parser)]
#[command(name = "lonelog")]
#[command(version)]
#[command(about = "lonelog: a log and event pipeline daemon")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log level (trace, debug, info, warn, error); overridden by RUST_LOG
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}
