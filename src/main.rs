use std::sync::Arc;

use log::{error, info};
use log4rs::{
    append::rolling_file::{
        policy::compound::{
            roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
        },
        RollingFileAppender,
    },
    config::{Appender, Config as LogConfig, Root},
    encode::pattern::PatternEncoder,
};
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::Mutex,
};

mod commands;
mod config;
mod database;
mod endpoints;
mod error;
mod formatter;
mod ledger;
mod money;
mod parser;
mod receipt;
mod session;
mod types;
mod validator;

use crate::commands::handle_line;
use crate::config::Config;
use crate::database::sqlite::SqliteDatabase;
use crate::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_log(&config)?;

    info!("Initializing database at {}...", config.database_path.display());
    let database = SqliteDatabase::new(&config.database_path)
        .map_err(|e| {
            error!("Cannot initialize database: {}", e);
            e
        })?;
    let database = Arc::new(Mutex::new(database));

    info!("Reading commands from standard input...");
    let mut session = Session::new();
    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    while let Some(line) = lines.next_line().await? {
        if let Some(output) = handle_line(&line, &mut session, &database).await {
            stdout.write_all(output.as_bytes()).await?;
            if !output.ends_with('\n') {
                stdout.write_all(b"\n").await?;
            }
            stdout.flush().await?;
        }
    }

    info!("Input closed, shutting down");
    Ok(())
}

fn init_log(config: &Config) -> anyhow::Result<()> {
    let log_file = config.log_dir.join("splitledger.log");
    let log_pattern = config.log_dir.join("splitledger.{}.log");

    // Roll the log file when it exceeds 10 MB.
    let size_trigger = SizeTrigger::new(10 * 1024 * 1024);

    // Keep up to 2 backup log files.
    let fixed_window_roller = FixedWindowRoller::builder()
        .build(&log_pattern.to_string_lossy(), 2)
        .map_err(|e| anyhow::anyhow!("[init log] Cannot create fixed window roller: {e}"))?;

    let compound_policy =
        CompoundPolicy::new(Box::new(size_trigger), Box::new(fixed_window_roller));

    let rolling_file_appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d} - {l} - {m}{n}")))
        .build(log_file, Box::new(compound_policy))?;

    let log_config = LogConfig::builder()
        .appender(Appender::builder().build("rolling_file", Box::new(rolling_file_appender)))
        .build(Root::builder().appender("rolling_file").build(config.log_level))?;

    log4rs::init_config(log_config)?;
    Ok(())
}
