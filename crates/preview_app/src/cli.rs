use std::time::Duration;

use clap::{Parser, Subcommand};
use preview_core::Cursor;
use preview_engine::{CacheSettings, FetchSettings, RetryPolicy, ServiceSettings};

use crate::logging::LogDestination;

#[derive(Debug, Parser)]
#[command(name = "channel-preview")]
#[command(about = "Read public channel previews as JSON", long_about = None)]
pub struct Cli {
    /// Origin serving the preview pages
    #[arg(long, default_value = "https://t.me", global = true)]
    pub base_url: String,

    /// Per-request upstream timeout in seconds
    #[arg(long, default_value_t = 15, global = true)]
    pub fetch_timeout: u64,

    /// Attempts per page for transient upstream failures
    #[arg(long, default_value_t = 3, global = true)]
    pub attempts: u32,

    /// Upper bound on one query in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub query_timeout: u64,

    /// Where log records go
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal, global = true)]
    pub log: LogDestination,

    /// Log debug records
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the channel descriptor
    Channel {
        /// Channel handle, with or without a leading '@'
        handle: String,
    },
    /// List posts newest first
    Posts {
        /// Channel handle, with or without a leading '@'
        handle: String,

        /// Start strictly before this post number
        #[arg(long, conflicts_with_all = ["cursor", "after"])]
        before: Option<u64>,

        /// Page towards newer posts, starting strictly after this post number
        #[arg(long, conflicts_with = "cursor")]
        after: Option<u64>,

        /// Resume from a cursor token printed by an earlier page
        #[arg(long)]
        cursor: Option<Cursor>,

        /// Number of pages to walk
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Show a single post
    Post {
        /// Channel handle, with or without a leading '@'
        handle: String,

        /// Post number
        id: u64,
    },
}

impl Cli {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            base_url: self.base_url.clone(),
            request_timeout: Duration::from_secs(self.fetch_timeout),
            retry: RetryPolicy {
                max_attempts: self.attempts,
                ..RetryPolicy::default()
            },
            ..FetchSettings::default()
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings::default()
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            request_timeout: Duration::from_secs(self.query_timeout),
        }
    }
}
