mod cli;
mod logging;

use std::io::Write;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use preview_core::{ChannelId, Cursor, NextPage, PostId};
use preview_engine::{PreviewService, QueryError};
use preview_logging::{preview_error, preview_info};
use serde::Serialize;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose);

    let service = PreviewService::from_settings(
        cli.fetch_settings(),
        cli.cache_settings(),
        cli.service_settings(),
    )
    .context("building http client")?;

    match cli.command {
        Command::Channel { handle } => {
            let channel = ChannelId::parse(&handle)?;
            let descriptor = service
                .get_channel(&channel)
                .await
                .map_err(query_failure)?;
            print_json(&descriptor)?;
        }
        Command::Post { handle, id } => {
            let channel = ChannelId::parse(&handle)?;
            let post = service
                .get_post(&channel, PostId(id))
                .await
                .map_err(query_failure)?;
            print_json(&post)?;
        }
        Command::Posts {
            handle,
            before,
            after,
            cursor,
            pages,
        } => {
            let channel = ChannelId::parse(&handle)?;
            let mut cursor = cursor
                .or_else(|| before.map(|id| Cursor::new(channel.clone(), PostId(id))))
                .or_else(|| after.map(|id| Cursor::after(channel.clone(), PostId(id))));
            for page_number in 1..=pages.max(1) {
                let page = service
                    .get_posts(&channel, cursor.as_ref())
                    .await
                    .map_err(query_failure)?;
                print_json(&page)?;
                match page.next {
                    NextPage::More(next) => cursor = Some(next),
                    NextPage::EndOfHistory => {
                        preview_info!("no more posts in {} after {} pages", channel, page_number);
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

fn query_failure(err: QueryError) -> anyhow::Error {
    preview_error!("query failed: {}", err);
    anyhow!("{} (status {})", err, err.http_status())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
