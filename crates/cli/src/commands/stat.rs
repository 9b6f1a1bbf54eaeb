//! stat command - Show object metadata
//!
//! Folder-like prefixes report only their name and kind.

use bfs_core::ObjectInfo;
use clap::Args;

use super::{file_client, load_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object or folder URL
    pub path: String,
}

/// Execute the stat command
pub async fn execute(args: StatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match load_config().and_then(|config| file_client(&config)) {
        Ok(client) => client,
        Err(e) => return formatter.fail(&e),
    };

    match client.info(&args.path).await {
        Ok(info) => {
            if formatter.is_json() {
                formatter.json(&info);
            } else {
                for line in describe(&info) {
                    formatter.println(&line);
                }
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

fn describe(info: &ObjectInfo) -> Vec<String> {
    let mut lines = vec![
        format!("Name      : {}", info.name),
        format!("Type      : {}", info.kind()),
    ];
    if let Some(created) = info.creation_time {
        lines.push(format!(
            "Created   : {}",
            created.strftime("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    if let Some(modified) = info.last_modified {
        lines.push(format!(
            "Modified  : {}",
            modified.strftime("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    if let Some(size) = info.size_bytes {
        match &info.size_human {
            Some(human) => lines.push(format!("Size      : {human} ({size} bytes)")),
            None => lines.push(format!("Size      : {size} bytes")),
        }
    }
    if let Some(etag) = &info.etag {
        lines.push(format!("ETag      : {etag}"));
    }
    if let Some(content_type) = &info.content_type {
        lines.push(format!("Content   : {content_type}"));
    }
    lines
}
