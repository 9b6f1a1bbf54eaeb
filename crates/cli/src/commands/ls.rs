//! ls command - List the entries directly below a folder
//!
//! Sub-folders are listed once, with a trailing `/`.

use clap::Args;
use serde::Serialize;

use super::{file_client, load_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List the entries directly below a folder
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Folder URL (scheme://account.kind.domain/container[/folder])
    pub path: String,

    /// Print full URLs instead of names
    #[arg(short, long)]
    pub full: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    path: String,
    entries: Vec<String>,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match load_config().and_then(|config| file_client(&config)) {
        Ok(client) => client,
        Err(e) => return formatter.fail(&e),
    };

    let entries = match client.ls(&args.path, args.full).await {
        Ok(entries) => entries,
        Err(e) => return formatter.fail(&e),
    };

    if formatter.is_json() {
        formatter.json(&LsOutput {
            path: args.path,
            entries,
        });
    } else {
        for entry in &entries {
            formatter.println(entry);
        }
    }
    ExitCode::Success
}
