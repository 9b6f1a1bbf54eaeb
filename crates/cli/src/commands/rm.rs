//! rm command - Remove one object

use clap::Args;
use serde::Serialize;

use super::{file_client, load_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object URL
    pub path: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    path: String,
    removed: bool,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match load_config().and_then(|config| file_client(&config)) {
        Ok(client) => client,
        Err(e) => return formatter.fail(&e),
    };

    match client.rm(&args.path).await {
        Ok(removed) => {
            if formatter.is_json() {
                formatter.json(&RmOutput {
                    path: args.path,
                    removed,
                });
            } else {
                formatter.success(&format!("Removed {}", args.path));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}
