//! exists command - Check whether an object or folder exists
//!
//! Prints `true` or `false`. A missing object is not an error; the exit
//! code is non-zero only when the check itself fails.

use clap::Args;
use serde::Serialize;

use super::{file_client, load_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct ExistsArgs {
    /// Object or folder URL
    pub path: String,
}

#[derive(Debug, Serialize)]
struct ExistsOutput {
    path: String,
    exists: bool,
}

/// Execute the exists command
pub async fn execute(args: ExistsArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match load_config().and_then(|config| file_client(&config)) {
        Ok(client) => client,
        Err(e) => return formatter.fail(&e),
    };

    match client.exists(&args.path).await {
        Ok(exists) => {
            if formatter.is_json() {
                formatter.json(&ExistsOutput {
                    path: args.path,
                    exists,
                });
            } else {
                formatter.println(&exists.to_string());
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}
