//! cp command - Copy one object
//!
//! Bytes are copied as stored; compressed objects stay compressed.

use clap::Args;
use serde::Serialize;

use super::{file_client, load_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy one object
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source object URL
    pub source: String,

    /// Destination object URL
    pub target: String,

    /// Replace the destination if it exists
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    source: String,
    target: String,
    copied: bool,
}

/// Execute the cp command
pub async fn execute(args: CpArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match load_config().and_then(|config| file_client(&config)) {
        Ok(client) => client,
        Err(e) => return formatter.fail(&e),
    };

    match client.cp(&args.source, &args.target, args.force).await {
        Ok(copied) => {
            if formatter.is_json() {
                formatter.json(&CpOutput {
                    source: args.source,
                    target: args.target,
                    copied,
                });
            } else {
                formatter.success(&format!("{} -> {}", args.source, args.target));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}
