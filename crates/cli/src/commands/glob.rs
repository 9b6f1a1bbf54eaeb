//! glob command - List the objects matching a wildcard pattern
//!
//! `*` matches within one path segment. The first segment below the
//! container must be literal.

use clap::Args;
use serde::Serialize;

use super::{file_client, load_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List the objects matching a wildcard pattern
#[derive(Args, Debug)]
pub struct GlobArgs {
    /// Pattern URL, e.g. https://acct.blob.core.windows.net/data/2024/*.csv
    pub pattern: String,
}

#[derive(Debug, Serialize)]
struct GlobOutput {
    pattern: String,
    matches: Vec<String>,
}

/// Execute the glob command
pub async fn execute(args: GlobArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match load_config().and_then(|config| file_client(&config)) {
        Ok(client) => client,
        Err(e) => return formatter.fail(&e),
    };

    let matches = match client.glob(&args.pattern).await {
        Ok(matches) => matches,
        Err(e) => return formatter.fail(&e),
    };

    if formatter.is_json() {
        formatter.json(&GlobOutput {
            pattern: args.pattern,
            matches,
        });
    } else {
        for url in &matches {
            formatter.println(url);
        }
    }
    ExitCode::Success
}
