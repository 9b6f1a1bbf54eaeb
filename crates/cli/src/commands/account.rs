//! Account management commands
//!
//! Accounts hold the credentials and endpoint used for every URL whose
//! first host label names them. URLs for unconfigured accounts fall back
//! to credentials from the environment.

use bfs_core::{Account, AccountManager, Error};
use clap::Subcommand;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Account subcommands
#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Add or update an account
    Set(SetArgs),

    /// List all configured accounts
    List(ListArgs),

    /// Remove an account
    Remove(RemoveArgs),
}

/// Arguments for the `account set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Account name, the first label of the URL host
    pub name: String,

    /// Shared access key
    #[arg(long, env = "BFS_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Custom service endpoint (e.g., "http://127.0.0.1:10000")
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Talk to the local storage emulator
    #[arg(long, default_value = "false")]
    pub emulator: bool,
}

/// Arguments for the `account list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show endpoint and emulator settings
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `account remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the account to remove
    pub name: String,
}

/// Account information for JSON output (without the access key)
#[derive(Serialize)]
struct AccountInfo {
    name: String,
    has_access_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    use_emulator: bool,
}

impl From<&Account> for AccountInfo {
    fn from(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            has_access_key: account.access_key.is_some(),
            endpoint: account.endpoint.clone(),
            use_emulator: account.use_emulator,
        }
    }
}

#[derive(Serialize)]
struct AccountListOutput {
    accounts: Vec<AccountInfo>,
}

#[derive(Serialize)]
struct AccountOperationOutput {
    success: bool,
    account: String,
}

/// Execute an account subcommand
pub fn execute(cmd: AccountCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    let manager = match AccountManager::new() {
        Ok(manager) => manager,
        Err(e) => return formatter.fail(&e),
    };

    match cmd {
        AccountCommands::Set(args) => execute_set(args, &manager, &formatter),
        AccountCommands::List(args) => execute_list(args, &manager, &formatter),
        AccountCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn execute_set(args: SetArgs, manager: &AccountManager, formatter: &Formatter) -> ExitCode {
    if let Err(e) = validate_name(&args.name) {
        return formatter.fail(&e);
    }

    let mut account = Account::new(&args.name);
    if let Some(key) = args.access_key {
        account = account.with_access_key(key);
    }
    if let Some(endpoint) = args.endpoint {
        account = account.with_endpoint(endpoint);
    }
    account.use_emulator = args.emulator;

    match manager.set(account) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&AccountOperationOutput {
                    success: true,
                    account: args.name,
                });
            } else {
                formatter.success(&format!("Account '{}' configured.", args.name));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

fn execute_list(args: ListArgs, manager: &AccountManager, formatter: &Formatter) -> ExitCode {
    let accounts = match manager.list() {
        Ok(accounts) => accounts,
        Err(e) => return formatter.fail(&e),
    };

    if formatter.is_json() {
        formatter.json(&AccountListOutput {
            accounts: accounts.iter().map(AccountInfo::from).collect(),
        });
    } else if accounts.is_empty() {
        formatter.println("No accounts configured.");
    } else {
        for account in &accounts {
            if args.long {
                formatter.println(&format!(
                    "{:<16} endpoint: {}, emulator: {}, key: {}",
                    account.name,
                    account.endpoint.as_deref().unwrap_or("default"),
                    account.use_emulator,
                    if account.access_key.is_some() { "set" } else { "from environment" },
                ));
            } else {
                formatter.println(&account.name);
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &AccountManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&AccountOperationOutput {
                    success: true,
                    account: args.name,
                });
            } else {
                formatter.success(&format!("Account '{}' removed.", args.name));
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&e),
    }
}

/// Account names are DNS labels: lowercase letters and digits
fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidInput("Account name cannot be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(Error::InvalidInput(format!(
            "Account name '{name}' must contain only lowercase letters and digits"
        )));
    }
    Ok(())
}
