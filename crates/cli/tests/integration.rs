//! Integration tests for the bfs CLI
//!
//! Each test runs the binary against the local-filesystem backend
//! (`BFS_BACKEND=local:<dir>`), with objects seeded on disk at
//! `<dir>/<account>/<container>/<key>` and an isolated config directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const ACCOUNT: &str = "acct";
const CONTAINER: &str = "data";

fn url(key: &str) -> String {
    format!("https://{ACCOUNT}.blob.core.windows.net/{CONTAINER}/{key}")
}

/// Isolated storage root and config directory
struct TestEnv {
    storage: TempDir,
    config: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            storage: tempfile::tempdir().unwrap(),
            config: tempfile::tempdir().unwrap(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.storage.path().join(ACCOUNT).join(CONTAINER).join(key)
    }

    fn seed(&self, key: &str, content: &str) {
        let path = self.object_path(key);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_bfs"))
            .args(args)
            .env(
                "BFS_BACKEND",
                format!("local:{}", self.storage.path().display()),
            )
            .env("BFS_CONFIG_DIR", self.config.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute bfs")
    }

    fn run_json(&self, args: &[&str]) -> serde_json::Value {
        let mut args = args.to_vec();
        args.push("--json");
        let output = self.run(&args);
        assert!(
            output.status.success(),
            "bfs {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is JSON")
    }
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

fn seeded() -> TestEnv {
    let env = TestEnv::new();
    env.seed("2024/01/sales.csv", "id,amount\n1,10\n2,20\n");
    env.seed("2024/02/sales.csv", "id,amount\n3,30\n");
    env.seed("2024/02/notes.txt", "not a table\n");
    env.seed("2024/readme.md", "# sales\n");
    env
}

mod listing {
    use super::*;

    #[test]
    fn test_ls_lists_immediate_children() {
        let env = seeded();
        let json = env.run_json(&["ls", &url("2024")]);
        let entries: Vec<&str> = json["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e.as_str().unwrap())
            .collect();
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&"01/"));
        assert!(entries.contains(&"02/"));
        assert!(entries.contains(&"readme.md"));
    }

    #[test]
    fn test_ls_full_urls() {
        let env = seeded();
        let output = env.run(&["ls", "--full", &url("2024/02/")]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains(&url("2024/02/sales.csv")));
        assert!(stdout.contains(&url("2024/02/notes.txt")));
    }

    #[test]
    fn test_glob_matches_within_segment() {
        let env = seeded();
        let json = env.run_json(&["glob", &url("2024/*/*.csv")]);
        let mut matches: Vec<String> = json["matches"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m.as_str().unwrap().to_string())
            .collect();
        matches.sort();
        assert_eq!(
            matches,
            vec![url("2024/01/sales.csv"), url("2024/02/sales.csv")]
        );
    }

    #[test]
    fn test_glob_star_does_not_cross_folders() {
        let env = seeded();
        let json = env.run_json(&["glob", &url("2024/*.csv")]);
        assert!(json["matches"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_glob_rejects_root_wildcard() {
        let env = seeded();
        let output = env.run(&["glob", &url("*/sales.csv")]);
        assert_eq!(exit_code(&output), 2);
    }

    #[test]
    fn test_glob_requires_wildcard() {
        let env = seeded();
        let output = env.run(&["glob", &url("2024/01/sales.csv")]);
        assert_eq!(exit_code(&output), 2);
    }

    #[test]
    fn test_glob_over_queue_is_unsupported() {
        let env = seeded();
        let output = env.run(&[
            "glob",
            "https://acct.queue.core.windows.net/jobs/2024/*",
        ]);
        assert_eq!(exit_code(&output), 7);
    }
}

mod objects {
    use super::*;

    #[test]
    fn test_exists() {
        let env = seeded();
        let json = env.run_json(&["exists", &url("2024/readme.md")]);
        assert_eq!(json["exists"], true);

        let json = env.run_json(&["exists", &url("2024/missing.md")]);
        assert_eq!(json["exists"], false);
    }

    #[test]
    fn test_stat_file() {
        let env = seeded();
        let json = env.run_json(&["stat", &url("2024/readme.md")]);
        assert_eq!(json["size_bytes"], 8);
        assert_eq!(json["is_directory"], false);
    }

    #[test]
    fn test_stat_missing_is_not_found() {
        let env = seeded();
        let output = env.run(&["stat", &url("2024/missing.md")]);
        assert_eq!(exit_code(&output), 5);
    }

    #[test]
    fn test_cp_refuses_existing_destination() {
        let env = seeded();
        let src = url("2024/readme.md");
        let dst = url("archive/readme.md");

        let output = env.run(&["cp", &src, &dst]);
        assert!(output.status.success());
        assert_eq!(
            std::fs::read_to_string(env.object_path("archive/readme.md")).unwrap(),
            "# sales\n"
        );

        let output = env.run(&["cp", &src, &dst]);
        assert_eq!(exit_code(&output), 6);

        let output = env.run(&["cp", "--force", &src, &dst]);
        assert!(output.status.success());
    }

    #[test]
    fn test_rm() {
        let env = seeded();
        let output = env.run(&["rm", &url("2024/02/notes.txt")]);
        assert!(output.status.success());
        assert!(!env.object_path("2024/02/notes.txt").exists());

        let output = env.run(&["rm", &url("2024/02/notes.txt")]);
        assert_eq!(exit_code(&output), 5);
    }

    #[test]
    fn test_malformed_url_is_usage_error() {
        let env = seeded();
        let output = env.run(&["stat", "acct/data/2024/readme.md"]);
        assert_eq!(exit_code(&output), 2);
    }
}

mod tables {
    use super::*;

    #[test]
    fn test_cat_concatenates_globbed_tables() {
        let env = seeded();
        let json = env.run_json(&["cat", &url("2024/*/sales.csv")]);
        assert_eq!(json["row_count"], 3);
        assert_eq!(json["columns"], serde_json::json!(["id", "amount"]));
    }

    #[test]
    fn test_cat_parallel_with_limit() {
        let env = seeded();
        let json = env.run_json(&[
            "cat",
            &url("2024/01/sales.csv"),
            &url("2024/02/sales.csv"),
            "--parallel",
            "--workers",
            "2",
            "--limit",
            "1",
        ]);
        assert_eq!(json["row_count"], 3);
        assert_eq!(json["rows"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_cat_human_output() {
        let env = seeded();
        let output = env.run(&["cat", "--no-color", &url("2024/01/sales.csv")]);
        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("amount"));
        assert!(stdout.contains("20"));
    }

    #[test]
    fn test_cat_fills_empty_column_from_other_files() {
        let env = TestEnv::new();
        env.seed("daily/d1.csv", "id,v\n1,\n2,\n");
        env.seed("daily/d2.csv", "id,v\n3,4\n5,6\n");
        let json = env.run_json(&["cat", &url("daily/*.csv")]);
        assert_eq!(json["row_count"], 4);
        assert_eq!(json["rows"][2]["v"], 4);
    }

    #[test]
    fn test_cat_missing_object_fails() {
        let env = seeded();
        let output = env.run(&["cat", &url("2024/01/sales.csv"), &url("2024/09/sales.csv")]);
        assert_eq!(exit_code(&output), 5);
    }

    #[test]
    fn test_cat_no_matches_fails() {
        let env = seeded();
        let output = env.run(&["cat", &url("2024/*/costs.csv")]);
        assert_eq!(exit_code(&output), 1);
    }
}

mod accounts {
    use super::*;

    fn config_file(dir: &Path) -> PathBuf {
        dir.join("config.toml")
    }

    #[test]
    fn test_account_lifecycle() {
        let env = TestEnv::new();

        let json = env.run_json(&["account", "set", "prod", "--access-key", "secret"]);
        assert_eq!(json["success"], true);
        assert!(config_file(env.config.path()).exists());

        let json = env.run_json(&["account", "list"]);
        let accounts = json["accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0]["name"], "prod");
        assert_eq!(accounts[0]["has_access_key"], true);

        let json = env.run_json(&["account", "remove", "prod"]);
        assert_eq!(json["success"], true);

        let json = env.run_json(&["account", "list"]);
        assert!(json["accounts"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_remove_unknown_account() {
        let env = TestEnv::new();
        let output = env.run(&["account", "remove", "ghost"]);
        assert_eq!(exit_code(&output), 5);
    }

    #[test]
    fn test_invalid_account_name() {
        let env = TestEnv::new();
        let output = env.run(&["account", "set", "Prod.Store"]);
        assert_eq!(exit_code(&output), 2);
    }
}

mod completions {
    use super::*;

    #[test]
    fn test_bash_completions() {
        let env = TestEnv::new();
        let output = env.run(&["completions", "bash"]);
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("bfs"));
    }
}
