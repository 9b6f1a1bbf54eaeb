//! cat command - Load tables and print them
//!
//! Every path is read with the same format and the tables are
//! concatenated; columns are unioned and widened to a common type.
//! Wildcard paths are expanded before loading.

use arrow::json::ArrayWriter;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use bfs_core::{Compression, Error, FileClient, FileFormat, Result, Table};
use clap::Args;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use serde::Serialize;

use super::{file_client, load_config};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Load tables and print them
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Table URLs; `*` expands within one path segment
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Table format: csv, tsv, parquet or pickle (inferred from the extension by default)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Compression of the stored bytes: none, gzip, bz2 or xz
    #[arg(long)]
    pub compression: Option<String>,

    /// Read objects concurrently
    #[arg(short, long)]
    pub parallel: bool,

    /// Maximum concurrent reads with --parallel
    #[arg(long)]
    pub workers: Option<usize>,

    /// Print at most this many rows
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct CatOutput {
    row_count: usize,
    columns: Vec<String>,
    rows: serde_json::Value,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);
    match run(args, &formatter).await {
        Ok(()) => ExitCode::Success,
        Err(e) => formatter.fail(&e),
    }
}

async fn run(args: CatArgs, formatter: &Formatter) -> Result<()> {
    let config = load_config()?;
    let client = file_client(&config)?;
    let format = resolve_format(&args, &config.defaults.format)?;
    let urls = expand(&client, &args.paths).await?;

    let spinner = ProgressBar::spinner(
        formatter.config(),
        &format!("Loading {} object(s)", urls.len()),
    );
    let loaded = client
        .read(urls, format, args.parallel, args.workers)
        .await;
    spinner.finish_and_clear();
    let table = loaded?;

    let total = table.num_rows();
    let shown = args.limit.map_or(total, |limit| limit.min(total));
    let table = table.slice(0, shown);

    if formatter.is_json() {
        formatter.json(&CatOutput {
            row_count: total,
            columns: column_names(&table),
            rows: json_rows(&table)?,
        });
    } else {
        formatter.println(&render(&table)?.to_string());
        if shown < total {
            formatter.warning(&format!("Showing {shown} of {total} rows"));
        }
    }
    Ok(())
}

/// Explicit `--format`, else the first path's extension, else the configured default
fn resolve_format(args: &CatArgs, default_format: &str) -> Result<FileFormat> {
    let format = match &args.format {
        Some(name) => FileFormat::from_name(name)?,
        None => match args
            .paths
            .first()
            .and_then(|path| FileFormat::from_path(path).ok())
        {
            Some(format) => format,
            None => FileFormat::from_name(default_format)?,
        },
    };

    let Some(compression) = &args.compression else {
        return Ok(format);
    };
    let compression: Compression = compression.parse()?;
    match format {
        FileFormat::Delimited { delimiter, .. } => Ok(FileFormat::Delimited {
            delimiter,
            compression,
        }),
        FileFormat::Serialized { .. } => Ok(FileFormat::Serialized { compression }),
        FileFormat::Columnar => Err(Error::InvalidInput(
            "--compression does not apply to parquet".into(),
        )),
    }
}

async fn expand(client: &FileClient, paths: &[String]) -> Result<Vec<String>> {
    let mut urls = Vec::with_capacity(paths.len());
    for path in paths {
        if path.contains('*') {
            let matched = client.glob(path).await?;
            tracing::debug!(pattern = %path, matched = matched.len(), "expanded");
            urls.extend(matched);
        } else {
            urls.push(path.clone());
        }
    }
    Ok(urls)
}

fn column_names(table: &Table) -> Vec<String> {
    table
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect()
}

fn render(table: &Table) -> Result<comfy_table::Table> {
    let options = FormatOptions::default().with_null("");
    let formatters = table
        .columns()
        .iter()
        .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rendered = comfy_table::Table::new();
    rendered.load_preset(UTF8_FULL_CONDENSED);
    rendered.set_header(column_names(table));
    for row in 0..table.num_rows() {
        rendered.add_row(
            formatters
                .iter()
                .map(|formatter| formatter.value(row).to_string())
                .collect::<Vec<_>>(),
        );
    }
    Ok(rendered)
}

fn json_rows(table: &Table) -> Result<serde_json::Value> {
    let mut writer = ArrayWriter::new(Vec::new());
    writer.write_batches(&[table])?;
    writer.finish()?;
    let buffer = writer.into_inner();
    if buffer.is_empty() {
        return Ok(serde_json::Value::Array(Vec::new()));
    }
    Ok(serde_json::from_slice(&buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn args(paths: &[&str]) -> CatArgs {
        CatArgs {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            format: None,
            compression: None,
            parallel: false,
            workers: None,
            limit: None,
        }
    }

    fn table() -> Table {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]);
        Table::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(StringArray::from(vec![Some("ada"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        let format =
            resolve_format(&args(&["https://a.blob.x/c/2024/*.tsv.gz"]), "csv").unwrap();
        assert_eq!(
            format,
            FileFormat::Delimited {
                delimiter: b'\t',
                compression: Compression::Gzip
            }
        );
    }

    #[test]
    fn test_format_falls_back_to_default() {
        let format = resolve_format(&args(&["https://a.blob.x/c/export"]), "parquet").unwrap();
        assert_eq!(format, FileFormat::Columnar);
    }

    #[test]
    fn test_format_with_compression() {
        let mut cat = args(&["https://a.blob.x/c/frame"]);
        cat.format = Some("pickle".into());
        cat.compression = Some("xz".into());
        assert_eq!(
            resolve_format(&cat, "csv").unwrap(),
            FileFormat::Serialized {
                compression: Compression::Xz
            }
        );

        cat.format = Some("parquet".into());
        assert!(matches!(
            resolve_format(&cat, "csv"),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unknown_format_name() {
        let mut cat = args(&["https://a.blob.x/c/a.csv"]);
        cat.format = Some("xlsx".into());
        assert!(matches!(
            resolve_format(&cat, "csv"),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_render_table() {
        let rendered = render(&table()).unwrap().to_string();
        assert!(rendered.contains("id"));
        assert!(rendered.contains("name"));
        assert!(rendered.contains("ada"));
    }

    #[test]
    fn test_json_rows() {
        let rows = json_rows(&table()).unwrap();
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["name"], "ada");
        assert!(rows[1].get("name").is_none());
    }

    #[test]
    fn test_json_rows_empty() {
        let rows = json_rows(&table().slice(0, 0)).unwrap();
        assert_eq!(rows, serde_json::json!([]));
    }
}
