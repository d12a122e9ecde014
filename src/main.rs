use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tabled::builder::Builder;
use tabled::{settings::Style, Table, Tabled};
use tracing_subscriber::EnvFilter;

use invoice_dbf::config::{
    clear_session, config_dir, load_config, load_session, save_session, CONFIG_TEMPLATE,
};
use invoice_dbf::dbf::read_table;
use invoice_dbf::source::parse_date;
use invoice_dbf::{
    ApiClient, Config, DateRange, ExportError, Exporter, InvoiceSource, JsonFileSource, Result,
    Session,
};

#[derive(Parser)]
#[command(name = "invoice-dbf")]
#[command(version, about = "Export invoices into legacy DBF tables", long_about = None)]
struct Cli {
    /// Path to config directory (default: XDG config dir or ~/.invoice-dbf)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with a template config.toml
    Init,

    /// Log in to the accounting API and store the access token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored access token
    Logout,

    /// Show configuration and login state
    Status,

    /// Export invoices for a date range into MOVIMCAB/MOVIMITE tables
    Export {
        /// First issue date (YYYY-MM-DD, default: today)
        #[arg(long)]
        from: Option<String>,

        /// Last issue date (YYYY-MM-DD, default: today)
        #[arg(long)]
        to: Option<String>,

        /// Output directory (default: export.output_dir from config.toml)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Read invoices from a JSON file instead of the API
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Download the tables already built by the server
        #[arg(long, conflicts_with = "input")]
        prebuilt: bool,
    },

    /// Show the structure and records of a DBF table
    Inspect {
        file: PathBuf,

        /// Number of records to print
        #[arg(short, long, default_value_t = 0)]
        rows: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "invoice_dbf=debug,warn" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Login { email, password } => cmd_login(&cfg_dir, &email, &password),
        Commands::Logout => cmd_logout(&cfg_dir),
        Commands::Status => cmd_status(&cfg_dir),
        Commands::Export {
            from,
            to,
            output_dir,
            input,
            prebuilt,
        } => cmd_export(&cfg_dir, from, to, output_dir, input, prebuilt),
        Commands::Inspect { file, rows } => cmd_inspect(&file, rows),
    }
}

/// Initialize config directory with template files
fn cmd_init(cfg_dir: &Path) -> Result<()> {
    use std::fs;

    if cfg_dir.exists() {
        return Err(ExportError::AlreadyInitialized(cfg_dir.to_path_buf()));
    }

    fs::create_dir_all(cfg_dir)?;
    fs::write(cfg_dir.join("config.toml"), CONFIG_TEMPLATE)?;

    println!("Initialized invoice-dbf config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Set the API address and output folder:  $EDITOR {}/config.toml",
        cfg_dir.display()
    );
    println!("  2. Log in:  invoice-dbf login --email <email> --password <password>");
    println!("  3. Export:  invoice-dbf export --from 2024-01-01 --to 2024-01-31");

    Ok(())
}

fn require_config(cfg_dir: &Path) -> Result<Config> {
    if !cfg_dir.exists() {
        return Err(ExportError::ConfigNotFound(cfg_dir.to_path_buf()));
    }
    load_config(cfg_dir)
}

fn cmd_login(cfg_dir: &Path, email: &str, password: &str) -> Result<()> {
    let config = require_config(cfg_dir)?;
    let mut client = ApiClient::new(&config.api.base_url, config.api.timeout());
    let token = client.login(email, password)?;

    save_session(
        cfg_dir,
        &Session {
            email: email.to_string(),
            token,
        },
    )?;
    println!("Logged in as {email}");
    Ok(())
}

fn cmd_logout(cfg_dir: &Path) -> Result<()> {
    if clear_session(cfg_dir)? {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

fn cmd_status(cfg_dir: &Path) -> Result<()> {
    let config = require_config(cfg_dir)?;
    let session = load_session(cfg_dir)?;

    println!("invoice-dbf Status");
    println!("==================");
    println!("Config:      {}", cfg_dir.display());
    println!("API:         {}", config.api.base_url);
    match session {
        Some(s) => println!("Logged in:   {}", s.email),
        None => println!("Logged in:   no"),
    }
    println!("Output dir:  {}", config.export.output_dir().display());
    println!("Header file: {}", config.export.header_file);
    println!("Detail file: {}", config.export.detail_file);
    println!("Code page:   {}", config.export.codepage);

    Ok(())
}

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "TABLE")]
    table: String,
    #[tabled(rename = "RECORDS")]
    records: usize,
    #[tabled(rename = "BYTES")]
    bytes: u64,
    #[tabled(rename = "PATH")]
    path: String,
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "TYPE")]
    kind: String,
}

fn cmd_export(
    cfg_dir: &Path,
    from: Option<String>,
    to: Option<String>,
    output_dir: Option<PathBuf>,
    input: Option<PathBuf>,
    prebuilt: bool,
) -> Result<()> {
    // A local invoice file needs no API settings
    let mut config = if cfg_dir.join("config.toml").exists() {
        load_config(cfg_dir)?
    } else if input.is_some() {
        Config::default()
    } else {
        return Err(ExportError::ConfigNotFound(cfg_dir.to_path_buf()));
    };
    if let Some(dir) = output_dir {
        config.export.output_dir = dir.to_string_lossy().to_string();
    }

    let today = Local::now().date_naive();
    let from = from.as_deref().map(parse_date).transpose()?.unwrap_or(today);
    let to = to.as_deref().map(parse_date).transpose()?.unwrap_or(today);
    let range = DateRange::new(from, to)?;

    let source: Box<dyn InvoiceSource> = match input {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => {
            let session = load_session(cfg_dir)?.ok_or(ExportError::NotLoggedIn)?;
            Box::new(
                ApiClient::new(&config.api.base_url, config.api.timeout())
                    .with_token(session.token),
            )
        }
    };

    let exporter = Exporter::new(config.export.clone());

    if prebuilt {
        let files = exporter.run_prebuilt(source.as_ref(), &range)?;
        println!("Extracted {} file(s) from the server bundle:", files.len());
        for file in files {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    let stats = exporter.run(source.as_ref(), &range)?;

    let rows = vec![
        TableRow {
            table: "header".to_string(),
            records: stats.records,
            bytes: stats.header_bytes,
            path: exporter.header_path().display().to_string(),
        },
        TableRow {
            table: "detail".to_string(),
            records: stats.detail_records,
            bytes: stats.detail_bytes,
            path: exporter.detail_path().display().to_string(),
        },
    ];

    println!("Exported {} invoice(s) from {} to {}", stats.records, from, to);
    println!("{}", Table::new(rows).with(Style::rounded()));

    if !stats.warnings.is_empty() {
        println!();
        println!("{} field(s) left blank:", stats.warnings.len());
        for warning in &stats.warnings {
            println!("  {warning}");
        }
    }

    Ok(())
}

fn cmd_inspect(file: &Path, rows: usize) -> Result<()> {
    let table = read_table(file)?;
    let info = &table.info;

    println!("File:        {}", file.display());
    println!("Records:     {}", info.records);
    println!("Record size: {} bytes", info.record_len);
    match info.last_update {
        Some(date) => println!("Updated:     {date}"),
        None => println!("Updated:     -"),
    }
    match info.codepage {
        Some(cp) => println!("Code page:   {cp}"),
        None => println!("Code page:   unknown"),
    }

    let fields: Vec<FieldRow> = info
        .fields
        .iter()
        .enumerate()
        .map(|(i, f)| FieldRow {
            index: i + 1,
            name: f.name.clone(),
            kind: f.notation(),
        })
        .collect();
    println!("{}", Table::new(fields).with(Style::rounded()));

    if rows > 0 && !table.rows.is_empty() {
        let mut builder = Builder::default();
        builder.push_record(info.fields.iter().map(|f| f.name.clone()));
        for row in table.rows.iter().take(rows) {
            builder.push_record(row.iter().map(|v| v.trim().to_string()));
        }
        println!("{}", builder.build().with(Style::rounded()));
    }

    Ok(())
}
