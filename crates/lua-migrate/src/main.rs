//! lua-migrate CLI
//!
//! Renders Lua migration scripts to SQL.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use lua_migrate::prelude::*;

/// Lua-scripted database migrations compiled to SQL.
#[derive(Parser)]
#[command(name = "lua-migrate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one script file.
    Render {
        /// Script path, e.g. `migrations/1_create_user.lua`.
        file: PathBuf,

        /// Entry function or alias (up, down, safeUp, safeDown, ...).
        #[arg(short, long, default_value = "up")]
        method: String,
    },

    /// List the versions of a source.
    List {
        /// Source locator, e.g. `lua://migrations?vm=main`.
        #[arg(short, long, env = "LUA_MIGRATE_SOURCE")]
        source: String,
    },

    /// Show the SQL of one version.
    Show {
        /// Source locator, e.g. `lua://migrations?vm=main`.
        #[arg(short, long, env = "LUA_MIGRATE_SOURCE")]
        source: String,

        /// Migration version.
        #[arg(long)]
        version: u64,

        /// Show the revert SQL instead of the apply SQL.
        #[arg(short, long)]
        down: bool,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let context = Arc::new(SchemaContext::from_env());
    let sessions = Arc::new(SessionPool::new(context));
    let stores = Arc::new(FsPool::new());

    match cli.command {
        Commands::Render { file, method } => {
            let name = file
                .file_name()
                .with_context(|| format!("not a script file: {}", file.display()))?
                .to_string_lossy()
                .into_owned();
            let dir = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), PathBuf::from);

            let fs: Arc<dyn ScriptFs> = Arc::new(LocalFs::new(dir)?);
            let session = sessions.get_must("cli")?;
            let source = Arc::new(ScriptSource::new(Arc::clone(&fs), session)).bind(&name)?;
            let rendered = source.read(&method);
            source.close();
            fs.close()?;

            print!("{}", rendered?.sql);
        }

        Commands::List { source } => {
            let driver = LuaScriptDriver::new(sessions, stores).open_url(&source)?;
            let migrations = driver.migrations();
            if migrations.is_empty() {
                info!("No migrations found in {}", source);
            } else {
                println!("\nMigrations:");
                println!("{:-<60}", "");
                for (version, name) in &migrations {
                    println!(" {version:>14}  {name}");
                }
                println!();
            }
            driver.close()?;
        }

        Commands::Show {
            source,
            version,
            down,
        } => {
            let driver = LuaScriptDriver::new(sessions, stores).open_url(&source)?;
            let rendered = if down {
                driver.read_down(version)
            } else {
                driver.read_up(version)
            };
            driver.close()?;

            let rendered = rendered?;
            info!("-- {} ({})", rendered.identifier, rendered.entry);
            print!("{}", rendered.sql);
        }
    }

    Ok(())
}
