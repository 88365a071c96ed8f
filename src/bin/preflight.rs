//! Checks configuration and executor connectivity before starting the API server.

use table_editor::infra::config::{self, EditorConfig};
use table_editor::storage::connect_backend;
use table_editor::TableEditorService;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--tables]\n\
         \n\
         Reads env vars:\n\
           PG_META_URL or DATABASE_URL, QUERY_TIMEOUT_MS, READ_RETRIES, DEFAULT_PAGE_SIZE\n\
         \n\
         --tables   also list the tables of every user schema\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let list_tables = args.iter().any(|a| a == "--tables");

    // Force-read config (nice error messages if malformed)
    let editor_config = EditorConfig::from_env()?;
    println!("> Preflight:");
    match config::database_url() {
        Some(_) => println!("  DATABASE_URL=<set>"),
        None => println!("  PG_META_URL={}", config::pg_meta_url()),
    }
    println!("  QUERY_TIMEOUT_MS={}", editor_config.query_timeout.as_millis());
    println!("  READ_RETRIES={}", editor_config.read_retries);
    println!("  DEFAULT_PAGE_SIZE={}", editor_config.default_page_size);
    println!("  RECENT_TABLES_PATH={}", config::recent_tables_path().display());

    let backend = connect_backend().await?;
    println!("  Executor: {}", backend.description);
    let service = TableEditorService::new(backend.executor, backend.metadata, editor_config);

    service
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Executor ping failed: {}", e))?;
    println!("  Executor reachable (SELECT 1 ok).");

    let schemas = service.list_schemas().await?;
    println!("  User schemas: {}", schemas.len());
    for schema in &schemas {
        if list_tables {
            let tables = service.list_tables(&schema.name).await?;
            println!("    {} ({} tables)", schema.name, tables.len());
            for table in tables {
                let key = table.primary_key().unwrap_or("<no primary key>");
                println!("      {} [{}]", table.name, key);
            }
        } else {
            println!("    {}", schema.name);
        }
    }

    println!("> Preflight OK.");
    Ok(())
}
