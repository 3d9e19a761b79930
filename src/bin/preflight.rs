use record_repository::infra::config::Settings;
use record_repository::storage::KeyGeneratorRegistry;
use record_repository::DatabaseService;

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--init-tables]\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL\n\
         Optional:\n\
           DATABASE_ENGINE, KEY_GENERATOR, TABLE_PREFIX, REPOSITORY_SCHEMA,\n\
           DATABASE_MAX_CONNECTIONS, DATABASE_ACQUIRE_TIMEOUT_SECS\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let init_tables = args.iter().any(|a| a == "--init-tables");

    // Fails with a readable message on missing or unresolvable settings.
    let settings = Settings::from_env()?;

    println!("> Preflight:");
    println!("  DATABASE_ENGINE={}", settings.engine);
    println!("  KEY_GENERATOR={}", settings.key_generator);
    println!("  TABLE_PREFIX={:?}", settings.table_prefix);
    println!(
        "  pool: max_connections={} acquire_timeout={}s",
        settings.pool.max_connections,
        settings.pool.acquire_timeout.as_secs()
    );

    let db_service = DatabaseService::connect(&settings, &KeyGeneratorRegistry::builtin()).await?;
    println!("  Key strategy resolved: {}", db_service.keys().name());

    db_service
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Database is not reachable: {}", e))?;
    println!("  Database reachable.");

    let tables = db_service.catalog().table_names();
    if tables.is_empty() {
        println!("  No table definitions (set REPOSITORY_SCHEMA to load some).");
    } else {
        println!("  Table definitions: {}", tables.join(", "));
    }

    if init_tables {
        for (table, created) in db_service.init_tables(false).await {
            if !created {
                return Err(anyhow::anyhow!("Failed to create table '{}'", table));
            }
            println!("  Created (if missing): {}{}", db_service.table_prefix(), table);
        }
    }

    println!("> Preflight OK.");
    Ok(())
}
