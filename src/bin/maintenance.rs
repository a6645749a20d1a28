use std::{env, sync::Arc};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use pdfdigest::{
    account,
    artifacts::{PgUploadStore, StoreError},
    config::AppConfig,
    db,
    storage::{ObjectStorage, S3Storage},
};

const USAGE: &str = "Usage: maintenance delete-account <email>";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match (args.next().as_deref(), args.next()) {
        (Some("delete-account"), Some(email)) => delete_account(&email).await?,
        (Some("delete-account"), None) | (None, _) => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
        (Some(cmd), _) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn delete_account(email: &str) -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        "loaded configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;

    let objects: Arc<dyn ObjectStorage> = Arc::new(S3Storage::from_config(&config).await?);
    let uploads = PgUploadStore::new(pool.clone(), objects);

    let user = match account::find_user_by_email(&pool, email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            println!("No account registered for {email}.");
            return Ok(());
        }
        Err(err) => return Err(err).context("failed to look up account"),
    };

    println!("Deleting account {} ({})…", user.email, user.id);
    let removal = account::delete_account(&pool, &uploads, user.id)
        .await
        .context("failed to delete account")?;

    println!(
        "Account deleted; {} upload(s) removed.",
        removal.uploads_removed
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
