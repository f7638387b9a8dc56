//! Master Backup
//!
//! A `pg_dump` of master taken before the first mutation of a pass.

use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::{BackupConfig, DatabaseConfig};
use crate::error::{Error, Result};

/// File name of a backup taken at `now`
pub fn backup_file_name(label: &str, now: chrono::DateTime<chrono::Local>) -> String {
    format!("backup_{}_{}.sql", label, now.format("%Y%m%d_%H%M%S"))
}

/// Dump master into `backup.dir`
pub async fn backup_master(master: &DatabaseConfig, backup: &BackupConfig) -> Result<PathBuf> {
    let path = backup
        .dir
        .join(backup_file_name("master", chrono::Local::now()));

    run_pg_dump(master, &backup.pg_dump, &path).await?;
    tracing::info!("Database backup created: {}", path.display());
    Ok(path)
}

async fn run_pg_dump(master: &DatabaseConfig, pg_dump: &str, path: &Path) -> Result<()> {
    let output = Command::new(pg_dump)
        .arg("-h")
        .arg(&master.host)
        .arg("-p")
        .arg(master.port.to_string())
        .arg("-U")
        .arg(&master.user)
        .arg("-d")
        .arg(&master.database)
        .arg("-f")
        .arg(path)
        .arg("--no-password")
        .env("PGPASSWORD", &master.password)
        .output()
        .await
        .map_err(|e| Error::Backup(format!("Failed to execute {}: {}", pg_dump, e)))?;

    if !output.status.success() {
        return Err(Error::Backup(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(())
}
