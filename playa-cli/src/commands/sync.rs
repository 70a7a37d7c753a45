//! Sync content packages from a catalog directory.

use anyhow::{bail, Context as _, Result};
use playa_client::{
    CancellationToken, DirectoryCatalog, DirectoryPackageStore, SyncError, SyncOrchestrator,
    SyncResult, SyncSettings,
};
use playa_core::SyncProgress;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use super::Context;

/// Run the sync command.
pub async fn run(ctx: &Context, incremental: bool, catalog: Option<PathBuf>) -> Result<()> {
    let catalog_dir = catalog
        .or_else(|| ctx.config.sync.catalog_dir.clone())
        .context("No catalog configured. Pass --catalog or set [sync] catalog_dir")?;

    let store = ctx.open_state().await?;
    let packages = DirectoryPackageStore::open(ctx.data_path(&ctx.config.storage.packages_dir))
        .await
        .context("Failed to open package directory")?;

    let mut settings = SyncSettings::new(ctx.device_id.clone(), ctx.event_id())
        .with_capacity(ctx.config.storage.capacity_bytes);
    if !ctx.config.sync.priority_packages.is_empty() {
        settings.priority_packages = Some(ctx.config.sync.priority_packages.clone());
    }

    let orchestrator = SyncOrchestrator::load(store, packages, ctx.clock.clone(), settings).await?;
    info!(catalog = %catalog_dir.display(), incremental, "Starting sync");
    let catalog = DirectoryCatalog::new(catalog_dir);

    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_progress(&event);
        }
    });

    // Ctrl-C stops between packages; whatever was installed stays installed
    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let outcome = if incremental {
        orchestrator.incremental_sync(&catalog, &tx, &cancel).await
    } else {
        orchestrator.full_sync(&catalog, &tx, &cancel).await
    };

    drop(tx);
    ctrl_c.abort();
    printer.await.context("Progress printer failed")?;

    match outcome {
        Ok(Some(result)) => {
            print_result(&result);
            if !result.success {
                bail!("{} package(s) failed to sync", result.failed_packages.len());
            }
            Ok(())
        }
        Ok(None) => {
            println!("A sync is already running");
            Ok(())
        }
        Err(SyncError::NetworkUnavailable(message)) => bail!("Catalog offline: {message}"),
        Err(SyncError::Cancelled) => {
            println!("Sync cancelled");
            Ok(())
        }
        Err(e) => Err(e).context("Sync failed"),
    }
}

fn print_progress(event: &SyncProgress) {
    match event {
        SyncProgress::Syncing {
            content_type,
            percent,
        } => {
            let label = content_type.map(|t| t.as_str()).unwrap_or("OTHER");
            println!("  [{label}] {percent}%");
        }
        SyncProgress::Complete { total_bytes } => println!("Sync complete ({total_bytes} bytes in use)"),
        SyncProgress::Failed { error } => println!("Sync failed: {error}"),
        SyncProgress::Offline { message } => println!("Catalog offline: {message}"),
        SyncProgress::Cancelled => println!("Cancelling..."),
    }
}

fn print_result(result: &SyncResult) {
    println!("Synced:   {}", result.synced_packages.len());
    for package in &result.synced_packages {
        println!("  + {} v{}", package.id, package.version);
    }
    println!("Skipped:  {}", result.skipped_packages.len());
    for package in &result.skipped_packages {
        println!("  - {} ({} bytes)", package.id, package.size_bytes);
    }
    if !result.evicted_packages.is_empty() {
        println!("Evicted:  {}", result.evicted_packages.len());
        for package in &result.evicted_packages {
            println!("  x {}", package.id);
        }
    }
    if !result.deferred_packages.is_empty() {
        println!("Deferred: {} (not installed; run a full sync)", result.deferred_packages.len());
    }
    for failure in &result.failed_packages {
        println!("Failed:   {} ({})", failure.package.id, failure.error);
    }
    println!("Storage used: {} bytes", result.total_used_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sync_without_catalog_is_an_error() {
        let dir = tempdir().unwrap();
        let ctx = Context::new(Config::default(), dir.path().to_path_buf(), None)
            .await
            .unwrap();

        let err = run(&ctx, false, None).await.unwrap_err();
        assert!(err.to_string().contains("No catalog configured"));
    }

    #[tokio::test]
    async fn sync_from_directory_installs_packages() {
        let dir = tempdir().unwrap();
        let catalog = dir.path().join("catalog");
        std::fs::create_dir_all(catalog.join("packages")).unwrap();
        std::fs::write(
            catalog.join("catalog.json"),
            r#"{
                "sync_id": "6f1c1f0e-8a34-4d3c-9a43-5c3b1f0a2b11",
                "total_size_bytes": 5,
                "content_packages": [
                    {"id": "safety", "name": "Safety", "priority": 0, "size_bytes": 5, "version": 1,
                     "content_type": "SAFETY"}
                ]
            }"#,
        )
        .unwrap();
        std::fs::write(catalog.join("packages/safety"), b"hello").unwrap();

        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let ctx = Context::new(Config::default(), data.clone(), None).await.unwrap();
        run(&ctx, false, Some(catalog)).await.unwrap();

        let stored: Vec<_> = std::fs::read_dir(data.join("packages"))
            .unwrap()
            .collect();
        assert_eq!(stored.len(), 1);
        assert!(data.join("state.db").exists());
    }
}
