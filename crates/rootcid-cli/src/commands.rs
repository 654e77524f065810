use std::io::Read;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use serde_json::{json, Value};

use rootcid_registry::{
    Fingerprint, PublishReceipt, Registry, RegistryConfig, RegistryStatus, Retirement, RootPointer,
};

use crate::cli::*;

const DEFAULT_CONFIG: &str = "rootcid.toml";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let registry = Registry::connect(config).context("cannot set up registry")?;
    let format = cli.format;
    match cli.command {
        Command::Publish(args) => cmd_publish(&registry, args, format).await,
        Command::Commit(args) => cmd_commit(&registry, args, format).await,
        Command::Resolve(args) => cmd_resolve(&registry, args, format).await,
        Command::Status(_) => cmd_status(&registry, format).await,
        Command::Watch(args) => cmd_watch(&registry, args, format).await,
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RegistryConfig> {
    let config = match path {
        Some(path) => RegistryConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            RegistryConfig::load(Path::new(DEFAULT_CONFIG))?
        }
        None => RegistryConfig::default(),
    };
    Ok(config.apply_env())
}

fn read_document(path: &Path) -> anyhow::Result<Value> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).context("cannot read stdin")?;
        buf
    } else {
        std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?
    };
    serde_json::from_slice(&bytes).with_context(|| format!("{} is not valid JSON", path.display()))
}

async fn cmd_publish(
    registry: &Registry,
    args: PublishArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let document = read_document(&args.file)?;
    match registry.publish(&document).await {
        Ok(receipt) => print_receipt(&receipt, format),
        Err(e) => {
            if let Some(fp) = e.fingerprint() {
                eprintln!(
                    "{} document is stored; retry with `rootcid commit {fp}`",
                    "hint:".yellow().bold()
                );
            }
            Err(e.into())
        }
    }
}

async fn cmd_commit(
    registry: &Registry,
    args: CommitArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let fingerprint: Fingerprint = args.fingerprint.parse().context("invalid fingerprint")?;
    let receipt = registry.commit_stored(fingerprint).await?;
    print_receipt(&receipt, format)
}

fn print_receipt(receipt: &PublishReceipt, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&receipt_json(receipt))?);
        return Ok(());
    }
    let fingerprint = receipt.fingerprint.to_string().cyan();
    match &receipt.commit {
        Some(commit) => {
            println!("{} Published {}", "✓".green().bold(), fingerprint);
            println!("  Block: {}", commit.block.to_string().bold());
            println!("  Transaction: {}", commit.transaction.dimmed());
        }
        None => println!("{} Already current: {}", "✓".green().bold(), fingerprint),
    }
    match &receipt.retirement {
        Retirement::NotNeeded => {}
        Retirement::Failed(failed) => println!("  {} {}", "warning:".yellow().bold(), failed),
        other => println!("  {other}"),
    }
    Ok(())
}

fn receipt_json(receipt: &PublishReceipt) -> Value {
    let retirement = match &receipt.retirement {
        Retirement::NotNeeded => json!({"state": "not_needed"}),
        Retirement::Retired(fp) => json!({"state": "retired", "fingerprint": fp}),
        Retirement::Dispatched(fp) => json!({"state": "dispatched", "fingerprint": fp}),
        Retirement::Failed(failed) => json!({
            "state": "failed",
            "fingerprint": failed.fingerprint,
            "error": failed.source.to_string(),
        }),
    };
    json!({
        "fingerprint": receipt.fingerprint,
        "previous": receipt.previous,
        "commit": receipt.commit,
        "retirement": retirement,
    })
}

async fn cmd_resolve(
    registry: &Registry,
    args: ResolveArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(pointer) = args.field {
        let value = registry.resolve_field(&pointer).await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    let resolved = registry.resolve().await?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "fingerprint": resolved.fingerprint,
                "document": resolved.document,
            }))?
        ),
        OutputFormat::Text => {
            eprintln!("{} {}", "Root:".bold(), resolved.fingerprint.to_string().cyan());
            println!("{}", serde_json::to_string_pretty(&resolved.document)?);
        }
    }
    Ok(())
}

async fn cmd_status(registry: &Registry, format: OutputFormat) -> anyhow::Result<()> {
    let status = registry.status().await?;
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&status_json(&status))?);
        return Ok(());
    }
    println!("Store: {}  Ledger: {}", status.store.bold(), status.ledger.bold());
    match (&status.pointer, status.pinned) {
        (RootPointer::Unset, _) => println!("Root: {}", "unset (nothing published)".yellow()),
        (RootPointer::Set(fp), Some(false)) => {
            println!("Root: {}", fp.to_string().cyan());
            println!("  {} content is not pinned", "✗ dangling:".red().bold());
        }
        (RootPointer::Set(fp), _) => {
            println!("Root: {}", fp.to_string().cyan());
            println!("  Content: {}", "pinned ✓".green());
        }
    }
    Ok(())
}

fn status_json(status: &RegistryStatus) -> Value {
    json!({
        "pointer": status.pointer,
        "pinned": status.pinned,
        "store": status.store,
        "ledger": status.ledger,
    })
}

async fn cmd_watch(
    registry: &Registry,
    args: WatchArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut watcher = registry.watch(args.from);
    if format == OutputFormat::Text {
        eprintln!(
            "Watching root pointer from block {} (ctrl-c to stop)",
            args.from.to_string().bold()
        );
    }
    loop {
        tokio::select! {
            event = watcher.recv() => {
                let Some(event) = event else { return Ok(()) };
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string(&event)?),
                    OutputFormat::Text => println!(
                        "{} {} {}",
                        format!("#{}", event.block).yellow(),
                        event.fingerprint.to_string().cyan(),
                        event.transaction.dimmed(),
                    ),
                }
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcid_registry::CommitReceipt;

    #[test]
    fn reads_document_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"servers": []}"#).unwrap();
        assert_eq!(read_document(&path).unwrap(), json!({"servers": []}));
    }

    #[test]
    fn rejects_non_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "servers:").unwrap();
        let err = read_document(&path).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn receipt_json_shape() {
        let old = Fingerprint::compute(b"old");
        let new = Fingerprint::compute(b"new");
        let receipt = PublishReceipt {
            fingerprint: new,
            previous: RootPointer::Set(old),
            commit: Some(CommitReceipt::new(new, "0xabc", 7)),
            retirement: Retirement::Retired(old),
        };
        let value = receipt_json(&receipt);
        assert_eq!(value["fingerprint"], json!(new.to_cid_string()));
        assert_eq!(value["previous"]["state"], "set");
        assert_eq!(value["commit"]["block"], 7);
        assert_eq!(value["retirement"]["state"], "retired");
    }
}
