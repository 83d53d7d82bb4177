//! CLI command implementations

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use cas::{CasConfig, ContentHash, ContentStore, FileStore};
use tracing::info;

use crate::GlobalArgs;

/// Merge the config file (or environment) with command-line overrides.
fn resolve_config(global: &GlobalArgs) -> Result<CasConfig> {
    let mut config = match &global.config {
        Some(path) => CasConfig::from_file(path)?,
        None => CasConfig::from_env()?,
    };
    if let Some(store) = &global.store {
        config.base_path = store.clone();
    }
    if let Some(algorithm) = global.algorithm {
        config.algorithm = algorithm;
    }
    Ok(config)
}

/// Attach to a store that must already exist.
fn open_existing(global: &GlobalArgs) -> Result<FileStore> {
    let config = resolve_config(global)?.with_create(false);
    Ok(FileStore::new(config)?)
}

fn not_found(key: &ContentHash) -> ExitCode {
    eprintln!("not found: {}", key);
    ExitCode::FAILURE
}

/// Create the layout, optionally wiping the path first
pub fn init(global: &GlobalArgs, force: bool) -> Result<ExitCode> {
    let mut config = resolve_config(global)?.with_create(true);
    if force {
        config = config.with_force();
    }
    let store = FileStore::new(config)?;
    println!("{}", store.root().display());
    Ok(ExitCode::SUCCESS)
}

pub fn check(global: &GlobalArgs) -> Result<ExitCode> {
    let config = resolve_config(global)?;
    let root = config.base_path.display();
    if cas::is_valid_store(&config.base_path) {
        println!("valid: {}", root);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("not a valid store: {}", root);
        Ok(ExitCode::FAILURE)
    }
}

pub fn put(global: &GlobalArgs, files: &[std::path::PathBuf]) -> Result<ExitCode> {
    let store = open_existing(global)?;
    for file in files {
        let key = if file.as_os_str() == "-" {
            let mut data = Vec::new();
            io::stdin()
                .read_to_end(&mut data)
                .context("failed to read stdin")?;
            store.put_bytes(&data)?
        } else {
            store
                .put_file(file, None)
                .with_context(|| format!("failed to store {}", file.display()))?
        };
        println!("{}", key);
    }
    Ok(ExitCode::SUCCESS)
}

pub fn put_bytes(global: &GlobalArgs, text: &str) -> Result<ExitCode> {
    let store = open_existing(global)?;
    println!("{}", store.put_bytes(text.as_bytes())?);
    Ok(ExitCode::SUCCESS)
}

pub fn get(global: &GlobalArgs, key: &ContentHash, output: Option<&Path>) -> Result<ExitCode> {
    let store = open_existing(global)?;

    if let Some(dest) = output {
        if !store.get_to_file(key, dest)? {
            return Ok(not_found(key));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let Some(data) = store.get_bytes(key)? else {
        return Ok(not_found(key));
    };
    let mut stdout = io::stdout().lock();
    stdout.write_all(&data)?;
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

pub fn exists(global: &GlobalArgs, key: &ContentHash) -> Result<ExitCode> {
    let store = open_existing(global)?;
    let present = store.exists(key);
    println!("{}", present);
    Ok(if present {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn size(global: &GlobalArgs, key: &ContentHash) -> Result<ExitCode> {
    let store = open_existing(global)?;
    match store.get_size(key)? {
        Some(size) => {
            println!("{}", size);
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(not_found(key)),
    }
}

pub fn rm(global: &GlobalArgs, key: &ContentHash) -> Result<ExitCode> {
    let store = open_existing(global)?;
    if store.remove_key(key)? {
        println!("removed {}", key);
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(not_found(key))
    }
}

/// Hash a file with the configured algorithm; needs no store
pub fn hash(global: &GlobalArgs, file: &Path) -> Result<ExitCode> {
    let config = resolve_config(global)?;
    match config.algorithm.hash_file(file)? {
        Some(key) => {
            println!("{}", key);
            Ok(ExitCode::SUCCESS)
        }
        None => bail!("not a regular file: {}", file.display()),
    }
}

pub fn ls(global: &GlobalArgs) -> Result<ExitCode> {
    let store = open_existing(global)?;
    let mut stdout = io::stdout().lock();
    for key in store.list_keys() {
        writeln!(stdout, "{}", key?)?;
    }
    Ok(ExitCode::SUCCESS)
}

pub fn verify(global: &GlobalArgs) -> Result<ExitCode> {
    let store = open_existing(global)?;
    let mut stdout = io::stdout().lock();
    let mut invalid = 0usize;
    for key in store.find_invalid_keys() {
        writeln!(stdout, "{}", key?)?;
        invalid += 1;
    }
    info!(invalid, "verify complete");
    Ok(if invalid == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn repair(global: &GlobalArgs) -> Result<ExitCode> {
    let store = open_existing(global)?;
    let renamed = store.correct_invalid_keys()?;
    for (old, new) in &renamed {
        println!("{} -> {}", old, new);
    }
    info!(renamed = renamed.len(), "repair complete");
    Ok(ExitCode::SUCCESS)
}

pub fn purge(global: &GlobalArgs, yes: bool) -> Result<ExitCode> {
    if !yes {
        bail!(
            "purge deletes every object whose content does not match its key\n\n\
             Re-run with --yes to confirm, or use `casctl repair` to rename them instead."
        );
    }
    let store = open_existing(global)?;
    let removed = store.remove_invalid_keys()?;
    for key in &removed {
        println!("{}", key);
    }
    info!(removed = removed.len(), "purge complete");
    Ok(ExitCode::SUCCESS)
}
