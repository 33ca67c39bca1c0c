//! `metacfg configure`: run a pass and print the sealed instances.

use std::path::Path;

use anyhow::{Context, Result};
use metacfg_core::Instance;
use metacfg_decl::UserConfig;

pub fn run(root: &Path, config_path: &Path, json: bool) -> Result<()> {
    let config = UserConfig::load(config_path)
        .with_context(|| format!("reading {}", config_path.display()))?;
    tracing::debug!(
        packages = ?config.referenced_packages(),
        instances = config.instances.len(),
        "user configuration read"
    );
    let result = metacfg_decl::configure(root, &config)
        .with_context(|| format!("configuring {}", config_path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result.summary())?);
        return Ok(());
    }

    for (_, package) in result.registry().packages() {
        let uses = package.use_deps();
        if uses.is_empty() {
            println!("package {} {}", package.name(), package.version());
        } else {
            println!("package {} {} (uses {})", package.name(), package.version(), uses.join(", "));
        }
    }
    for instance in result.instances().chain(result.objects()) {
        print_instance(instance);
    }
    Ok(())
}

fn print_instance(instance: &Instance) {
    println!();
    println!(
        "{} #{} ({}) {}",
        instance.label(),
        instance.index(),
        instance.category(),
        &instance.fingerprint()[..12]
    );
    for slot in instance.fields().visible() {
        println!("  {:<16} [{}] = {}", slot.name, slot.flag, slot.value);
    }
}
