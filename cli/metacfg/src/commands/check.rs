//! `metacfg check`: load packages and report what they declare.

use std::path::Path;

use anyhow::{Context, Result};
use metacfg_core::ConfigPass;
use metacfg_decl::{PackageTree, ScriptScanLoader};

pub fn run(root: &Path, packages: &[String]) -> Result<()> {
    let tree = PackageTree::new(root);
    tracing::debug!(root = %root.display(), ?packages, "checking packages");
    let mut pass = ConfigPass::new(ScriptScanLoader::new(root));
    for name in packages {
        tree.load(&mut pass, name)
            .with_context(|| format!("checking package '{name}'"))?;
    }

    let registry = pass.registry();
    let mut count = 0;
    for (_, package) in registry.packages() {
        count += 1;
        println!("{} {}", package.name(), package.version());
        for &id in package.modules() {
            let module = registry.module(id);
            let kind = if module.is_abstract() { "interface" } else { "module" };
            println!("  {kind:<9} {} [{}]", module.name(), module.flags().names().join(", "));
        }
    }
    println!();
    println!("{count} package(s) OK");
    Ok(())
}
