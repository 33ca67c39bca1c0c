//! `metacfg inspect`: show a module's composed descriptor.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use metacfg_core::capability::{record_chain, resolved_fields};
use metacfg_core::{ConfigPass, RecordId, Registry, Signature, Value};
use metacfg_decl::{PackageTree, ScriptScanLoader};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ModuleView {
    name: String,
    package: String,
    flags: Vec<&'static str>,
    inherits: Vec<String>,
    capsule: Option<String>,
    config: Vec<FieldView>,
    instance: Vec<FieldView>,
    params: Vec<FieldView>,
    functions: Vec<FunctionView>,
}

#[derive(Debug, Serialize)]
struct FieldView {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    flag: String,
    required: bool,
    default: Value,
}

#[derive(Debug, Serialize)]
struct FunctionView {
    name: String,
    signature: Option<String>,
    implemented: bool,
}

pub fn run(root: &Path, qualified: &str, json: bool) -> Result<()> {
    let (package, _) = qualified
        .rsplit_once('.')
        .with_context(|| format!("'{qualified}' is not a qualified module name"))?;

    let tree = PackageTree::new(root);
    let mut pass = ConfigPass::new(ScriptScanLoader::new(root));
    tree.load(&mut pass, package)
        .with_context(|| format!("loading package '{package}'"))?;

    let view = module_view(pass.registry(), qualified)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view);
    }
    Ok(())
}

fn module_view(registry: &Registry, qualified: &str) -> Result<ModuleView> {
    let id = registry.module_named(qualified)?;
    let module = registry.module(id);
    let records = module.records();
    let mut functions = function_views(registry, records.module);
    functions.extend(function_views(registry, records.instance));

    Ok(ModuleView {
        name: module.name().to_string(),
        package: registry.package(module.package()).name().to_string(),
        flags: module.flags().names(),
        inherits: module
            .capability_chain()
            .iter()
            .map(|&iface| registry.module(iface).name().to_string())
            .collect(),
        capsule: module.capsule().script().map(str::to_string),
        config: field_views(registry, records.module),
        instance: field_views(registry, records.instance),
        params: field_views(registry, records.params),
        functions,
    })
}

fn field_views(registry: &Registry, record: RecordId) -> Vec<FieldView> {
    resolved_fields(registry, record)
        .into_iter()
        .map(|field| FieldView {
            ty: registry.type_name(&field.ty),
            flag: field.flag.to_string(),
            name: field.name,
            required: field.required,
            default: field.default,
        })
        .collect()
}

/// Functions visible on `record`, most-derived binding first.
fn function_views(registry: &Registry, record: RecordId) -> Vec<FunctionView> {
    let mut seen = HashSet::new();
    let mut views = Vec::new();
    for id in record_chain(registry, record) {
        for function in registry.record(id).functions() {
            if !seen.insert(function.name.clone()) {
                continue;
            }
            views.push(FunctionView {
                name: function.name.clone(),
                signature: function
                    .signature
                    .map(|sig| signature_text(registry, registry.signature(sig))),
                implemented: function.is_implemented(),
            });
        }
    }
    views
}

fn signature_text(registry: &Registry, sig: &Signature) -> String {
    let mut params: Vec<String> = sig
        .params
        .iter()
        .map(|p| match &p.default {
            Some(default) => format!("{}: {} = {default}", p.name, registry.type_name(&p.ty)),
            None => format!("{}: {}", p.name, registry.type_name(&p.ty)),
        })
        .collect();
    if let Some(rest) = &sig.variadic {
        params.push(format!("...{}", registry.type_name(rest)));
    }
    format!("{}({})", sig.name, params.join(", "))
}

fn print_view(view: &ModuleView) {
    println!("module {}", view.name);
    println!("  package   {}", view.package);
    println!("  flags     {}", view.flags.join(", "));
    if !view.inherits.is_empty() {
        println!("  inherits  {}", view.inherits.join(" -> "));
    }
    if let Some(capsule) = &view.capsule {
        println!("  capsule   {capsule}");
    }
    for (title, fields) in [
        ("config", &view.config),
        ("instance", &view.instance),
        ("params", &view.params),
    ] {
        if fields.is_empty() {
            continue;
        }
        println!();
        println!("{title}:");
        for field in fields {
            let required = if field.required { " required" } else { "" };
            println!(
                "  {:<16} {:<24} [{}]{required} = {}",
                field.name, field.ty, field.flag, field.default
            );
        }
    }
    if !view.functions.is_empty() {
        println!();
        println!("functions:");
        for function in &view.functions {
            let status = if function.implemented { "bound" } else { "unbound" };
            let text = function.signature.as_deref().unwrap_or(&function.name);
            println!("  {text:<40} {status}");
        }
    }
}
