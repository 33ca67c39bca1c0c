//! Package trees on disk, loaded and configured end to end.

use std::fs;
use std::path::Path;

use metacfg_core::{Capsule, ConfigPass, MetaError, StaticLoader, Value};
use metacfg_decl::{configure, DeclError, PackageTree, UserConfig};

const XDC_PLATFORM: &str = r#"
[package]
name = "xdc.platform"
version = "1.0.1"

[[module]]
name = "IPlatform"
flags = ["abstract"]

[[module.record]]
name = "Board"

[[module.record.field]]
name = "boardName"
type = "string"

[[module.config]]
name = "BOARD"
type = "Board"
flag = "wh"
required = true

[[module.instance]]
name = "clockRate"
type = "num"
default = 1.0
flag = "wh"

[[module.instance]]
name = "deviceName"
type = "string"
default = "generic"

[[module.function]]
name = "getExeContext"
args = [{ name = "prog", type = "obj" }]

[[module.function]]
name = "getCpuDataSheet"
args = [{ name = "cpuId", type = "string" }]
optional = true
"#;

const TIVA: &str = r#"
[package]
name = "ti.platforms.tiva"
version = "1.0.0"
build-date = "2019-04-17"

[[import]]
name = "xdc.platform"
min-version = "1.0.1"

[[module]]
name = "Platform"
inherits = "IPlatform"
capsule = "Platform.xs"
flags = ["instances", "static-objects", "host-only"]

[[module.config]]
name = "BOARD"
type = "Board"
default = { boardName = "EK-TM4C1294XL" }
flag = "wh"
"#;

const PLATFORM_XS: &str = "\
function getExeContext(prog)
{
    return null;
}
function module$meta$init()
{
}
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn tree() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "xdc/platform/package.toml", XDC_PLATFORM);
    write(dir.path(), "ti/platforms/tiva/package.toml", TIVA);
    write(dir.path(), "ti/platforms/tiva/Platform.xs", PLATFORM_XS);
    dir
}

#[test]
fn configure_platform_instances() {
    let dir = tree();
    let config = UserConfig::parse(
        r#"
[modules."ti.platforms.tiva.Platform".params]
deviceName = "TM4C1294NCPDT"

[[instance]]
module = "ti.platforms.tiva.Platform"
name = "p0"

[[instance]]
module = "ti.platforms.tiva.Platform"
name = "p1"
params = { clockRate = 2.5 }

[[instance]]
module = "ti.platforms.tiva.Platform"
name = "s0"
static = true
params = { clockRate = 2.5 }
"#,
    )
    .unwrap();

    let result = configure(dir.path(), &config).unwrap();
    let p0 = result.find("ti.platforms.tiva.Platform", "p0").unwrap();
    let p1 = result.find("ti.platforms.tiva.Platform", "p1").unwrap();
    let s0 = result.find("ti.platforms.tiva.Platform", "s0").unwrap();
    assert_eq!(p0.raw("clockRate"), Some(&Value::Num(1.0)));
    assert_eq!(p1.raw("clockRate"), Some(&Value::Num(2.5)));
    assert_eq!(p0.get("deviceName").unwrap(), &Value::from("TM4C1294NCPDT"));
    assert_eq!(p1.fingerprint(), s0.fingerprint());
    assert_ne!(p0.fingerprint(), p1.fingerprint());

    let err = result.call(p0, "getExeContext", &[Value::Null]).unwrap_err();
    assert!(matches!(err, MetaError::CallFailed { .. }));

    let summary = serde_json::to_value(result.summary()).unwrap();
    assert_eq!(summary["packages"][0]["name"], "xdc.platform");
    assert_eq!(summary["packages"][1]["version"], "1.0.0");
    assert_eq!(summary["instances"].as_array().unwrap().len(), 2);
    assert_eq!(summary["objects"][0]["name"], "s0");
}

#[test]
fn missing_script_fails_registration() {
    let dir = tree();
    fs::remove_file(dir.path().join("ti/platforms/tiva/Platform.xs")).unwrap();
    let config = UserConfig::parse("packages = [\"ti.platforms.tiva\"]\n").unwrap();
    let err = configure(dir.path(), &config).unwrap_err();
    assert!(matches!(err, DeclError::Meta(MetaError::Construction { .. })));
    assert!(err.to_string().contains("Platform.xs"));
}

#[test]
fn unknown_parameter_reported() {
    let dir = tree();
    let config = UserConfig::parse(
        "[[instance]]\nmodule = \"ti.platforms.tiva.Platform\"\nname = \"p0\"\nparams = { bogus = 1 }\n",
    )
    .unwrap();
    let err = configure(dir.path(), &config).unwrap_err();
    assert!(matches!(err, DeclError::Meta(MetaError::UnknownParameter { ref key, .. }) if key == "bogus"));
}

#[test]
fn missing_package_reported() {
    let dir = tree();
    let config = UserConfig::parse("packages = [\"ti.platforms.msp432\"]\n").unwrap();
    assert!(matches!(
        configure(dir.path(), &config),
        Err(DeclError::PackageNotFound { ref name, .. }) if name == "ti.platforms.msp432"
    ));
}

#[test]
fn import_cycle_detected() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a/package.toml",
        "[package]\nname = \"a\"\nversion = \"1.0.0\"\n[[import]]\nname = \"b\"\n",
    );
    write(
        dir.path(),
        "b/package.toml",
        "[package]\nname = \"b\"\nversion = \"1.0.0\"\n[[import]]\nname = \"a\"\n",
    );
    let tree = PackageTree::new(dir.path());
    let mut pass = ConfigPass::new(StaticLoader::new());
    let err = tree.load(&mut pass, "a").unwrap_err();
    assert_eq!(err.to_string(), "import cycle: a -> b -> a");
}

#[test]
fn use_hook_dependencies_are_loaded() {
    let dir = tree();
    write(
        dir.path(),
        "ti/catalog/arm/package.toml",
        "[package]\nname = \"ti.catalog.arm\"\nversion = \"1.0.0\"\n",
    );
    let loader = StaticLoader::new().with(
        "ti/platforms/tiva/Platform.xs",
        Capsule::for_script("ti/platforms/tiva/Platform.xs")
            .with_function("getExeContext", |_, _| Ok(Value::Null))
            .with_use(|_, _| Ok(vec!["ti.catalog.arm".into()])),
    );
    let tree = PackageTree::new(dir.path());
    let mut pass = ConfigPass::new(loader);
    tree.load(&mut pass, "ti.platforms.tiva").unwrap();
    assert!(!pass.registry().has("ti.catalog.arm"));

    let loaded = tree.use_module(&mut pass, "ti.platforms.tiva.Platform").unwrap();
    assert_eq!(loaded.len(), 1);
    assert!(pass.registry().has("ti.catalog.arm"));
}
