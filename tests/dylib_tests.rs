// Real wrapper libraries loaded through the dynamic linker
//
// Both version directories link the same fixture library, so only the link
// isolation keeps their process-wide state apart.
#![cfg(all(target_os = "linux", target_env = "gnu"))]

use serial_test::serial;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use wrapman::error::RegistryError;
use wrapman::matrix::{EcosystemVersionConfig, LanguageVersionConfig, VersionMatrix};
use wrapman::registry::WrapperRegistry;
use wrapman::wrapper::{
    DylibOpener, HostNamespace, IsolatedLoader, LinkIsolation, LoadedWrapper, ARTIFACTS_DIR,
};

use test_utils::WrapperTree;

const REFUSING_SYMBOL: &str = "wrapman_fixture_refusing_create";

/// Build `fixtures/wrapper` once per test binary
fn fixture_library() -> &'static Path {
    static LIBRARY: OnceLock<PathBuf> = OnceLock::new();
    LIBRARY.get_or_init(|| {
        let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("fixture-build");
        let status = Command::new(env!("CARGO"))
            .args(["build", "--quiet", "-p", "wrapman-fixture-wrapper", "--target-dir"])
            .arg(&target_dir)
            .current_dir(env!("CARGO_MANIFEST_DIR"))
            .status()
            .expect("cargo should start");
        assert!(status.success(), "fixture wrapper library failed to build");

        let library = target_dir.join("debug").join("libwrapman_fixture_wrapper.so");
        assert!(library.is_file(), "missing {}", library.display());
        library
    })
}

fn link_fixture(tree: &WrapperTree, language_version: &str) {
    tree.version(language_version);
    let link = tree
        .path()
        .join(language_version)
        .join(ARTIFACTS_DIR)
        .join("libwrapper.so");
    symlink(fixture_library(), link).unwrap();
}

fn dylib_loader(isolation: LinkIsolation) -> IsolatedLoader {
    IsolatedLoader::new(
        Arc::new(DylibOpener::new(isolation)),
        Arc::new(HostNamespace::empty()),
    )
}

fn matrix(language_versions: &[&str]) -> VersionMatrix {
    VersionMatrix::new(
        vec![EcosystemVersionConfig::new("0.9")
            .latest_stable()
            .with_language_versions(language_versions.iter().copied())],
        language_versions
            .iter()
            .map(|version| LanguageVersionConfig::new(*version))
            .collect(),
    )
}

#[test]
#[serial]
fn test_namespaces_keep_identical_libraries_apart() {
    let tree = WrapperTree::new();
    link_fixture(&tree, "1.2.71");
    link_fixture(&tree, "1.3.0");

    let init = WrapperRegistry::init(
        &matrix(&["1.2.71", "1.3.0"]),
        &tree.settings(),
        &dylib_loader(LinkIsolation::Namespace),
    );
    assert!(init.failures.is_empty(), "{:?}", init.failures);

    let old = init.registry.get("0.9", "1.2.71").unwrap();
    let new = init.registry.get("0.9", "1.3.0").unwrap();
    assert_eq!(old.compiler_version(), "1.2.71");
    assert_eq!(new.compiler_version(), "1.3.0");
    assert!(!LoadedWrapper::ptr_eq(old, new));
    assert_eq!(old.namespace().artifact_count(), 1);
}

#[test]
#[serial]
fn test_local_scope_shares_an_already_loaded_library() {
    let tree = WrapperTree::new();
    link_fixture(&tree, "1.2.71");
    link_fixture(&tree, "1.3.0");

    let init = WrapperRegistry::init(
        &matrix(&["1.2.71", "1.3.0"]),
        &tree.settings(),
        &dylib_loader(LinkIsolation::Local),
    );
    assert!(init.failures.is_empty(), "{:?}", init.failures);

    // One copy of the library serves both cells, so its bootstrap state leaks
    let old = init.registry.get("0.9", "1.2.71").unwrap();
    let new = init.registry.get("0.9", "1.3.0").unwrap();
    assert_eq!(old.compiler_version(), new.compiler_version());
}

#[test]
#[serial]
fn test_panicking_library_constructor_fails_its_cell() {
    let tree = WrapperTree::new();
    link_fixture(&tree, "1.3.0");

    let loader = dylib_loader(LinkIsolation::Local).with_symbol(REFUSING_SYMBOL);
    let init = WrapperRegistry::init(&matrix(&["1.3.0"]), &tree.settings(), &loader);

    assert!(init.registry.is_empty());
    match &init.failures[0].error {
        RegistryError::InstantiationError { symbol, reason, .. } => {
            assert_eq!(symbol, REFUSING_SYMBOL);
            assert_eq!(reason, "constructor returned null");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[test]
#[serial]
fn test_panicking_library_bootstrap_fails_its_cell() {
    let tree = WrapperTree::new();
    link_fixture(&tree, "1.3.0-crash");

    let init = WrapperRegistry::init(
        &matrix(&["1.3.0-crash"]),
        &tree.settings(),
        &dylib_loader(LinkIsolation::Local),
    );

    assert!(init.registry.is_empty());
    match &init.failures[0].error {
        RegistryError::InitializationError { reason, .. } => {
            assert_eq!(reason, "init panicked: bootstrap of 1.3.0-crash crashed");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}
