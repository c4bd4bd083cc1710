// Registry initialization and lookup behaviour

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use wrapman::error::RegistryError;
use wrapman::matrix::{EcosystemVersionConfig, LanguageVersionConfig, VersionMatrix, VersionPair};
use wrapman::registry::WrapperRegistry;
use wrapman::wrapper::{LoadedWrapper, SourceFile};

use test_utils::{stub_loader, WrapperTree};

fn single_ecosystem_matrix() -> VersionMatrix {
    VersionMatrix::new(
        vec![EcosystemVersionConfig::new("E1")
            .latest_stable()
            .with_language_versions(["L1", "L2"])],
        vec![
            LanguageVersionConfig::new("L1").latest_stable(),
            LanguageVersionConfig::new("L2"),
        ],
    )
}

#[test]
fn test_end_to_end_only_available_version_loads() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "compiler-L1");

    let init = WrapperRegistry::init(&single_ecosystem_matrix(), &tree.settings(), &stub_loader());
    let registry = &init.registry;

    let l1 = registry
        .lookup(Some("E1"), Some("L1"))
        .unwrap()
        .expect("L1 should be loaded");
    let sources = [SourceFile::new("main.kt", "fun main() {}")];
    let outcome = l1.compile(&sources).unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.diagnostics, vec!["main.kt compiled by compiler-L1"]);

    assert!(registry.lookup(Some("E1"), Some("L2")).unwrap().is_none());

    let default = registry.lookup(None, None).unwrap().unwrap();
    assert!(LoadedWrapper::ptr_eq(default, l1));

    assert_eq!(init.failed_pairs(), vec![&VersionPair::new("E1", "L2")]);
    assert!(matches!(
        init.failures[0].error,
        RegistryError::ArtifactsNotFound { .. }
    ));
}

#[test]
fn test_failure_isolation_across_ecosystems() {
    let tree = WrapperTree::new();
    tree.wrapper("1.3.0", "1.3.0")
        .wrapper("1.2.71", "1.2.71")
        .artifact("1.2.60", "broken.wrapper", "release=1.2.60\ninit=fail\n")
        .artifact("1.2.50", "panicky.wrapper", "release=1.2.50\nconstruct=panic\n");

    let matrix = VersionMatrix::new(
        vec![
            EcosystemVersionConfig::new("0.8").with_language_versions(["1.2.50", "1.2.60", "1.2.71"]),
            EcosystemVersionConfig::new("0.9")
                .latest_stable()
                .with_language_versions(["1.1.0", "1.3.0", "1.2.71"]),
        ],
        vec![
            LanguageVersionConfig::new("1.1.0"),
            LanguageVersionConfig::new("1.2.50"),
            LanguageVersionConfig::new("1.2.60"),
            LanguageVersionConfig::new("1.2.71"),
            LanguageVersionConfig::new("1.3.0").latest_stable(),
        ],
    );

    let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());
    let registry = &init.registry;

    assert_eq!(
        registry.pairs(),
        vec![
            VersionPair::new("0.8", "1.2.71"),
            VersionPair::new("0.9", "1.2.71"),
            VersionPair::new("0.9", "1.3.0"),
        ]
    );

    let kinds: Vec<(String, &str)> = init
        .failures
        .iter()
        .map(|failure| (failure.pair.to_string(), failure.error.kind()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("0.8/1.2.50".to_string(), "instantiation"),
            ("0.8/1.2.60".to_string(), "initialization"),
            ("0.9/1.1.0".to_string(), "artifacts_not_found"),
        ]
    );

    assert_eq!(
        registry.default_pair(),
        Some(&VersionPair::new("0.9", "1.3.0"))
    );
}

#[test]
fn test_panicking_bootstrap_fails_only_that_cell() {
    let tree = WrapperTree::new();
    tree.wrapper("1.3.0", "1.3.0")
        .artifact("1.2.71", "crashing.wrapper", "release=1.2.71\ninit=panic\n");

    let matrix = VersionMatrix::new(
        vec![EcosystemVersionConfig::new("0.9")
            .latest_stable()
            .with_language_versions(["1.2.71", "1.3.0"])],
        vec![
            LanguageVersionConfig::new("1.2.71").latest_stable(),
            LanguageVersionConfig::new("1.3.0"),
        ],
    );

    let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());

    assert_eq!(init.registry.pairs(), vec![VersionPair::new("0.9", "1.3.0")]);
    assert_eq!(init.failed_pairs(), vec![&VersionPair::new("0.9", "1.2.71")]);
    match &init.failures[0].error {
        RegistryError::InitializationError { reason, .. } => {
            assert_eq!(reason, "init panicked: compiler 1.2.71 crashed during bootstrap")
        }
        other => panic!("unexpected failure: {other:?}"),
    }
    assert_eq!(init.failures[0].error.kind(), "initialization");
    // The flagged cell failed, so no default
    assert!(init.registry.default_pair().is_none());
}

#[test]
fn test_missing_language_config_fails_only_that_cell() {
    let tree = WrapperTree::new();
    tree.wrapper("1.3.0", "1.3.0").wrapper("1.4.0", "1.4.0");

    let matrix = VersionMatrix::new(
        vec![EcosystemVersionConfig::new("0.9").with_language_versions(["1.4.0", "1.3.0"])],
        vec![LanguageVersionConfig::new("1.3.0")],
    );

    let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());
    assert!(init.registry.get("0.9", "1.3.0").is_some());
    assert!(init.registry.get("0.9", "1.4.0").is_none());
    assert!(matches!(
        init.failures[0].error,
        RegistryError::LanguageConfigNotFound { ref language_version, .. } if language_version == "1.4.0"
    ));
}

#[test]
fn test_unknown_pairs_are_absent() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1");
    let init = WrapperRegistry::init(&single_ecosystem_matrix(), &tree.settings(), &stub_loader());
    let registry = &init.registry;

    for (ecosystem, language) in [("E2", "L1"), ("E1", "L9"), ("", ""), ("L1", "E1")] {
        assert!(registry
            .lookup(Some(ecosystem), Some(language))
            .unwrap()
            .is_none());
    }
    assert!(registry.language_versions("E2").is_empty());
}

#[test]
fn test_no_default_when_flags_do_not_meet() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1").wrapper("L2", "L2");

    // Stable ecosystem with an unstable language, unstable ecosystem with a stable language
    let matrix = VersionMatrix::new(
        vec![
            EcosystemVersionConfig::new("E1")
                .latest_stable()
                .with_language_versions(["L1"]),
            EcosystemVersionConfig::new("E2").with_language_versions(["L2"]),
        ],
        vec![
            LanguageVersionConfig::new("L1"),
            LanguageVersionConfig::new("L2").latest_stable(),
        ],
    );

    let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());
    assert_eq!(init.registry.len(), 2);
    assert!(init.registry.default_pair().is_none());
    assert!(matches!(
        init.registry.lookup(None, None),
        Err(RegistryError::NoDefaultAvailable)
    ));
}

#[test]
fn test_default_skips_flagged_cell_that_failed() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1");

    let matrix = VersionMatrix::new(
        vec![EcosystemVersionConfig::new("E1")
            .latest_stable()
            .with_language_versions(["L2", "L1"])],
        vec![
            LanguageVersionConfig::new("L1").latest_stable(),
            LanguageVersionConfig::new("L2").latest_stable(),
        ],
    );

    let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());
    assert_eq!(
        init.registry.default_pair(),
        Some(&VersionPair::new("E1", "L1"))
    );
}

#[test]
fn test_first_fully_flagged_cell_wins_tie() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1").wrapper("L2", "L2");

    let matrix = VersionMatrix::new(
        vec![
            EcosystemVersionConfig::new("E1")
                .latest_stable()
                .with_language_versions(["L2", "L1"]),
            EcosystemVersionConfig::new("E2")
                .latest_stable()
                .with_language_versions(["L1"]),
        ],
        vec![
            LanguageVersionConfig::new("L1").latest_stable(),
            LanguageVersionConfig::new("L2").latest_stable(),
        ],
    );

    let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());
    let registry = &init.registry;
    assert_eq!(registry.default_pair(), Some(&VersionPair::new("E1", "L2")));

    let default = registry.default_wrapper().unwrap();
    assert_eq!(default.compiler_version(), "L2");
}

#[test]
fn test_version_sets_reflect_loaded_cells_only() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1").wrapper("L3", "L3");

    // E3 only supports a version with no artifacts
    let matrix_in_order = |order: &[&str]| {
        let mut ecosystems: Vec<_> = order
            .iter()
            .map(|ecosystem| {
                EcosystemVersionConfig::new(*ecosystem).with_language_versions(["L3", "L2", "L1"])
            })
            .collect();
        ecosystems.push(EcosystemVersionConfig::new("E3").with_language_versions(["L2"]));
        VersionMatrix::new(
            ecosystems,
            vec![
                LanguageVersionConfig::new("L1"),
                LanguageVersionConfig::new("L2"),
                LanguageVersionConfig::new("L3"),
            ],
        )
    };

    for matrix in [matrix_in_order(&["E1", "E2"]), matrix_in_order(&["E2", "E1"])] {
        let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());
        let registry = &init.registry;

        assert_eq!(registry.ecosystem_versions(), BTreeSet::from(["E1", "E2"]));
        assert_eq!(registry.language_versions("E1"), BTreeSet::from(["L1", "L3"]));
        assert_eq!(registry.language_versions("E2"), BTreeSet::from(["L1", "L3"]));
        assert!(registry.language_versions("E3").is_empty());
        assert_eq!(registry.all_wrappers().count(), 4);
    }
}

#[test]
fn test_every_cell_gets_its_own_instance() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1");

    let matrix = VersionMatrix::new(
        vec![
            EcosystemVersionConfig::new("E1").with_language_versions(["L1"]),
            EcosystemVersionConfig::new("E2").with_language_versions(["L1"]),
        ],
        vec![LanguageVersionConfig::new("L1")],
    );

    let init = WrapperRegistry::init(&matrix, &tree.settings(), &stub_loader());
    let e1 = init.registry.get("E1", "L1").unwrap();
    let e2 = init.registry.get("E2", "L1").unwrap();
    assert!(!LoadedWrapper::ptr_eq(e1, e2));
    assert_eq!(e1.compiler_version(), e2.compiler_version());
}

#[test]
fn test_shared_libraries_reach_wrapper_bootstrap() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1");
    let settings = tree
        .settings()
        .with_shared_libraries(vec![PathBuf::from("/opt/lib/runtime.so")]);

    let init = WrapperRegistry::init(&single_ecosystem_matrix(), &settings, &stub_loader());
    let loaded = init.registry.get("E1", "L1").unwrap();

    let report = loaded.compile(&[]).unwrap();
    assert_eq!(report.diagnostics, vec!["E1/L1", "/opt/lib/runtime.so"]);
}

#[test]
fn test_all_cells_failing_is_a_valid_outcome() {
    let tree = WrapperTree::new();
    let init = WrapperRegistry::init(&single_ecosystem_matrix(), &tree.settings(), &stub_loader());

    assert!(init.registry.is_empty());
    assert!(init.registry.ecosystem_versions().is_empty());
    assert_eq!(init.failures.len(), 2);
    assert!(init.registry.lookup(None, None).is_err());
}

#[test]
fn test_concurrent_lookups() {
    let tree = WrapperTree::new();
    tree.wrapper("L1", "L1").wrapper("L2", "L2");
    let init = WrapperRegistry::init(&single_ecosystem_matrix(), &tree.settings(), &stub_loader());
    let registry = Arc::new(init.registry);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let language = if i % 2 == 0 { "L1" } else { "L2" };
                for _ in 0..100 {
                    let wrapper = registry
                        .lookup(Some("E1"), Some(language))
                        .unwrap()
                        .unwrap();
                    assert_eq!(wrapper.compiler_version(), language);
                    assert_eq!(
                        registry.lookup(None, None).unwrap().unwrap().compiler_version(),
                        "L1"
                    );
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}
