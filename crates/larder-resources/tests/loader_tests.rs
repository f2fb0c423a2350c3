//! Integration tests for the reference-counted loader and the provider manager.

mod common;

use common::{ScriptedBackend, scripted_provider};
use futures_lite::future::block_on;
use larder_resources::*;

// ============================================================================
// Helper Functions
// ============================================================================

fn audio_loader() -> (ResourceLoader, ScriptedBackend) {
    let (provider, backend) = scripted_provider(&[
        ("Audio/Bgm/Theme", "theme"),
        ("Audio/Bgm/Battle", "battle"),
        ("Audio/Sfx/Click", "click"),
        ("Text/Intro", "intro"),
    ]);
    (ResourceLoader::new("Audio", vec![provider]), backend)
}

// ============================================================================
// Holding & Releasing
// ============================================================================

#[test]
fn test_release_is_gated_by_holders() {
    let (loader, backend) = audio_loader();
    let cancel = CancellationToken::new();
    let music = HolderId::new();
    let menu = HolderId::new();

    block_on(loader.load_and_hold::<Vec<u8>>("Bgm/Theme", music, &cancel)).unwrap();
    block_on(loader.load_and_hold::<Vec<u8>>("Bgm/Theme", menu, &cancel)).unwrap();
    assert_eq!(loader.count_holders("Bgm/Theme"), 2);
    assert_eq!(backend.loads(), 1);

    loader.release("Bgm/Theme", music, true);
    assert!(loader.is_loaded("Bgm/Theme"));
    assert!(!loader.is_held_by("Bgm/Theme", music));
    assert!(loader.is_held_by("Bgm/Theme", menu));

    loader.release("Bgm/Theme", menu, true);
    assert_eq!(loader.count_holders("Bgm/Theme"), 0);
    assert!(!loader.is_loaded("Bgm/Theme"));
    assert_eq!(backend.disposed().len(), 1);
}

#[test]
fn test_release_twice_is_a_noop() {
    let (loader, backend) = audio_loader();
    let cancel = CancellationToken::new();
    let first = HolderId::new();
    let second = HolderId::new();

    block_on(loader.load_and_hold::<Vec<u8>>("Bgm/Theme", first, &cancel)).unwrap();
    loader.hold("Bgm/Theme", second);

    loader.release("Bgm/Theme", first, true);
    loader.release("Bgm/Theme", first, true);
    assert_eq!(loader.count_holders("Bgm/Theme"), 1);
    assert!(loader.is_loaded("Bgm/Theme"));

    loader.release("Bgm/Theme", second, true);
    loader.release("Bgm/Theme", second, true);
    assert_eq!(loader.count_holders("Bgm/Theme"), 0);
    assert_eq!(backend.disposed().len(), 1);
}

#[test]
fn test_release_without_unload_keeps_resource() {
    let (loader, _backend) = audio_loader();
    let cancel = CancellationToken::new();
    let holder = HolderId::new();

    block_on(loader.load_and_hold::<Vec<u8>>("Sfx/Click", holder, &cancel)).unwrap();
    loader.release("Sfx/Click", holder, false);
    assert_eq!(loader.count_holders("Sfx/Click"), 0);
    assert!(loader.is_loaded("Sfx/Click"));
}

#[test]
fn test_hold_does_not_load() {
    let (loader, backend) = audio_loader();
    let holder = HolderId::new();

    loader.hold("Bgm/Battle", holder);
    loader.hold("Bgm/Battle", holder);
    assert_eq!(loader.count_holders("Bgm/Battle"), 1);
    assert!(!loader.is_loaded("Bgm/Battle"));
    assert_eq!(backend.loads(), 0);
}

#[test]
fn test_release_all_releases_every_path() {
    let (loader, _backend) = audio_loader();
    let cancel = CancellationToken::new();
    let scene = HolderId::new();
    let other = HolderId::new();

    block_on(async {
        loader.load_and_hold::<Vec<u8>>("Bgm/Theme", scene, &cancel).await.unwrap();
        loader.load_and_hold::<Vec<u8>>("Bgm/Battle", scene, &cancel).await.unwrap();
        loader.load_and_hold::<Vec<u8>>("Bgm/Battle", other, &cancel).await.unwrap();
    });

    loader.release_all(scene, true);
    assert!(!loader.is_loaded("Bgm/Theme"));
    assert!(loader.is_loaded("Bgm/Battle"));
    assert!(!loader.is_held_by("Bgm/Battle", scene));
    assert_eq!(loader.count_holders("Bgm/Battle"), 1);
}

#[test]
fn test_unload_all_resets_loader() {
    let (loader, _backend) = audio_loader();
    let cancel = CancellationToken::new();
    let holder = HolderId::new();

    block_on(async {
        loader.load_and_hold::<Vec<u8>>("Bgm/Theme", holder, &cancel).await.unwrap();
        loader.load_and_hold::<Vec<u8>>("Sfx/Click", holder, &cancel).await.unwrap();
    });
    assert_eq!(loader.loaded_paths(), ["Bgm/Theme", "Sfx/Click"]);

    loader.unload_all();
    assert!(!loader.is_loaded("Bgm/Theme"));
    assert!(!loader.is_loaded("Sfx/Click"));
    assert_eq!(loader.count_holders("Bgm/Theme"), 0);
    assert_eq!(loader.count_holders("Sfx/Click"), 0);
    assert!(loader.loaded_paths().is_empty());
}

#[test]
fn test_unload_all_cancels_in_flight_loads() {
    let (loader, backend) = audio_loader();
    let cancel = CancellationToken::new();

    // List the folder up front so the only pending work is the load itself.
    assert!(block_on(loader.exists::<String>("Bgm/Theme", &cancel)).unwrap());
    let gate = backend.hold_loads();

    let (result, ()) = block_on(async {
        futures::join!(loader.load::<String>("Bgm/Theme", &cancel), async {
            assert_eq!(loader.providers()[0].loading_paths(), ["Audio/Bgm/Theme"]);
            loader.unload_all();
            gate.send(()).unwrap();
        })
    });

    assert!(result.unwrap_err().is_canceled());
    assert!(!loader.is_loaded("Bgm/Theme"));
    assert!(loader.providers()[0].loading_paths().is_empty());
    assert_eq!(loader.providers()[0].pending_operations(), 0);
}

#[test]
fn test_unload_bypasses_holders() {
    let (loader, _backend) = audio_loader();
    let cancel = CancellationToken::new();
    let holder = HolderId::new();

    block_on(loader.load_and_hold::<Vec<u8>>("Bgm/Theme", holder, &cancel)).unwrap();
    loader.unload("Bgm/Theme");
    assert!(!loader.is_loaded("Bgm/Theme"));
    assert_eq!(loader.count_holders("Bgm/Theme"), 0);
}

// ============================================================================
// Prefix Scoping
// ============================================================================

#[test]
fn test_paths_are_scoped_by_prefix() {
    let (loader, _backend) = audio_loader();
    let cancel = CancellationToken::new();

    assert_eq!(loader.to_full_path("Bgm/Theme"), "Audio/Bgm/Theme");
    assert_eq!(loader.to_local_path("Audio/Bgm/Theme"), Some("Bgm/Theme"));
    assert_eq!(loader.to_local_path("Text/Intro"), None);

    block_on(async {
        let resource = loader.load::<String>("Bgm/Theme", &cancel).await.unwrap();
        assert_eq!(resource.path(), "Audio/Bgm/Theme");
        assert_eq!(resource.object().unwrap().as_str(), "theme");

        assert_eq!(loader.locate::<String>("Bgm", &cancel).await.unwrap(), ["Bgm/Battle", "Bgm/Theme"]);
        assert_eq!(loader.locate::<String>("", &cancel).await.unwrap().len(), 3);
        assert_eq!(loader.locate_folders("", &cancel).await.unwrap(), ["Bgm", "Sfx"]);
        assert!(loader.exists::<String>("Sfx/Click", &cancel).await.unwrap());
        assert!(!loader.exists::<String>("Intro", &cancel).await.unwrap());
    });
}

#[test]
fn test_missing_resource_is_invalid() {
    let (loader, _backend) = audio_loader();
    let cancel = CancellationToken::new();

    let resource = block_on(loader.load::<String>("Bgm/Missing", &cancel)).unwrap();
    assert!(!resource.is_valid());
    assert!(resource.require().unwrap_err().is_not_found());
}

#[test]
fn test_get_loaded_is_a_pure_query() {
    let (loader, backend) = audio_loader();
    let cancel = CancellationToken::new();

    assert!(loader.get_loaded::<String>("Bgm/Theme").is_none());
    block_on(loader.load::<String>("Bgm/Theme", &cancel)).unwrap();
    assert!(loader.get_loaded::<String>("Bgm/Theme").is_some());
    assert!(loader.get_loaded::<Vec<u8>>("Bgm/Theme").is_none());
    assert_eq!(backend.loads(), 1);
}

// ============================================================================
// Fallback Chains
// ============================================================================

#[test]
fn test_first_provider_with_resource_wins() {
    let overrides = ResourceProvider::new(ScriptedBackend::new(&[("Text/Intro", "modded")]));
    let bundled = ResourceProvider::new(
        EmbeddedBackend::new()
            .with("Text/Intro", "original".to_string())
            .with("Text/Outro", "bye".to_string()),
    );
    let loader = ResourceLoader::new("Text", vec![overrides, bundled.clone()]);
    let cancel = CancellationToken::new();

    block_on(async {
        let intro = loader.load::<String>("Intro", &cancel).await.unwrap();
        assert_eq!(intro.object().unwrap().as_str(), "modded");

        let outro = loader.load::<String>("Outro", &cancel).await.unwrap();
        assert_eq!(outro.object().unwrap().as_str(), "bye");
        assert!(bundled.is_loaded("Text/Outro"));

        let all = loader.load_all::<String>("", &cancel).await.unwrap();
        let texts: Vec<_> = all.iter().map(|r| r.object().unwrap().as_str()).collect();
        assert_eq!(texts, ["modded", "bye"]);
    });
    assert!(!bundled.is_loaded("Text/Intro"));
}

// ============================================================================
// Provider Manager
// ============================================================================

#[test]
fn test_manager_builds_loaders_from_config() {
    let (scripted, _backend) = scripted_provider(&[("Audio/Bgm/Theme", "theme")]);
    let manager = ProviderManager::new()
        .with("scripted", scripted.clone())
        .with("embedded", ResourceProvider::new(EmbeddedBackend::new()));
    assert_eq!(manager.names().collect::<Vec<_>>(), ["scripted", "embedded"]);

    let config = LoaderConfig::new("Audio")
        .with_provider("embedded")
        .with_provider("scripted");
    let loader = manager.loader(&config).unwrap();
    assert_eq!(loader.providers().len(), 2);
    assert!(loader.providers()[1].ptr_eq(&scripted));

    let cancel = CancellationToken::new();
    block_on(loader.load::<String>("Bgm/Theme", &cancel)).unwrap();
    assert!(scripted.is_loaded("Audio/Bgm/Theme"));

    manager.unload_all();
    assert!(!scripted.is_loaded("Audio/Bgm/Theme"));
}

#[test]
fn test_manager_rejects_unknown_provider() {
    let manager = ProviderManager::new();
    let err = manager
        .loader(&LoaderConfig::new("Audio").with_provider("cloud"))
        .unwrap_err();
    assert!(matches!(err, ResourceError::UnknownProvider { name } if name == "cloud"));
}
