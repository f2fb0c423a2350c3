//! Basic resource loading example.
//!
//! This example shows:
//! - Building providers over a local directory and an embedded table
//! - Scoping a loader over a fallback chain
//! - Loading, holding and releasing resources
//! - Processing provider events
//!
//! Run with `RUST_LOG=debug` for runner lifecycle logs.

use std::fs;

use larder_resources::prelude::*;
use larder_resources::ProviderEvent;

fn main() -> ResourceResult<()> {
    larder_core::logging::init();

    // Lay out a small project on disk.
    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("Scripts/Act1"))?;
    fs::write(dir.path().join("Scripts/Intro.txt"), "Once upon a time...")?;
    fs::write(dir.path().join("Scripts/Act1/Start.md"), "# Act 1")?;

    let local = ResourceProvider::new(LocalBackend::new(dir.path(), DecoderRegistry::with_defaults()));
    let bundled = ResourceProvider::new(
        EmbeddedBackend::new()
            .with("Scripts/Intro", "Bundled intro".to_string())
            .with("Scripts/Credits", "Made with larder".to_string()),
    );

    let manager = ProviderManager::new()
        .with("local", local.clone())
        .with("bundled", bundled);
    let config = LoaderConfig::new("Scripts")
        .with_provider("local")
        .with_provider("bundled");
    let scripts = manager.loader(&config)?;

    let cancel = CancellationToken::new();
    let player = HolderId::new();

    pollster::block_on(async {
        println!("Scripts: {:?}", scripts.locate::<String>("", &cancel).await?);
        println!("Folders: {:?}", scripts.locate_folders("", &cancel).await?);

        for name in ["Intro", "Credits", "Act1/Start", "Missing"] {
            let script = scripts.load_and_hold::<String>(name, player, &cancel).await?;
            match script.object() {
                Some(text) => println!("{} -> {:?}", script.path(), text),
                None => println!("{} -> not found", script.path()),
            }
        }
        Ok::<_, ResourceError>(())
    })?;

    println!("Loaded: {:?}", scripts.loaded_paths());
    scripts.release_all(player, true);
    println!("After release: {:?}", scripts.loaded_paths());

    for event in local.drain_events() {
        match event {
            ProviderEvent::Loaded { path, kind } => println!("loaded {} as {}", path, kind),
            ProviderEvent::Unloaded { path } => println!("unloaded {}", path),
            other => println!("{:?}", other),
        }
    }

    Ok(())
}
