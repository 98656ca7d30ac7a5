//! Scheduler integration tests
//!
//! Drive the scheduler through full map sessions against the in-memory
//! host and check what ends up spawned.

use ambient_spawns::core::types::{Allegiance, BodyTag, DenId, FactoryId, PointId, Rotation};
use ambient_spawns::core::config::MIN_DURATION;
use ambient_spawns::den::{Den, PointDef, SpawnPoint};
use ambient_spawns::host::memory::{HostEvent, MemoryHost};
use ambient_spawns::host::{CollectionEntry, CollectionInfo, FactoryInfo, PlayerState};
use ambient_spawns::spawn::CompositionSource;
use ambient_spawns::{AmbientConfig, AmbientScheduler, DefinitionCatalog, SchedulerState, SpawnScope};
use glam::Vec3;
use std::path::Path;

fn player() -> PlayerState {
    PlayerState {
        position: Vec3::ZERO,
        view: Rotation::from_yaw(0),
        menu_blocked: false,
        since_combat: None,
        since_input: 0.0,
        game_stage: Some(12),
    }
}

fn bandit_point(id: u32, location: Vec3) -> SpawnPoint {
    SpawnPoint::new(
        PointId(id),
        location,
        Some(PointDef::new("PopPointDef_Jump", vec![BodyTag::from("Bandit")])),
    )
}

/// One bandit den east of the player with a single animated point
fn bandit_map() -> MemoryHost {
    let mut host = MemoryHost::with_seed("Fyrestone_P", 3);
    host.add_factory(FactoryInfo::pawn("Marauder", "AI_Marauder", Some(BodyTag::from("Bandit"))));
    host.add_factory(FactoryInfo::pawn("Nomad_Grunt", "AI_Nomad", Some(BodyTag::from("Bandit"))));
    host.add_collection(CollectionInfo {
        id: "PopDef_Marauders".into(),
        entries: vec![CollectionEntry::Factory("Marauder".into())],
        unique: false,
    });

    let location = Vec3::new(2000.0, 0.0, 0.0);
    let mut den = Den::new(DenId(1), location);
    den.native = Some("PopDef_Marauders".into());
    den.allegiance = Some(Allegiance::from("Bandits"));
    den.points.push(bandit_point(1, location));
    host.add_den(den);

    host.set_player(Some(player()));
    host
}

/// Run the scheduler, keeping the player active
fn run(scheduler: &mut AmbientScheduler, host: &mut MemoryHost, seconds: f32) {
    let ticks = (seconds / 0.1) as usize;
    for _ in 0..ticks {
        host.advance(0.1);
        if let Some(p) = host.player_mut() {
            p.since_input = 0.0;
        }
        scheduler.tick(host);
    }
}

fn spawn_times(host: &MemoryHost) -> Vec<(f32, FactoryId, PointId)> {
    host.events()
        .iter()
        .filter_map(|e| match e {
            HostEvent::Spawned {
                time, factory, point, ..
            } => Some((*time, factory.clone(), *point)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_den_without_points_is_never_selected() {
    let mut host = bandit_map();
    host.add_den(Den::new(DenId(2), Vec3::new(0.0, 1500.0, 0.0)));

    let mut scheduler = AmbientScheduler::with_seed(AmbientConfig::default(), DefinitionCatalog::new(), 11);
    scheduler.on_map_loaded(&mut host);

    let registry = scheduler.registry().expect("session active");
    assert!(registry.info(DenId(2)).is_none());
    assert!(registry.info(DenId(1)).is_some());

    run(&mut scheduler, &mut host, 1000.0);
    assert!(scheduler.stats().compositions > 0);
    assert!(host.actors().iter().all(|a| a.den == DenId(1)));
}

#[test]
fn test_durations_stay_within_jitter() {
    let mut scheduler = AmbientScheduler::with_seed(AmbientConfig::default(), DefinitionCatalog::new(), 2024);
    assert_eq!(scheduler.config().frequency, 100);
    assert_eq!(scheduler.config().random_range, 33);
    for _ in 0..5 {
        let duration = scheduler.new_duration();
        assert!((67..=133).contains(&duration));
        assert!(duration >= MIN_DURATION);
    }
}

#[test]
fn test_shared_point_spawns_are_spaced_out() {
    let catalog = DefinitionCatalog::from_toml_str(
        r#"
        [pack]
        id = "base"
        maps = ["Fyrestone_P"]

        [[spawn]]
        name = "Marauder pair"
        factory = "Marauder"
        counts = [2]
        delay = 0.5
        "#,
    )
    .expect("valid catalog");

    let mut config = AmbientConfig::default();
    config.scope = SpawnScope::Pack;
    config.custom_spawn_percentage = 100;

    let mut host = bandit_map();
    let mut scheduler = AmbientScheduler::with_seed(config, catalog, 5);
    scheduler.on_map_loaded(&mut host);
    run(&mut scheduler, &mut host, 150.0);

    let composition = scheduler.last_composition().expect("an encounter ran");
    assert_eq!(composition.source, CompositionSource::Custom);
    assert_eq!(composition.definition.as_deref(), Some("Marauder pair"));
    assert_eq!(composition.spawns.len(), 2);
    assert_eq!(composition.spawns[0].point, composition.spawns[1].point);

    let spawns = spawn_times(&host);
    assert_eq!(spawns.len(), 2);
    let gap = spawns[1].0 - spawns[0].0;
    // Base delay is 0.5 with at most 0.16 of jitter, plus 3 s for stacking
    assert!(gap >= 3.3, "gap {}", gap);
    assert!(gap <= 3.8, "gap {}", gap);
}

#[test]
fn test_combat_holds_back_encounters() {
    let mut host = bandit_map();
    let mut scheduler = AmbientScheduler::with_seed(AmbientConfig::default(), DefinitionCatalog::new(), 8);
    scheduler.on_map_loaded(&mut host);

    for _ in 0..3000 {
        host.advance(0.1);
        if let Some(p) = host.player_mut() {
            p.since_input = 0.0;
            p.since_combat = Some(1.0);
        }
        scheduler.tick(&mut host);
    }
    assert!(host.actors().is_empty());
    assert!(scheduler.stats().suppressed > 0);

    scheduler.set_allow_in_combat(true);
    for _ in 0..3000 {
        host.advance(0.1);
        if let Some(p) = host.player_mut() {
            p.since_input = 0.0;
            p.since_combat = Some(1.0);
        }
        scheduler.tick(&mut host);
    }
    assert!(!host.actors().is_empty());
}

#[test]
fn test_no_player_no_spawns() {
    let mut host = bandit_map();
    host.set_player(None);
    let mut scheduler = AmbientScheduler::with_seed(AmbientConfig::default(), DefinitionCatalog::new(), 8);
    scheduler.on_map_loaded(&mut host);
    run(&mut scheduler, &mut host, 500.0);
    assert!(host.actors().is_empty());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
}

#[test]
fn test_same_seed_same_encounters() {
    let play = |seed: u64| {
        let mut host = bandit_map();
        let mut scheduler = AmbientScheduler::with_seed(AmbientConfig::default(), DefinitionCatalog::new(), seed);
        scheduler.on_map_loaded(&mut host);
        run(&mut scheduler, &mut host, 600.0);
        spawn_times(&host)
    };
    let first = play(99);
    assert!(!first.is_empty());
    assert_eq!(first, play(99));
}

#[test]
fn test_map_transition_resets_session() {
    let mut host = bandit_map();
    let mut scheduler = AmbientScheduler::with_seed(AmbientConfig::default(), DefinitionCatalog::new(), 1);
    scheduler.on_map_loaded(&mut host);
    assert_eq!(scheduler.registry().map(|r| r.len()), Some(1));

    scheduler.on_map_leaving();
    host.travel("Dam_P");
    let location = Vec3::new(0.0, 2500.0, 0.0);
    let mut den = Den::new(DenId(7), location);
    den.native = Some("PopDef_Marauders".into());
    den.allegiance = Some(Allegiance::from("Bandits"));
    den.points.push(bandit_point(70, location));
    host.add_den(den);
    scheduler.on_map_loaded(&mut host);

    assert_eq!(scheduler.map_name(), Some("Dam_P"));
    let registry = scheduler.registry().expect("session active");
    assert!(registry.info(DenId(1)).is_none());
    assert!(registry.info(DenId(7)).is_some());
    assert_eq!(scheduler.stats().sessions, 2);
}

#[test]
fn test_mega_mix_substitutes_equivalent_factories() {
    let catalog = DefinitionCatalog::from_toml_str(
        r#"
        [pack]
        id = "base"
        maps = ["Fyrestone_P"]

        [[spawn]]
        name = "Marauder squad"
        factory = "Marauder"
        counts = [4]
        "#,
    )
    .expect("valid catalog");

    let mut config = AmbientConfig::default();
    config.scope = SpawnScope::Pack;
    config.custom_spawn_percentage = 100;
    config.mega_mix = true;
    config.filters.equivalence_pools = vec![vec!["Marauder".into(), "Nomad_Grunt".into()]];

    let mut host = bandit_map();
    let mut scheduler = AmbientScheduler::with_seed(config, catalog, 17);
    scheduler.on_main_menu(&mut host);
    scheduler.on_map_loaded(&mut host);
    assert_eq!(scheduler.substitution().len(), 1);

    run(&mut scheduler, &mut host, 2000.0);
    let spawned: Vec<&str> = host.actors().iter().map(|a| a.factory.as_str()).collect();
    assert!(spawned.len() >= 8);
    assert!(spawned.contains(&"Nomad_Grunt"));
    assert!(spawned.iter().all(|f| *f == "Marauder" || *f == "Nomad_Grunt"));
}

fn demo_catalog() -> DefinitionCatalog {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/packs");
    DefinitionCatalog::load_directory(&dir).expect("demo catalogs load")
}

/// A map where both bandit customs and the helios nomad pool fit
fn helios_ready_map() -> MemoryHost {
    let mut host = bandit_map();
    host.add_factory(FactoryInfo::pawn("Psycho", "AI_Psycho", Some(BodyTag::from("Bandit"))));
    host.add_factory(FactoryInfo::pawn("Nomad_Taskmaster", "AI_Taskmaster", Some(BodyTag::from("Bandit"))));
    host.add_collection(CollectionInfo {
        id: "PopDef_Bandits".into(),
        entries: vec![
            CollectionEntry::Factory("Marauder".into()),
            CollectionEntry::Factory("Psycho".into()),
        ],
        unique: false,
    });
    host.add_package(
        "Helios_Combat",
        vec![FactoryInfo::pawn("Loader_GUN", "AI_Loader", Some(BodyTag::from("Loader")))],
        Vec::new(),
    );
    host
}

fn custom_names(scheduler: &AmbientScheduler, den: DenId) -> Vec<String> {
    let registry = scheduler.registry().expect("session active");
    let info = registry.info(den).expect("den admitted");
    info.custom
        .iter()
        .filter_map(|&i| registry.definition(i))
        .map(|d| d.name.clone())
        .collect()
}

#[test]
fn test_scope_widens_custom_spawns() {
    let mut config = AmbientConfig::default();
    config.scope = SpawnScope::Pack;
    let mut host = helios_ready_map();
    let mut scheduler = AmbientScheduler::with_seed(config, demo_catalog(), 4);

    scheduler.on_main_menu(&mut host);
    scheduler.on_map_loaded(&mut host);
    let pack_scope = custom_names(&scheduler, DenId(1));
    assert!(pack_scope.contains(&"Bandit camp".to_string()));
    assert!(pack_scope.contains(&"Nomad commander".to_string()));
    assert!(!pack_scope.contains(&"Loader or nomads".to_string()));

    // Going global only takes effect after the main menu
    assert!(!scheduler.set_scope(SpawnScope::Global));
    scheduler.on_main_menu(&mut host);
    assert_eq!(host.package_load_count(), 1);
    scheduler.on_map_loaded(&mut host);
    let global_scope = custom_names(&scheduler, DenId(1));
    assert!(global_scope.contains(&"Loader or nomads".to_string()));
    for name in &pack_scope {
        assert!(global_scope.contains(name));
    }

    // Dropping back to level scope releases every pinned object
    assert!(scheduler.set_scope(SpawnScope::Level));
    scheduler.on_main_menu(&mut host);
    assert_eq!(scheduler.content().pinned_count(), 0);
}
