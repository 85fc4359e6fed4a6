use beatline_level::{
    LevelData, LevelEngine, LevelEvent, ObjectId, ObjectSpawner, SpawnEntry, Transition,
};

fn engine_for(name: &str) -> LevelEngine {
    let level: LevelData =
        beatline_test_fixtures::levels::load(name).expect("load level fixture");
    let mut engine = LevelEngine::default();
    engine.load_level(level);
    engine
}

fn active_sorted(engine: &LevelEngine) -> Vec<String> {
    let mut ids: Vec<String> = engine.active_ids().map(|id| id.to_string()).collect();
    ids.sort();
    ids
}

/// it should activate an object exactly inside [start, kill) while scrubbing both ways
#[test]
fn scrubbing_a_window_object() {
    let mut engine = engine_for("scrub-basic");
    let window = ObjectId::from("window");
    let steps = [
        (0.0, false),
        (2.0, true),
        (4.99, true),
        (5.0, false),
        (3.0, true),
        (1.99, false),
        (2.0, true),
    ];
    for (time, expected) in steps {
        engine.update(time);
        assert_eq!(engine.is_active(&window), expected, "at t={time}");
    }
}

/// it should report the same active set at a time however the clock got there
#[test]
fn active_set_is_path_independent() {
    let targets = [0.0f32, 1.0, 2.5, 3.2, 4.0, 5.5, 31.0];
    for target in targets {
        let mut jumped = engine_for("scrub-basic");
        jumped.update(target);

        let mut stepped = engine_for("scrub-basic");
        let mut t = 40.0f32;
        while t > target {
            stepped.update(t);
            t -= 0.35;
        }
        stepped.update(target);

        assert_eq!(active_sorted(&jumped), active_sorted(&stepped), "at t={target}");
    }
}

/// it should emit spawn and despawn events only for the transitions crossed this tick
#[test]
fn tick_events_are_net_transitions() {
    let mut engine = engine_for("scrub-basic");
    let out = engine.update(0.0);
    assert_eq!(
        out.events,
        vec![LevelEvent::Spawned {
            id: ObjectId::from("forever")
        }]
    );

    let out = engine.update(3.2);
    let mut spawned: Vec<&str> = out.spawned().map(|id| id.as_str()).collect();
    spawned.sort();
    assert_eq!(spawned, vec!["flash", "sweep", "window"]);
    assert_eq!(out.active_count, 4);

    // flash lives 3.0..3.5; jumping over its whole span reports nothing for it
    engine.update(1.0);
    let out = engine.update(4.0);
    assert!(out.spawned().all(|id| id.as_str() != "flash"));
    assert!(out.despawned().all(|id| id.as_str() != "flash"));
}

/// it should kill never-autokilled objects at the level length
#[test]
fn no_autokill_ends_with_the_level() {
    let mut engine = engine_for("scrub-basic");
    engine.update(29.9);
    assert_eq!(active_sorted(&engine), vec!["forever"]);
    engine.update(30.0);
    assert!(active_sorted(&engine).is_empty());
}

/// it should keep equal start times in insertion order and replay inserts at the current time
#[test]
fn raw_spawner_ordering_and_inserts() {
    let mut spawner = ObjectSpawner::new(vec![
        SpawnEntry::new("b", 1.0, 3.0),
        SpawnEntry::new("a", 1.0, 3.0),
        SpawnEntry::new("c", 0.0, 0.5),
    ]);
    let mut log: Vec<Transition<&str>> = Vec::new();
    spawner.update(2.0, &mut log);
    assert_eq!(log, vec![Transition::Spawned("b"), Transition::Spawned("a")]);
    assert_eq!(spawner.active().copied().collect::<Vec<_>>(), vec!["b", "a"]);

    log.clear();
    spawner.insert_object(SpawnEntry::new("d", 1.5, 2.5), true, &mut log);
    assert_eq!(log, vec![Transition::Spawned("d")]);

    log.clear();
    assert!(spawner.remove_object(&"a", true, &mut log));
    assert_eq!(log, vec![Transition::Despawned("a")]);
    assert!(!spawner.remove_object(&"a", true, &mut log));

    log.clear();
    spawner.update(f32::NEG_INFINITY, &mut log);
    assert_eq!(spawner.active_len(), 0);
    assert_eq!(log.len(), 2);
}
