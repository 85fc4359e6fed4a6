use std::cell::RefCell;
use std::rc::Rc;

use beatline_level::{
    AutoKill, BeatmapObject, InstanceId, LevelConfig, LevelData, LevelEngine, LevelError,
    ModifierHost, ObjectId, PrefabInstance, PrefabSpawnMode, PrefabTemplate, Room, RuntimeObject,
};

fn level(name: &str) -> LevelData {
    beatline_test_fixtures::levels::load(name).expect("load level fixture")
}

fn nested() -> LevelConfig {
    LevelConfig {
        prefab_spawn_mode: PrefabSpawnMode::Nested,
        ..LevelConfig::default()
    }
}

fn clone_of(id: &str, room: u32) -> BeatmapObject {
    let mut obj = BeatmapObject::new(id, 0.0);
    obj.autokill = AutoKill::FixedTime { offset: 5.0 };
    obj.room = Room(room);
    obj
}

fn template(id: &str, objects: Vec<BeatmapObject>) -> PrefabTemplate {
    PrefabTemplate {
        id: id.into(),
        name: String::new(),
        offset: 0.0,
        objects,
        instances: Vec::new(),
    }
}

fn active_sorted(engine: &LevelEngine) -> Vec<String> {
    let mut ids: Vec<String> = engine.active_ids().map(|id| id.to_string()).collect();
    ids.sort();
    ids
}

#[derive(Clone, Debug, PartialEq)]
enum HostCall {
    Active(String, bool),
    Tick(String, f32),
}

#[derive(Clone, Default)]
struct RecordingHost(Rc<RefCell<Vec<HostCall>>>);

impl ModifierHost for RecordingHost {
    fn set_active(&mut self, block: &ObjectId, _target: Option<&ObjectId>, active: bool) {
        self.0
            .borrow_mut()
            .push(HostCall::Active(block.to_string(), active));
    }

    fn tick(&mut self, block: &ObjectId, _target: Option<&ObjectId>, time: f32) {
        self.0.borrow_mut().push(HostCall::Tick(block.to_string(), time));
    }
}

/// it should leave cyclic chains out and keep playing everything else
#[test]
fn cyclic_parents_are_skipped() {
    let mut engine = LevelEngine::default();
    engine.load_level(level("cyclic-parents"));
    assert!(engine.object(&ObjectId::from("a")).is_none());
    assert!(engine.object(&ObjectId::from("b")).is_none());

    engine.update(1.0);
    assert_eq!(active_sorted(&engine), vec!["c", "d"]);

    // missing parent: chain stops at the object itself
    let Some(RuntimeObject::Visual(c)) = engine.object(&ObjectId::from("c")) else {
        panic!("c should compile");
    };
    assert_eq!(c.chain.len(), 1);
}

/// it should reject an edit that closes a parent cycle without disturbing playback
#[test]
fn edit_creating_a_cycle_fails() {
    let mut engine = LevelEngine::default();
    engine.load_level(level("cyclic-parents"));
    engine.update(1.0);

    let mut e = BeatmapObject::new("e", 0.0);
    e.parent = Some(ObjectId::from("a"));
    assert!(engine.insert_object(e).is_err());
    assert!(engine.registry().object(&ObjectId::from("e")).is_none());
    assert_eq!(active_sorted(&engine), vec!["c", "d"]);
}

/// it should run a nested prefab instance as one object with its own spawner
#[test]
fn nested_runner_activates_children_independently() {
    let config: LevelConfig = beatline_test_fixtures::levels::config("prefab-nested")
        .expect("read config")
        .expect("prefab-nested has a config");
    assert_eq!(config.prefab_spawn_mode, PrefabSpawnMode::Nested);

    let mut engine = LevelEngine::new(config);
    engine.load_level(level("prefab-nested"));
    let pulses = InstanceId::from("pulses");
    let key = ObjectId::prefab_runner(&pulses);
    let ring = |rep: u32| {
        engine
            .seeder()
            .object_id(&ObjectId::from("ring"), &pulses, rep)
    };
    let (ring0, ring1) = (ring(0), ring(1));

    // clones are not registered with the level spawner on their own
    assert!(engine.object(&ring0).is_none());

    engine.update(0.2);
    assert!(engine.is_active(&key));
    let Some(runner) = engine.prefab_runner(&pulses) else {
        panic!("pulses should run nested");
    };
    assert_eq!(runner.children().count(), 6);
    assert!(runner.is_child_active(&ring0));
    assert!(!runner.is_child_active(&ring1));

    engine.update(1.2);
    let Some(runner) = engine.prefab_runner(&pulses) else {
        panic!("pulses should run nested");
    };
    assert!(!runner.is_child_active(&ring0));
    assert!(runner.is_child_active(&ring1));

    engine.update(3.0);
    assert!(!engine.is_active(&key));
    let Some(runner) = engine.prefab_runner(&pulses) else {
        panic!("pulses should run nested");
    };
    assert_eq!(runner.active_children().count(), 0);

    // rewinding back into the window restarts the runner's own clock
    engine.update(0.1);
    let Some(runner) = engine.prefab_runner(&pulses) else {
        panic!("pulses should run nested");
    };
    assert!(runner.is_child_active(&ring0));
}

/// it should remove a nested instance together with its runner
#[test]
fn removing_a_nested_instance_drops_the_runner() {
    let mut engine = LevelEngine::new(nested());
    engine.load_level(level("prefab-repeat"));
    let bursts = InstanceId::from("bursts");
    let key = ObjectId::prefab_runner(&bursts);
    engine.update(10.5);
    assert!(engine.is_active(&key));

    engine.remove_prefab_instance(&bursts).unwrap();
    assert!(engine.prefab_runner(&bursts).is_none());
    assert!(engine.object(&key).is_none());
    assert!(!engine.is_active(&key));
    assert_eq!(engine.registry().objects_of_instance(&bursts).count(), 0);
}

/// it should keep clones outside the current room dormant in both spawn modes
#[test]
fn nested_clones_follow_the_room() {
    for mode in [PrefabSpawnMode::Flatten, PrefabSpawnMode::Nested] {
        let mut engine = LevelEngine::new(LevelConfig {
            prefab_spawn_mode: mode,
            ..LevelConfig::default()
        });
        engine.load_level(LevelData {
            prefabs: vec![template("split", vec![clone_of("hall", 0), clone_of("cellar", 2)])],
            ..LevelData::default()
        });
        let report = engine
            .expand_prefab_instance(PrefabInstance::new("rooms", "split", 0.0))
            .unwrap();
        let instance = InstanceId::from("rooms");
        let cellar = engine
            .seeder()
            .object_id(&ObjectId::from("cellar"), &instance, 0);
        assert!(report.object_ids().any(|id| id == &cellar));
        let cellar_live = |engine: &LevelEngine| match engine.prefab_runner(&instance) {
            Some(runner) => runner.is_child_active(&cellar),
            None => engine.is_active(&cellar),
        };

        engine.set_room(Room(1));
        engine.update(1.0);
        assert!(!cellar_live(&engine), "{mode:?}: cellar live in room 1");
        assert_eq!(
            engine.prefab_runner(&instance).is_some(),
            mode == PrefabSpawnMode::Nested
        );

        engine.set_room(Room(2));
        engine.update(1.5);
        assert!(cellar_live(&engine), "{mode:?}: cellar dormant in room 2");

        engine.set_room(Room(1));
        assert!(!cellar_live(&engine), "{mode:?}: cellar kept after leaving room 2");
    }
}

/// it should spawn nested clones that share a start time in expansion order
#[test]
fn nested_ties_keep_expansion_order() {
    let objects = (0..12).map(|i| clone_of(&format!("spark-{i}"), 0)).collect();
    let mut engine = LevelEngine::new(nested());
    engine.load_level(LevelData {
        prefabs: vec![template("sparks", objects)],
        ..LevelData::default()
    });
    let report = engine
        .expand_prefab_instance(PrefabInstance::new("shower", "sparks", 0.0))
        .unwrap();
    engine.update(0.5);

    let Some(runner) = engine.prefab_runner(&InstanceId::from("shower")) else {
        panic!("shower should run nested");
    };
    let expanded: Vec<&ObjectId> = report.object_ids().collect();
    assert_eq!(runner.active_children().collect::<Vec<_>>(), expanded);
    let listed: Vec<&ObjectId> = runner.children().map(|(id, _)| id).collect();
    assert_eq!(listed, expanded);
}

/// it should keep authored objects and nested runners apart even when their names match
#[test]
fn runner_keys_do_not_shadow_objects() {
    let mut engine = LevelEngine::new(nested());
    engine.load_level(level("prefab-repeat"));
    let pulses = InstanceId::from("pulses");
    let mut lookalike = BeatmapObject::new("pulses", 0.0);
    lookalike.autokill = AutoKill::SongTime { time: 4.0 };
    engine.insert_object(lookalike).unwrap();
    engine.update(0.2);

    assert!(matches!(
        engine.object(&ObjectId::from("pulses")),
        Some(RuntimeObject::Visual(_))
    ));
    assert!(engine.is_active(&ObjectId::from("pulses")));
    let Some(runner) = engine.prefab_runner(&pulses) else {
        panic!("pulses should still run nested");
    };
    assert_eq!(runner.children().count(), 6);
    assert!(engine.is_active(&ObjectId::prefab_runner(&pulses)));

    let squatter = BeatmapObject::new(ObjectId::prefab_runner(&pulses), 0.0);
    assert!(matches!(
        engine.insert_object(squatter),
        Err(LevelError::ReservedId { .. })
    ));
    assert!(engine.prefab_runner(&pulses).is_some());
}

/// it should drive background layers and hand modifier blocks to the host
#[test]
fn backgrounds_and_modifiers() {
    let host = RecordingHost::default();
    let calls = host.0.clone();
    let mut engine = LevelEngine::default().with_modifier_host(Box::new(host));
    engine.load_level(level("backdrop"));

    engine.update(3.0);
    let Some(RuntimeObject::Background(hills)) = engine.object(&ObjectId::from("hills")) else {
        panic!("hills should load");
    };
    assert_eq!(hills.layers.len(), 3);
    let back = engine.scene().get(hills.layers[2]).unwrap();
    assert_eq!(back.local.position[2], 12.0);
    assert!(back.renderer_enabled);

    assert_eq!(
        calls.borrow().as_slice(),
        &[
            HostCall::Active("shake".into(), true),
            HostCall::Tick("shake".into(), 3.0),
        ]
    );

    calls.borrow_mut().clear();
    engine.update(5.0);
    assert_eq!(
        calls.borrow().as_slice(),
        &[HostCall::Active("shake".into(), false)]
    );

    // tint lives in room 2 only
    calls.borrow_mut().clear();
    engine.update(7.0);
    assert!(calls.borrow().is_empty());
    engine.set_room(Room(2));
    assert!(calls.borrow().contains(&HostCall::Active("tint".into(), true)));
    assert!(engine.is_active(&ObjectId::from("hills")));

    // level length ends the background
    engine.update(12.0);
    assert!(!engine.is_active(&ObjectId::from("hills")));
}

/// it should rebuild children when their parent is removed mid-playback
#[test]
fn removing_a_parent_shortens_child_chains() {
    let mut engine = LevelEngine::default();
    engine.load_level(level("parent-chain"));
    engine.update(4.0);

    let removed = engine.remove_object(&ObjectId::from("middle")).unwrap();
    assert_eq!(removed.id.as_str(), "middle");
    let Some(RuntimeObject::Visual(leaf)) = engine.object(&ObjectId::from("leaf")) else {
        panic!("leaf should survive");
    };
    assert_eq!(leaf.chain.len(), 1);
    assert!(engine.is_active(&ObjectId::from("leaf")));
    assert!(engine.remove_object(&ObjectId::from("middle")).is_err());
}
