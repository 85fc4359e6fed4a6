use beatline_level::{
    IdSeeder, InstanceId, LevelConfig, LevelData, LevelEngine, LevelRegistry, ObjectId,
    PrefabExpander, PrefabInstance,
};
use hashbrown::HashSet;

fn fixture() -> LevelData {
    beatline_test_fixtures::levels::load("prefab-repeat").expect("load prefab-repeat fixture")
}

fn loaded(config: LevelConfig) -> LevelEngine {
    let mut engine = LevelEngine::new(config);
    engine.load_level(fixture());
    engine
}

fn clone_ids(engine: &LevelEngine, instance: &str) -> HashSet<ObjectId> {
    let instance = InstanceId::from(instance);
    engine
        .registry()
        .objects_of_instance(&instance)
        .map(|o| o.id.clone())
        .collect()
}

/// it should clone every template object once per repetition at shifted start times
#[test]
fn repeats_are_shifted_and_remapped() {
    let mut engine = loaded(LevelConfig::default());
    let pulses = InstanceId::from("pulses");
    assert_eq!(clone_ids(&engine, "pulses").len(), 6);

    let seeder = engine.seeder().clone();
    for rep in 0..3u32 {
        let ring_id = seeder.object_id(&ObjectId::from("ring"), &pulses, rep);
        let dot_id = seeder.object_id(&ObjectId::from("dot"), &pulses, rep);
        let ring = engine.registry().object(&ring_id).expect("ring clone");
        let dot = engine.registry().object(&dot_id).expect("dot clone");

        assert_eq!(ring.start_time, rep as f32);
        assert_eq!(ring.parent, Some(ObjectId::from("anchor")));
        assert_eq!(dot.parent, Some(ring_id.clone()));
        let origin = ring.prefab.as_ref().unwrap();
        assert_eq!(origin.instance, pulses);
        assert_eq!(origin.template_object, ObjectId::from("ring"));
    }

    engine.update(1.2);
    let active: Vec<ObjectId> = engine
        .active_ids()
        .filter(|id| clone_ids(&engine, "pulses").contains(*id))
        .cloned()
        .collect();
    assert_eq!(active.len(), 2);
    assert!(active.contains(&seeder.object_id(&ObjectId::from("ring"), &pulses, 1)));
}

/// it should expand sub-prefabs with their own ids and attribute them to the placed instance
#[test]
fn nested_templates_expand_inline() {
    let engine = loaded(LevelConfig::default());
    let bursts = clone_ids(&engine, "bursts");
    assert_eq!(bursts.len(), 3);

    let nested_ring = engine
        .registry()
        .objects_of_instance(&InstanceId::from("bursts"))
        .find(|o| o.prefab.as_ref().unwrap().template_object.as_str() == "ring")
        .expect("ring from the nested pulse");
    assert_eq!(nested_ring.start_time, 11.0);
    assert!(clone_ids(&engine, "pulses").is_disjoint(&bursts));
}

/// it should drop instances whose template no longer exists
#[test]
fn dangling_instance_is_removed_on_load() {
    let engine = loaded(LevelConfig::default());
    assert!(engine.registry().instance(&InstanceId::from("orphaned")).is_none());
    assert!(engine.registry().instance(&InstanceId::from("pulses")).is_some());
}

/// it should generate the same ids for the same seed and different ids for another seed
#[test]
fn ids_depend_only_on_seed_and_placement() {
    let a = loaded(LevelConfig::default());
    let b = loaded(LevelConfig::default());
    assert_eq!(clone_ids(&a, "pulses"), clone_ids(&b, "pulses"));

    let reseeded = loaded(LevelConfig {
        seed: 99,
        ..LevelConfig::default()
    });
    assert!(clone_ids(&a, "pulses").is_disjoint(&clone_ids(&reseeded, "pulses")));
}

/// it should regenerate identical clones when a saved level is loaded again
#[test]
fn reload_replaces_stale_clones() {
    let engine = loaded(LevelConfig::default());
    let saved = engine.registry().to_level_data();
    let total = saved.objects.len();

    let mut again = LevelEngine::default();
    again.load_level(saved);
    assert_eq!(again.registry().objects().count(), total);
    assert_eq!(clone_ids(&engine, "pulses"), clone_ids(&again, "pulses"));
}

/// it should step through repetitions lazily without touching the registry
#[test]
fn expansion_steps_one_repetition_at_a_time() {
    let registry = LevelRegistry::from_level(fixture());
    let seeder = IdSeeder::new(3);
    let config = LevelConfig::default();
    let expander = PrefabExpander::new(&registry, &seeder, &config);

    let mut instance = PrefabInstance::new("fresh", "pulse", 20.0);
    instance.repeat_count = 3;
    instance.repeat_offset_time = Some(0.25);
    instance.speed = 2.0;

    let mut steps = expander.steps(&instance).unwrap();
    assert_eq!(steps.remaining(), 4);
    let first = steps.next().unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(first.objects.len(), 2);
    assert_eq!(steps.remaining(), 3);

    let rest: Vec<_> = steps.collect();
    assert_eq!(rest.len(), 3);
    let last_ring = rest[2]
        .objects
        .iter()
        .find(|o| o.prefab.as_ref().unwrap().template_object.as_str() == "ring")
        .unwrap();
    assert_eq!(last_ring.start_time, 20.75);
    // double speed halves the keyframe timeline and the fixed lifetime
    assert_eq!(last_ring.kill_time(None), 21.0);
    assert_eq!(registry.objects().count(), 1);

    let missing = PrefabInstance::new("x", "nope", 0.0);
    assert!(expander.expand(&missing).is_err());
}
