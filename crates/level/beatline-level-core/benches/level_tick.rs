use beatline_level::beatline_sequence::Keyframe;
use beatline_level::{
    AutoKill, BeatmapObject, LevelData, LevelEngine, ObjectId, PrefabInstance, PrefabTemplate,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// `count` objects staggered 50ms apart, each living two seconds, every fourth one parented to
/// the object before it.
fn synthetic_level(count: usize) -> LevelData {
    let objects = (0..count)
        .map(|i| {
            let mut obj = BeatmapObject::new(format!("o{i}"), i as f32 * 0.05);
            obj.autokill = AutoKill::FixedTime { offset: 2.0 };
            obj.events.position = vec![
                Keyframe::new(0.0, [0.0, 0.0]),
                Keyframe::new(2.0, [i as f32, 1.0]),
            ];
            if i % 4 == 3 {
                obj.parent = Some(ObjectId::from(format!("o{}", i - 1)));
            }
            obj
        })
        .collect();
    LevelData {
        objects,
        ..LevelData::default()
    }
}

fn bench_forward_playback(c: &mut Criterion) {
    let mut engine = LevelEngine::default();
    engine.load_level(synthetic_level(2_000));
    let end = 2_000.0 * 0.05 + 2.0;

    c.bench_function("forward_playback_60fps", |b| {
        b.iter(|| {
            let mut t = 0.0f32;
            while t <= end {
                black_box(engine.update(t).active_count);
                t += 1.0 / 60.0;
            }
            engine.update(f32::NEG_INFINITY);
        });
    });
}

fn bench_scrub(c: &mut Criterion) {
    let mut engine = LevelEngine::default();
    engine.load_level(synthetic_level(2_000));

    c.bench_function("scrub_jumps", |b| {
        b.iter(|| {
            for t in [80.0f32, 3.0, 55.5, 0.0, 101.0, 20.0] {
                black_box(engine.update(t).events.len());
            }
        });
    });
}

fn bench_prefab_expand(c: &mut Criterion) {
    let template = PrefabTemplate {
        id: "burst".into(),
        name: String::new(),
        offset: 0.0,
        objects: (0..16)
            .map(|i| BeatmapObject::new(format!("t{i}"), i as f32 * 0.1))
            .collect(),
        instances: Vec::new(),
    };
    let mut engine = LevelEngine::default();
    engine.load_level(LevelData {
        prefabs: vec![template],
        ..LevelData::default()
    });

    c.bench_function("expand_instance_x32", |b| {
        b.iter(|| {
            let mut instance = PrefabInstance::new("bench", "burst", 1.0);
            instance.repeat_count = 31;
            let report = engine.expand_prefab_instance(instance).unwrap();
            black_box(report.pairs.len());
        });
    });
}

criterion_group!(benches, bench_forward_playback, bench_scrub, bench_prefab_expand);
criterion_main!(benches);
