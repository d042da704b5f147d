//! End-to-end exercise of the public API: build a space with a dynamic
//! placeholder, resolve it fully, and check the search driver's view.

use rand::rngs::StdRng;
use rand::SeedableRng;

use hyperspace::{
    get_default_space, Direction, DynamicModule, HyperInput, Identity, ParamSpec, Space, Value,
};

/// A small conv-ish stack: input feeds a parameterized block, a placeholder
/// decides between one and two tail layers, and a head collects both.
fn build_space() -> Space {
    let space = Space::new();
    {
        let _guard = space.as_default();
        let input = HyperInput::new();
        let block = Identity::with_params([
            ("units", ParamSpec::choice([64, 128, 256])),
            ("depth", ParamSpec::int(1, 4)),
            ("dropout", ParamSpec::real(0.0, 0.5)),
        ]);
        block.connect([&input]).unwrap();

        let tail = DynamicModule::new(
            |placeholder| {
                let deep = placeholder
                    .param("deep")
                    .and_then(|p| p.value())
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let first = Identity::with_params([("scale", ParamSpec::real(0.5, 2.0))]);
                if !deep {
                    return Ok((first.clone(), first));
                }
                let second = Identity::new();
                second.connect([&first]).map_err(|e| e.to_string())?;
                Ok((first, second))
            },
            [("deep", ParamSpec::choice([true, false]))],
        )
        .unwrap();
        tail.connect([&block]).unwrap();

        let head = Identity::with_params([(
            "budget",
            ParamSpec::dynamic(
                |args| Value::Int(args["width"].as_int().unwrap() * 2),
                [("width", ParamSpec::choice([8, 16]))],
            ),
        )]);
        head.connect([&tail]).unwrap();
    }
    space
}

#[test]
fn test_full_resolution() {
    let space = build_space();
    assert!(!space.all_assigned());

    space
        .random_sample_with(&mut StdRng::seed_from_u64(17))
        .unwrap();
    assert!(space.all_assigned());
    assert!(space.get_assignable_params().is_empty());

    // The placeholder expanded: it is gone from the module set and the
    // graph still traverses end to end.
    assert!(space.module("DynamicModule_1").is_none());
    let mut visited = 0;
    let completed = space.traverse(Direction::Forward, |_| {
        visited += 1;
        true
    });
    assert!(completed);
    assert_eq!(visited, space.module_count());

    // The computed parameter follows its dependency.
    let width = space.param("Param_Choice_3").unwrap().value().unwrap();
    let budget = space.param("Param_Dynamic_1").unwrap().value().unwrap();
    assert_eq!(budget.as_int(), width.as_int().map(|w| w * 2));

    // The exported configuration is plain serializable data.
    let config = space.assigned_vector();
    assert!(config.iter().all(|(name, _)| name.starts_with("Param_")));
    serde_json::to_string(&config).unwrap();
}

#[test]
fn test_resolution_is_deterministic_for_a_seed() {
    let sample = |seed: u64| {
        let space = build_space();
        space
            .random_sample_with(&mut StdRng::seed_from_u64(seed))
            .unwrap();
        space.assigned_vector()
    };
    assert_eq!(sample(99), sample(99));
}

#[test]
fn test_default_space_scoping() {
    let root = get_default_space();
    let g = Space::new();
    {
        let _g1 = g.as_default();
        assert_eq!(get_default_space(), g);
        assert_ne!(get_default_space(), root);

        let g2 = Space::new();
        {
            let _g2 = g2.as_default();
            assert_eq!(get_default_space(), g2);
        }
        assert_eq!(get_default_space(), g);
    }
    assert_eq!(get_default_space(), root);
}

#[test]
fn test_implicit_registration_into_root() {
    // No guard: constructors land in the thread's root space.
    let before = get_default_space().module_count();
    let m = HyperInput::new();
    assert_eq!(m.space(), get_default_space());
    assert_eq!(get_default_space().module_count(), before + 1);
}

#[test]
fn test_threads_get_their_own_context() {
    let handle = std::thread::spawn(|| {
        let space = Space::new();
        let _guard = space.as_default();
        let input = HyperInput::new();
        let block = Identity::with_params([("units", ParamSpec::choice([1, 2]))]);
        block.connect([&input]).unwrap();
        space.random_sample().unwrap();
        assert!(space.all_assigned());
        space.assigned_vector().len()
    });
    assert_eq!(handle.join().unwrap(), 1);
}
