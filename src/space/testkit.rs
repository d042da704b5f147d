//! Shared test fixtures: the reference nine-module graph, with and without
//! a dynamic placeholder in the `id4` position.

use crate::{DynamicModule, HyperInput, Identity, ParamSpec, Space, Value};

/// Two inputs and seven `Identity` units:
///
/// ```text
/// id1([input1, id7])   id2([input1, input2])   id3([input2, id1, id2])
/// id4([input1, id2])   id5(input2)             id6(id3)
/// id7([id4, id5])
/// ```
///
/// `id3` carries a dynamic parameter `p4 = p5 * 3` over `p5 ∈ {2, 4, 8}`.
pub(crate) fn reference_space() -> Space {
    let space = Space::new();
    {
        let _guard = space.as_default();
        let input1 = HyperInput::new();
        let input2 = HyperInput::new();

        let id1 = Identity::with_params([
            ("p1", ParamSpec::choice([1, 2])),
            ("p2", ParamSpec::int(1, 100)),
        ]);
        let id2 = Identity::with_params([("p3", ParamSpec::real(0.0, 1.0))]);
        let id3 = Identity::with_params([(
            "p4",
            ParamSpec::dynamic(
                |args| Value::Int(args["p5"].as_int().unwrap() * 3),
                [("p5", ParamSpec::choice([2, 4, 8]))],
            ),
        )]);
        let id4 = Identity::new();
        let id5 = Identity::new();
        let id6 = Identity::new();
        let id7 = Identity::new();

        id1.connect([&input1, &id7]).unwrap();
        id2.connect([&input1, &input2]).unwrap();
        id3.connect([&input2, &id1, &id2]).unwrap();
        id4.connect([&input1, &id2]).unwrap();
        id5.connect([&input2]).unwrap();
        id6.connect([&id3]).unwrap();
        id7.connect([&id4, &id5]).unwrap();
    }
    space
}

/// Same shape, but the `id4` position is an unbuilt placeholder governed by
/// `p6 ∈ {f, g}`; its builder yields a single `Identity` with `dp1 ∈ {a, b}`
/// as both head and tail.
pub(crate) fn reference_space_with_dynamic() -> Space {
    let space = Space::new();
    {
        let _guard = space.as_default();
        let input1 = HyperInput::new();
        let input2 = HyperInput::new();

        let id1 = Identity::with_params([
            ("p1", ParamSpec::choice([1, 2])),
            ("p2", ParamSpec::int(1, 100)),
        ]);
        let id2 = Identity::with_params([("p3", ParamSpec::real(0.0, 1.0))]);
        let id3 = Identity::with_params([(
            "p4",
            ParamSpec::dynamic(
                |args| Value::Int(args["p5"].as_int().unwrap() * 3),
                [("p5", ParamSpec::choice([2, 4, 8]))],
            ),
        )]);
        let id4 = DynamicModule::new(
            |_placeholder| {
                let dm1 = Identity::with_params([("dp1", ParamSpec::choice(["a", "b"]))]);
                Ok((dm1.clone(), dm1))
            },
            [("p6", ParamSpec::choice(["f", "g"]))],
        )
        .unwrap();
        let id5 = Identity::new();
        let id6 = Identity::new();
        let id7 = Identity::new();

        id1.connect([&input1, &id7]).unwrap();
        id2.connect([&input1, &input2]).unwrap();
        id3.connect([&input2, &id1, &id2]).unwrap();
        id4.connect([&input1, &id2]).unwrap();
        id5.connect([&input2]).unwrap();
        id6.connect([&id3]).unwrap();
        id7.connect([&id4, &id5]).unwrap();
    }
    space
}
