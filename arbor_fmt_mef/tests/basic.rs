use std::path::PathBuf;

use arbor_core::{Error, Operator, Settings};
use arbor_fmt_mef::Initializer;

fn input(name: &str) -> PathBuf {
    PathBuf::from(format!("./tests/input/{name}"))
}

fn process(names: &[&str]) -> Result<arbor_core::Model, Error> {
    let files: Vec<PathBuf> = names.iter().map(|name| input(name)).collect();
    Initializer::process(&files, Settings::default())
}

#[test]
fn two_basic_events_under_one_gate() -> anyhow::Result<()> {
    let model = process(&["two_events.xml"])?;
    assert_eq!(model.name(), "two-events");
    assert_eq!(model.gates().count(), 1);
    assert_eq!(model.basic_events().count(), 2);

    let gate = model.get_gate("G1", "").unwrap();
    let formula = model.gate(gate).formula().unwrap();
    assert_eq!(formula.operator(), Operator::And);
    assert_eq!(formula.args().len(), 2);
    assert_eq!(
        model.gate(gate).scoped().element().label(),
        Some("Both pumps fail")
    );

    let tree = model.get_fault_tree("top").unwrap();
    assert_eq!(model.fault_tree(tree).top_events(), &[gate]);
    Ok(())
}

#[test]
fn gate_cycle_is_fatal() {
    let err = process(&["cycle.xml"]).unwrap_err();
    match err {
        Error::Cycle(msg) => {
            assert!(msg.contains("G1") && msg.contains("G2"), "{msg}");
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn forward_reference_within_one_file() -> anyhow::Result<()> {
    let model = process(&["forward_ref.xml"])?;
    let event = model.get_basic_event("BE1", "ft").unwrap();
    let expression = model.basic_event(event).expression().unwrap();
    assert_eq!(model.as_constant(expression), Some(0.25));
    Ok(())
}

#[test]
fn cross_file_reference() -> anyhow::Result<()> {
    let model = process(&["lib_events.xml", "lib_user.xml"])?;
    // BE1 lives at the model scope, declared by the library file.
    assert!(model.get_basic_event("BE1", "").is_some());
    assert!(model.get_gate("top", "consumer").is_some());
    Ok(())
}

#[test]
fn input_order_does_not_matter() -> anyhow::Result<()> {
    let forward = process(&["lib_events.xml", "lib_user.xml"])?;
    let backward = process(&["lib_user.xml", "lib_events.xml"])?;
    assert_eq!(
        forward.basic_events().count(),
        backward.basic_events().count()
    );
    assert_eq!(forward.gates().count(), backward.gates().count());
    assert!(backward.get_basic_event("BE1", "").is_some());
    Ok(())
}

#[test]
fn beta_factor_group_rejects_extra_factors() {
    let err = process(&["ccf_beta.xml"]).unwrap_err();
    match err {
        Error::Validation(msg) => {
            assert!(
                msg.contains("Invalid distributions for CCF groups detected"),
                "{msg}"
            );
            assert!(msg.contains("pumps"), "{msg}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn mgl_group_expands_members() -> anyhow::Result<()> {
    let model = process(&["ccf_mgl.xml"])?;
    let member = model.get_basic_event("V1", "cooling").unwrap();
    let gate = model.basic_event(member).ccf_gate().unwrap();
    // [V1], [V1 V2], [V1 V3], [V1 V2 V3]
    assert_eq!(model.gate(gate).formula().unwrap().args().len(), 4);
    Ok(())
}

#[test]
fn probability_analysis_requires_expressions() {
    let files = vec![input("missing_expr.xml")];
    let settings = Settings {
        probability_analysis: true,
        ..Settings::default()
    };
    let err = Initializer::process(&files, settings).unwrap_err();
    match err {
        Error::Validation(msg) => {
            assert!(
                msg.contains("These basic events do not have expressions"),
                "{msg}"
            );
            assert!(msg.contains("BE2"), "{msg}");
            assert!(!msg.contains("BE1"), "{msg}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn missing_expressions_are_fine_without_probability_analysis() -> anyhow::Result<()> {
    process(&["missing_expr.xml"])?;
    Ok(())
}

#[test]
fn vote_gate_round_trip() -> anyhow::Result<()> {
    let model = process(&["vote.xml"])?;
    let gate = model.get_gate("two-of-three", "voting").unwrap();
    let formula = model.gate(gate).formula().unwrap();
    assert_eq!(formula.operator(), Operator::Atleast);
    assert_eq!(formula.vote_number(), Some(2));
    Ok(())
}

#[test]
fn vote_number_out_of_range() {
    let err = process(&["vote_bad.xml"]).unwrap_err();
    match err {
        Error::Validation(msg) => assert!(msg.contains("vote number"), "{msg}"),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn lognormal_arity() {
    let err = process(&["lognormal_bad.xml"]).unwrap_err();
    match err {
        Error::Validation(msg) => {
            assert!(msg.contains("lognormal-deviate takes 2 or 3"), "{msg}");
            assert!(msg.contains("lognormal_bad.xml"), "{msg}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn periodic_test_arity() {
    let err = process(&["periodic_bad.xml"]).unwrap_err();
    match err {
        Error::Validation(msg) => {
            assert!(msg.contains("periodic-test takes 4, 5, or 11"), "{msg}")
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn private_names_are_invisible_to_siblings() {
    let err = process(&["private_scope.xml"]).unwrap_err();
    match err {
        Error::Validation(msg) => {
            assert!(msg.contains("Undefined basic-event X"), "{msg}");
            assert!(msg.contains("base path B"), "{msg}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn public_names_are_visible_to_siblings() -> anyhow::Result<()> {
    process(&["public_scope.xml"])?;
    Ok(())
}

#[test]
fn parameter_unit_mismatch() {
    let err = process(&["unit_mismatch.xml"]).unwrap_err();
    match err {
        Error::Validation(msg) => {
            assert!(msg.contains("Parameter unit mismatch"), "{msg}");
            assert!(msg.contains("hours") && msg.contains("years"), "{msg}");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn duplicate_input_paths() {
    let err = process(&["two_events.xml", "two_events.xml"]).unwrap_err();
    match err {
        Error::DuplicateArgument(msg) => {
            assert!(msg.contains("Duplicate input files"), "{msg}")
        }
        other => panic!("expected a duplicate-argument error, got {other:?}"),
    }
}

#[test]
fn missing_input_file() {
    let err = process(&["no_such_file.xml"]).unwrap_err();
    match err {
        Error::Io(msg) => assert!(msg.contains("File doesn't exist"), "{msg}"),
        other => panic!("expected an IO error, got {other:?}"),
    }
}

#[test]
fn non_positive_mission_time() {
    let files = vec![input("two_events.xml")];
    let settings = Settings {
        mission_time: 0.0,
        ..Settings::default()
    };
    assert!(matches!(
        Initializer::process(&files, settings),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn event_tree_round_trip() -> anyhow::Result<()> {
    let model = process(&["event_tree.xml"])?;
    let tree = model.get_event_tree("loca").unwrap();
    let tree = model.event_tree(tree);
    assert_eq!(tree.functional_events().len(), 1);
    assert_eq!(tree.sequences().len(), 2);
    assert!(tree.initial_state().is_some());

    // Sequences are public at the model scope.
    let sequence = model.get_sequence("core-damage").unwrap();
    assert_eq!(model.sequence(sequence).instructions().len(), 1);

    let recovery = tree.branch("recovery").unwrap();
    let branch = tree.named_branch(recovery).branch().unwrap();
    assert_eq!(branch.instructions().len(), 1);
    Ok(())
}

#[test]
fn branch_cycle_is_fatal() {
    let err = process(&["branch_cycle.xml"]).unwrap_err();
    match err {
        Error::Cycle(msg) => {
            assert!(msg.contains("branch"), "{msg}");
            assert!(msg.contains("a->b") || msg.contains("b->a"), "{msg}");
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn expression_grammar_round_trip() -> anyhow::Result<()> {
    let model = process(&["expressions.xml"])?;
    assert_eq!(model.basic_events().count(), 7);
    assert_eq!(model.parameters().count(), 2);
    // The histogram survives with its parallel sequences.
    let sensor = model.get_basic_event("sensor", "").unwrap();
    let expression = model.basic_event(sensor).expression().unwrap();
    match model.expression(expression) {
        arbor_core::Expression::Histogram {
            boundaries,
            weights,
        } => {
            assert_eq!(boundaries.len(), 3);
            assert_eq!(weights.len(), 2);
        }
        other => panic!("expected a histogram, got {other:?}"),
    }
    Ok(())
}
