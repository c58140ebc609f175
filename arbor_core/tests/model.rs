use arbor_core::cycle::{self, BranchGraph, GateGraph, ParameterGraph};
use arbor_core::*;

fn scoped(name: &str, base_path: &str) -> ScopedElement {
    ScopedElement::new(Element::new(name), base_path, Role::Public)
}

#[test]
fn fault_tree_top_events() -> Result<(), Error> {
    let mut model = Model::new("plant");
    let mut component = Component::new(scoped("cooling", ""));

    let be1 = model.add_basic_event(BasicEvent::new(scoped("pump-a", "cooling")))?;
    let be2 = model.add_basic_event(BasicEvent::new(scoped("pump-b", "cooling")))?;
    component.add_basic_event(be1);
    component.add_basic_event(be2);

    let lower = model.add_gate(Gate::new(scoped("pumps-fail", "cooling")))?;
    let top = model.add_gate(Gate::new(scoped("loss-of-cooling", "cooling")))?;
    component.add_gate(lower);
    component.add_gate(top);

    let mut formula = Formula::new(Operator::And);
    formula.add_event(EventId::Basic(be1), "pump-a")?;
    formula.add_event(EventId::Basic(be2), "pump-b")?;
    formula.validate()?;
    model.gate_mut(lower).set_formula(formula);

    let mut formula = Formula::new(Operator::Or);
    formula.add_event(EventId::Gate(lower), "pumps-fail")?;
    formula.add_event(EventId::House(Model::TRUE_EVENT), "true")?;
    formula.validate()?;
    model.gate_mut(top).set_formula(formula);

    model.add_fault_tree(FaultTree::new(component))?;
    assert!(cycle::detect_cycle(&GateGraph(&model)).is_none());

    model.collect_top_events();
    let tree = model.get_fault_tree("cooling").unwrap();
    assert_eq!(model.fault_tree(tree).top_events(), &[top]);
    Ok(())
}

#[test]
fn gate_cycle_is_detected() -> Result<(), Error> {
    let mut model = Model::new("plant");
    let g1 = model.add_gate(Gate::new(scoped("g1", "")))?;
    let g2 = model.add_gate(Gate::new(scoped("g2", "")))?;

    let mut formula = Formula::new(Operator::Null);
    formula.add_event(EventId::Gate(g2), "g2")?;
    model.gate_mut(g1).set_formula(formula);

    let mut formula = Formula::new(Operator::Null);
    formula.add_event(EventId::Gate(g1), "g1")?;
    model.gate_mut(g2).set_formula(formula);

    let chain = cycle::detect_cycle(&GateGraph(&model)).unwrap();
    let printed = cycle::print_cycle(&chain);
    assert!(printed.contains("g1") && printed.contains("g2"));
    Ok(())
}

#[test]
fn parameter_cycle_is_detected() -> Result<(), Error> {
    let mut model = Model::new("plant");
    let p = model.add_parameter(Parameter::new(scoped("p", "")))?;
    let q = model.add_parameter(Parameter::new(scoped("q", "")))?;

    let ref_q = model.add_expression(Expression::Parameter(q));
    let two = model.add_expression(Expression::Constant(Value::Float(2.0)));
    let body = model.add_expression(Expression::Mul(ref_q, two));
    model.parameter_mut(p).set_expression(body);

    let ref_p = model.add_expression(Expression::Parameter(p));
    model.parameter_mut(q).set_expression(ref_p);

    assert!(cycle::detect_cycle(&ParameterGraph(&model)).is_some());
    Ok(())
}

#[test]
fn mission_time_is_a_leaf() -> Result<(), Error> {
    let mut model = Model::new("plant");
    let p = model.add_parameter(Parameter::new(scoped("window", "")))?;
    let body = model.add_expression(Expression::MissionTime);
    model.parameter_mut(p).set_expression(body);
    assert!(cycle::detect_cycle(&ParameterGraph(&model)).is_none());
    Ok(())
}

#[test]
fn branch_cycle_through_fork() -> Result<(), Error> {
    let mut model = Model::new("plant");
    let mut tree = EventTree::new(Element::new("loca"));
    let fe = tree.add_functional_event(FunctionalEvent::new(Element::new("injection")))?;
    let left = tree.add_branch(NamedBranch::new(Element::new("left")))?;
    let right = tree.add_branch(NamedBranch::new(Element::new("right")))?;

    // left forks to right on either state; right loops back to left.
    let fork = tree.add_fork(Fork::new(
        fe,
        vec![
            Path {
                state: "success".to_owned(),
                branch: Branch::new(Vec::new(), Target::Branch(right)),
            },
            Path {
                state: "failure".to_owned(),
                branch: Branch::new(Vec::new(), Target::Branch(right)),
            },
        ],
    ));
    tree.define_branch(left, Branch::new(Vec::new(), Target::Fork(fork)));
    tree.define_branch(right, Branch::new(Vec::new(), Target::Branch(left)));

    let id = model.add_event_tree(tree)?;
    let chain = cycle::detect_cycle(&BranchGraph(model.event_tree(id))).unwrap();
    assert!(cycle::print_cycle(&chain).contains("left"));
    Ok(())
}

#[test]
fn ccf_application_builds_substitute_gates() -> Result<(), Error> {
    let mut model = Model::new("plant");
    let a = model.add_basic_event(BasicEvent::new(scoped("valve-a", "")))?;
    let b = model.add_basic_event(BasicEvent::new(scoped("valve-b", "")))?;

    let mut group = CcfGroup::new(scoped("valves", ""), CcfModelKind::BetaFactor);
    group.add_member(a, "valve-a")?;
    group.add_member(b, "valve-b")?;
    let distribution = model.add_expression(Expression::Constant(Value::Float(0.01)));
    group.set_distribution(distribution);
    let beta = model.add_expression(Expression::Constant(Value::Float(0.1)));
    group.add_factor(beta, None);
    group.validate()?;
    model.add_ccf_group(group)?;

    model.apply_ccf_models()?;
    let gate = model.basic_event(a).ccf_gate().unwrap();
    // [valve-a], [valve-a valve-b]
    assert_eq!(model.gate(gate).formula().unwrap().args().len(), 2);
    assert!(model.basic_event(b).ccf_gate().is_some());
    // Three combinations materialized beyond the two declared members.
    assert_eq!(model.basic_events().count(), 5);
    Ok(())
}
