//! Model graph construction across several populations and projections.

use std::sync::Arc;

use snnc_model::{
    builtin, Connectivity, InputCurrent, ModelError, ModelSpec, Precision, SynapsePopulation,
    WeightStorage,
};

fn mushroom_body() -> ModelSpec {
    let mut m = ModelSpec::new("MBody");
    m.set_dt(0.1).expect("dt");
    m.set_precision(Precision::Double).expect("precision");

    let poisson = Arc::new(builtin::poisson());
    let izh = Arc::new(builtin::izhikevich());
    m.add_neuron_population("PN", 100, poisson, vec![0.1, 2.5, 20.0, -60.0], vec![-60.0, 0.0, -10.0])
        .expect("PN");
    m.add_neuron_population("KC", 1000, izh.clone(), vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
        .expect("KC");
    m.add_neuron_population("LHI", 20, izh, vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
        .expect("LHI");

    m.add_synapse_population(
        SynapsePopulation::new(
            "PNKC",
            "PN",
            "KC",
            Arc::new(builtin::static_pulse()),
            Arc::new(builtin::exp_cond()),
        )
        .with_connectivity(Connectivity::Sparse)
        .with_ps_params(vec![1.0, 0.0]),
    )
    .expect("PNKC");
    m.add_synapse_population(
        SynapsePopulation::new(
            "PNLHI",
            "PN",
            "LHI",
            Arc::new(builtin::graded()),
            Arc::new(builtin::exp_cond()),
        )
        .with_weights(WeightStorage::Global(0.05))
        .with_wu_params(vec![-20.0, 2.0])
        .with_ps_params(vec![1.0, 0.0])
        .with_delay(3),
    )
    .expect("PNLHI");
    m
}

#[test]
fn graph_keeps_declaration_order() {
    let m = mushroom_body();
    let names: Vec<_> = m.neuron_groups().map(|(_, g)| g.name().to_string()).collect();
    assert_eq!(names, ["PN", "KC", "LHI"]);
    assert_eq!(m.num_synapse_groups(), 2);
    assert_eq!(m.total_neurons(), 1120);
    assert_eq!(m.precision().c_type(), "double");

    let pn = m.find_neuron_group("PN").expect("PN handle");
    assert_eq!(m.neuron_group(pn).out_syn().len(), 2);
    assert!(!m.any_learning());
    assert!(!m.is_distributed());
}

#[test]
fn planning_mutations_then_freeze() {
    let mut m = mushroom_body();
    let pn = m.find_neuron_group("PN").expect("PN handle");
    {
        let g = m.neuron_group_mut(pn).expect("open");
        g.check_num_delay_slots(3);
        g.set_input(InputCurrent::Constant(2.0));
        g.set_spike_zero_copy(true);
    }
    m.mark_finalized();
    let g = m.neuron_group(pn);
    assert_eq!(g.num_delay_slots(), 4);
    assert!(g.uses_zero_copy());
    assert_eq!(g.input(), InputCurrent::Constant(2.0));
    assert!(matches!(m.neuron_group_mut(pn), Err(ModelError::Finalized(_))));
}

#[test]
fn bitmask_requires_global_weight() {
    let mut m = mushroom_body();
    let err = m
        .add_synapse_population(
            SynapsePopulation::new(
                "KCLHI",
                "KC",
                "LHI",
                Arc::new(builtin::static_pulse()),
                Arc::new(builtin::delta_curr()),
            )
            .with_connectivity(Connectivity::Bitmask),
        )
        .unwrap_err();
    assert!(err.to_string().contains("bitmask"));
}
