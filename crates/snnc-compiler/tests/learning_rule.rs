//! The emitted piecewise rule selects the same branch as the model's own evaluator.

use std::sync::Arc;

use snnc_compiler::{compile_model, GeneratorConfig};
use snnc_model::{builtin, LearningBranch, ModelSpec, PiecewiseRule, SynapsePopulation};

fn rule() -> PiecewiseRule {
    PiecewiseRule {
        t_shift: 2.0,
        k1: 15.0,
        k2: 4.0,
        k3: -30.0,
        depress_max: 0.02,
        slope_pos: -0.01,
        slope_neg: 0.002,
        offset: 0.05,
        depress_min: 0.004,
        g_mid: 0.0015,
        g_slope: 33.33,
        g_max: 0.015,
    }
}

#[test]
fn boundaries_belong_to_the_lower_branch() {
    let r = rule();
    assert_eq!(r.branch(15.0), LearningBranch::SmallPositive);
    assert_eq!(r.branch(15.0001), LearningBranch::LargePositive);
    assert_eq!(r.branch(4.0), LearningBranch::LessNegative);
    assert_eq!(r.branch(-30.0), LearningBranch::MostNegative);
    assert_eq!(r.delta(20.0), -0.02);
    assert_eq!(r.delta(-40.0), -0.004);
}

#[test]
fn emitted_branches_use_strict_comparisons_in_order() {
    let mut m = ModelSpec::new("learn");
    let izh = Arc::new(builtin::izhikevich());
    m.add_neuron_population("KC", 10, izh.clone(), vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
        .unwrap();
    m.add_neuron_population("DN", 5, izh, vec![0.02, 0.2, -65.0, 8.0], vec![-65.0, -13.0])
        .unwrap();
    m.add_synapse_population(
        SynapsePopulation::new(
            "KCDN",
            "KC",
            "DN",
            Arc::new(builtin::learn1()),
            Arc::new(builtin::delta_curr()),
        )
        .with_wu_params(vec![-20.0])
        .with_learning(rule()),
    )
    .unwrap();
    let code = compile_model(m, &GeneratorConfig::default()).unwrap();
    let syn = code.file("synapseFnct.cc").unwrap();
    let body_start = syn.find("static inline scalar learnDeltaKCDN(scalar dt)").unwrap();
    let body = &syn[body_start..];
    let body = &body[..body.find("\n}\n").unwrap()];
    let order = [
        "if (dt > 15.0f)",
        "else if (dt > 4.0f)",
        "else if (dt > (-30.0f))",
        "return -0.004f;",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|needle| body.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
    assert!(!body.contains(">="));
}
