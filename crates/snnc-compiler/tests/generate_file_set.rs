//! End-to-end generation of a mushroom-body style model.

use std::sync::Arc;

use snnc_compiler::{
    compile_model, write_output, BackendKind, CompilerError, GeneratorConfig,
};
use snnc_model::{
    builtin, Connectivity, ModelSpec, NeuronModel, PiecewiseRule, SynapsePopulation,
};

fn izh_params() -> Vec<f64> {
    vec![0.02, 0.2, -65.0, 8.0]
}

fn mbody() -> ModelSpec {
    let mut m = ModelSpec::new("MBody");
    m.set_dt(0.1).unwrap();
    let izh = Arc::new(builtin::izhikevich());
    m.add_neuron_population(
        "PN",
        100,
        Arc::new(builtin::poisson()),
        vec![0.1, 2.5, 20.0, -60.0],
        vec![-60.0, 0.0, -10.0],
    )
    .unwrap();
    m.add_neuron_population("KC", 1000, izh.clone(), izh_params(), vec![-65.0, -13.0])
        .unwrap();
    m.add_neuron_population("LHI", 20, izh.clone(), izh_params(), vec![-65.0, -13.0])
        .unwrap();
    m.add_neuron_population("DN", 100, izh, izh_params(), vec![-65.0, -13.0])
        .unwrap();

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
    .unwrap();
    m.add_synapse_population(
        SynapsePopulation::new(
            "PNLHI",
            "PN",
            "LHI",
            Arc::new(builtin::static_pulse()),
            Arc::new(builtin::exp_cond()),
        )
        .with_ps_params(vec![1.0, 0.0]),
    )
    .unwrap();
    m.add_synapse_population(
        SynapsePopulation::new(
            "LHIKC",
            "LHI",
            "KC",
            Arc::new(builtin::graded()),
            Arc::new(builtin::exp_cond()),
        )
        .with_wu_params(vec![-40.0, 50.0])
        .with_ps_params(vec![1.5, -92.0])
        .with_delay(3),
    )
    .unwrap();
    m.add_synapse_population(
        SynapsePopulation::new(
            "KCDN",
            "KC",
            "DN",
            Arc::new(builtin::learn1()),
            Arc::new(builtin::exp_cond()),
        )
        .with_connectivity(Connectivity::Sparse)
        .with_wu_params(vec![-20.0])
        .with_ps_params(vec![5.0, 0.0])
        .with_learning(PiecewiseRule {
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
        }),
    )
    .unwrap();
    m
}

#[test]
fn cpu_file_set_is_complete() {
    let code = compile_model(mbody(), &GeneratorConfig::default()).unwrap();
    let names: Vec<&str> = code.file_names().collect();
    assert_eq!(
        names,
        ["definitions.h", "neuronFnct.cc", "runner.cc", "synapseFnct.cc"]
    );
    assert!(code.warnings.is_empty(), "{:?}", code.warnings);
    for (name, text) in &code.files {
        assert!(!text.contains("$("), "placeholder left in {name}");
    }
}

#[test]
fn generation_is_deterministic() {
    let config = GeneratorConfig::default();
    let a = compile_model(mbody(), &config).unwrap();
    let b = compile_model(mbody(), &config).unwrap();
    assert_eq!(a, b);
}

#[test]
fn learning_model_emits_both_passes() {
    let code = compile_model(mbody(), &GeneratorConfig::default()).unwrap();
    let syn = code.file("synapseFnct.cc").unwrap();
    assert!(syn.contains("static inline scalar learnDeltaKCDN(scalar dt)"));
    assert!(syn.contains("void learnSynapsesPost(SimContext *ctx, scalar t)"));
    let runner = code.file("runner.cc").unwrap();
    assert!(runner.contains("void initializeSparse(SimContext *ctx)"));
    assert!(runner.contains("int loadKCDN(SimContext *ctx, const char *path)"));
    let defs = code.file("definitions.h").unwrap();
    assert!(defs.contains("void learnSynapsesPost(SimContext *ctx, scalar t);"));
}

#[test]
fn delayed_graded_source_gets_a_ring() {
    let code = compile_model(mbody(), &GeneratorConfig::default()).unwrap();
    let neuron = code.file("neuronFnct.cc").unwrap();
    assert!(neuron.contains("ctx->LHI.spkQuePtr = (ctx->LHI.spkQuePtr + 1) % 4;"));
    assert!(neuron.contains("ctx->LHI.glbSpkCntEvnt[ctx->LHI.spkQuePtr] = 0;"));
    let syn = code.file("synapseFnct.cc").unwrap();
    assert!(syn.contains("unsigned int preReadDelaySlot = (ctx->LHI.spkQuePtr + 1) % 4;"));
}

#[test]
fn parallel_backend_uses_atomic_append() {
    let code = compile_model(mbody(), &GeneratorConfig::for_backend(BackendKind::CpuParallel)).unwrap();
    let neuron = code.file("neuronFnct.cc").unwrap();
    assert!(neuron.contains("#pragma omp parallel for"));
    assert!(neuron.contains("#pragma omp atomic capture"));
    assert!(code.file("runner.cc").unwrap().contains("#include <omp.h>"));
}

#[test]
fn missing_threshold_is_a_warning() {
    let mut m = ModelSpec::new("quiet");
    m.add_neuron_population("SRC", 8, Arc::new(builtin::spike_source()), vec![], vec![])
        .unwrap();
    let code = compile_model(m, &GeneratorConfig::default()).unwrap();
    assert_eq!(code.warnings.len(), 1);
    assert!(code.warnings[0].contains("SRC"));
    assert!(!code.file("neuronFnct.cc").unwrap().contains("oldSpike"));
}

#[test]
fn unresolved_placeholder_fails_generation() {
    let mut m = ModelSpec::new("broken");
    let model = NeuronModel::new("Broken")
        .with_vars(&[("V", "scalar")])
        .with_sim_code("$(V) += $(leak);")
        .with_threshold("$(V) > 1.0");
    m.add_neuron_population("N", 4, Arc::new(model), vec![], vec![0.0])
        .unwrap();
    let err = compile_model(m, &GeneratorConfig::default()).unwrap_err();
    match err {
        CompilerError::UnresolvedPlaceholder { name, context } => {
            assert_eq!(name, "leak");
            assert!(context.contains("sim code of 'N'"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn output_lands_in_directory() {
    let dir = tempfile::tempdir().unwrap();
    let code = compile_model(mbody(), &GeneratorConfig::default()).unwrap();
    let written = write_output(&code, &dir.path().join("MBody_CODE")).unwrap();
    assert_eq!(written.len(), 4);
    let defs = std::fs::read_to_string(dir.path().join("MBody_CODE/definitions.h")).unwrap();
    assert_eq!(defs, code.file("definitions.h").unwrap());
}
