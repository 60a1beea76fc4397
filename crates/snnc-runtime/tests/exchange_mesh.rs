//! Multi-host stepping with one thread per host.

use std::sync::Arc;

use snnc_model::{
    builtin, ExchangePlan, ModelSpec, NeuronGroupId, SpikeKind, SynapsePopulation, WeightUpdateModel,
};
use snnc_runtime::{
    channel_mesh, execute_exchange, PopulationDetector, RuntimeError, SimulationContext,
    SpikeTransport,
};

fn izh(m: &mut ModelSpec, name: &str, n: u32, host: u32) -> NeuronGroupId {
    let id = m
        .add_neuron_population(
            name,
            n,
            Arc::new(builtin::izhikevich()),
            vec![0.02, 0.2, -65.0, 8.0],
            vec![-65.0, -13.0],
        )
        .unwrap();
    m.neuron_group_mut(id).unwrap().set_cluster_index(host, 0);
    id
}

fn pulse(name: &str, src: &str, trg: &str, host: u32) -> SynapsePopulation {
    SynapsePopulation::new(
        name,
        src,
        trg,
        Arc::new(builtin::static_pulse()),
        Arc::new(builtin::delta_curr()),
    )
    .with_host(host)
}

/// PN on host 0 feeds KC on host 1; KC feeds back into LHI on host 0
fn two_host_loop() -> ModelSpec {
    let mut m = ModelSpec::new("loop");
    izh(&mut m, "PN", 8, 0);
    izh(&mut m, "KC", 16, 1);
    izh(&mut m, "LHI", 4, 0);
    m.add_synapse_population(pulse("PNKC", "PN", "KC", 1)).unwrap();
    m.add_synapse_population(pulse("KCLHI", "KC", "LHI", 0)).unwrap();
    m.mark_finalized();
    m
}

fn pattern(step: u32, n: u32) -> Vec<bool> {
    (0..n).map(|i| (i + step) % 3 == 0).collect()
}

#[test]
fn spikes_cross_hosts_both_ways() {
    let model = two_host_loop();
    let plan = ExchangePlan::build(&model);
    assert_eq!(plan.transfers().len(), 2);
    let pn = model.find_neuron_group("PN").unwrap();
    let kc = model.find_neuron_group("KC").unwrap();

    let mesh = channel_mesh(2).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = mesh
            .into_iter()
            .map(|ep| {
                let model = &model;
                let plan = &plan;
                s.spawn(move || {
                    let host = ep.host_id();
                    let mut ctx = SimulationContext::from_model(model, host).unwrap();
                    let local = if host == 0 { pn } else { kc };
                    let remote = if host == 0 { kc } else { pn };
                    let n = ctx.population(local).unwrap().num_neurons();
                    let mut detector = PopulationDetector::new(n);
                    let mut seen = Vec::new();
                    for step in 0..5 {
                        ctx.begin_step();
                        let t = ctx.t();
                        let predicates = pattern(step, n);
                        detector
                            .detect_into(&predicates, ctx.population_mut(local).unwrap(), t)
                            .unwrap();
                        execute_exchange(plan, &mut ctx, &ep).unwrap();
                        seen.push(
                            ctx.population(remote)
                                .unwrap()
                                .current_spikes(SpikeKind::True)
                                .unwrap()
                                .to_vec(),
                        );
                        ctx.finish_step();
                    }
                    seen
                })
            })
            .collect();
        let results: Vec<Vec<Vec<u32>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // replay the sender's detector to know what each side must have seen
        let expected = |n: u32| {
            let mut d = PopulationDetector::new(n);
            (0..5).map(|step| d.detect(&pattern(step, n)).unwrap()).collect::<Vec<_>>()
        };
        assert_eq!(results[0], expected(16));
        assert_eq!(results[1], expected(8));
    });
}

#[test]
fn three_hosts_share_one_order() {
    let mut m = ModelSpec::new("fan");
    izh(&mut m, "A", 4, 0);
    izh(&mut m, "B", 4, 1);
    izh(&mut m, "C", 4, 2);
    m.add_synapse_population(pulse("AB", "A", "B", 1)).unwrap();
    m.add_synapse_population(pulse("AC", "A", "C", 2)).unwrap();
    m.add_synapse_population(pulse("CB", "C", "B", 1)).unwrap();
    m.mark_finalized();
    let plan = ExchangePlan::build(&m);
    let a = m.find_neuron_group("A").unwrap();
    let c = m.find_neuron_group("C").unwrap();

    let mesh = channel_mesh(3).unwrap();
    let contexts: Vec<SimulationContext> = std::thread::scope(|s| {
        let handles: Vec<_> = mesh
            .into_iter()
            .map(|ep| {
                let m = &m;
                let plan = &plan;
                s.spawn(move || {
                    let mut ctx = SimulationContext::from_model(m, ep.host_id()).unwrap();
                    ctx.begin_step();
                    match ep.host_id() {
                        0 => ctx.population_mut(a).unwrap().record(SpikeKind::True, 3, 0.0).unwrap(),
                        2 => ctx.population_mut(c).unwrap().record(SpikeKind::True, 1, 0.0).unwrap(),
                        _ => {}
                    }
                    execute_exchange(plan, &mut ctx, &ep).unwrap();
                    ctx
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let spikes = |ctx: &SimulationContext, id| {
        ctx.population(id).unwrap().current_spikes(SpikeKind::True).unwrap().to_vec()
    };
    assert_eq!(spikes(&contexts[1], a), vec![3]);
    assert_eq!(spikes(&contexts[2], a), vec![3]);
    assert_eq!(spikes(&contexts[1], c), vec![1]);
    // host 0 consumes nothing remote
    assert!(spikes(&contexts[0], c).is_empty());
}

#[test]
fn vanished_receiver_is_fatal() {
    let model = two_host_loop();
    let plan = ExchangePlan::build(&model);
    let mut mesh = channel_mesh(2).unwrap();
    drop(mesh.pop());
    let ep = mesh.pop().unwrap();
    let mut ctx = SimulationContext::from_model(&model, 0).unwrap();
    ctx.begin_step();
    let err = execute_exchange(&plan, &mut ctx, &ep).unwrap_err();
    assert!(matches!(err, RuntimeError::Transfer { from: 0, to: 1, .. }));
}

#[test]
fn transport_and_context_hosts_must_agree() {
    let model = two_host_loop();
    let plan = ExchangePlan::build(&model);
    let mesh = channel_mesh(2).unwrap();
    let mut ctx = SimulationContext::from_model(&model, 1).unwrap();
    let err = execute_exchange(&plan, &mut ctx, &mesh[0]).unwrap_err();
    assert!(matches!(err, RuntimeError::InvalidConfiguration { .. }));
}

/// Run one step on each host: `fire` registers local spikes, then the exchange
fn step_all<F>(plan: &ExchangePlan, contexts: Vec<SimulationContext>, fire: F) -> Vec<SimulationContext>
where
    F: Fn(&mut SimulationContext) + Sync,
{
    let mesh = channel_mesh(contexts.len() as u32).unwrap();
    std::thread::scope(|s| {
        let handles: Vec<_> = mesh
            .into_iter()
            .zip(contexts)
            .map(|(ep, mut ctx)| {
                let fire = &fire;
                s.spawn(move || {
                    ctx.begin_step();
                    fire(&mut ctx);
                    execute_exchange(plan, &mut ctx, &ep).unwrap();
                    ctx.finish_step();
                    ctx
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

#[test]
fn delayed_population_ships_its_whole_ring() {
    let mut m = ModelSpec::new("delayed");
    let pn = izh(&mut m, "PN", 10, 0);
    izh(&mut m, "KC", 20, 1);
    m.add_synapse_population(pulse("PNKC", "PN", "KC", 1).with_delay(3)).unwrap();
    m.neuron_group_mut(pn).unwrap().check_num_delay_slots(3);
    m.mark_finalized();
    let plan = ExchangePlan::build(&m);

    let mut contexts: Vec<_> = (0..2).map(|h| SimulationContext::from_model(&m, h).unwrap()).collect();
    for step in 0..4u32 {
        contexts = step_all(&plan, contexts, |ctx| {
            if ctx.host_id() == 0 {
                let t = ctx.t();
                ctx.population_mut(pn).unwrap().record(SpikeKind::True, step, t).unwrap();
            }
        });
    }

    let sent = contexts[0].population(pn).unwrap();
    let got = contexts[1].population(pn).unwrap();
    let (counts, entries) = got.spike_buffers(SpikeKind::True).unwrap();
    assert_eq!((counts.len(), entries.len()), (4, 40));
    assert_eq!(sent.spike_buffers(SpikeKind::True).unwrap(), (counts, entries));
    for delay in 0..4 {
        assert_eq!(got.delayed_spikes(SpikeKind::True, delay).unwrap(), &[3 - delay]);
    }
}

#[test]
fn mixed_consumers_receive_spikes_and_events_under_one_tag() {
    let mut m = ModelSpec::new("mixed");
    let pn = izh(&mut m, "PN", 6, 0);
    izh(&mut m, "KC", 6, 1);
    let gate = WeightUpdateModel::new("Gate")
        .with_input("$(g)")
        .with_event_threshold("$(t) > 1.0");
    m.add_synapse_population(pulse("PNKC", "PN", "KC", 1)).unwrap();
    m.add_synapse_population(
        SynapsePopulation::new("PNKCgate", "PN", "KC", Arc::new(gate), Arc::new(builtin::delta_curr()))
            .with_host(1),
    )
    .unwrap();
    m.neuron_group_mut(pn).unwrap().set_spike_event_required();
    m.mark_finalized();
    let plan = ExchangePlan::build(&m);
    assert_eq!(plan.transfers().len(), 1);
    assert_eq!(plan.tag_of(pn), Some(0));

    let contexts: Vec<_> = (0..2).map(|h| SimulationContext::from_model(&m, h).unwrap()).collect();
    let contexts = step_all(&plan, contexts, |ctx| {
        if ctx.host_id() == 0 {
            let pop = ctx.population_mut(pn).unwrap();
            pop.record(SpikeKind::True, 4, 0.0).unwrap();
            pop.record(SpikeKind::Event, 1, 0.0).unwrap();
            pop.record(SpikeKind::Event, 4, 0.0).unwrap();
        }
    });
    let got = contexts[1].population(pn).unwrap();
    assert_eq!(got.current_spikes(SpikeKind::True).unwrap(), &[4]);
    assert_eq!(got.current_spikes(SpikeKind::Event).unwrap(), &[1, 4]);
}
