//! Cross-host spike exchange plan.
//!
//! A population whose spikes feed a synapse group on another host must ship
//! its spike buffers there every step. Each population with remote consumers
//! gets one message tag, assigned in arena order from zero. Under that tag the
//! sender pushes the whole spike count buffer and then the whole spike index
//! buffer (every ring slot when the population is delayed), followed by the
//! event buffers when some remote consumer is event driven. Every host walks
//! the same transfer list and only performs the sends and receives it takes
//! part in, so blocking transfers cannot deadlock.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{ModelSpec, NeuronGroupId};

/// Which spike list a buffer holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpikeKind {
    /// Edge-triggered true spikes
    True,
    /// Spike-like events
    Event,
}

impl SpikeKind {
    /// Both kinds, in transfer order
    pub const ALL: [SpikeKind; 2] = [SpikeKind::True, SpikeKind::Event];

    /// Name fragment used in logs and summaries
    pub fn label(self) -> &'static str {
        match self {
            SpikeKind::True => "spikes",
            SpikeKind::Event => "events",
        }
    }
}

/// One point-to-point spike transfer per step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Population whose spikes move
    pub population: NeuronGroupId,
    /// Message tag shared by every buffer of the population
    pub tag: u32,
    /// Host owning the population
    pub sender: u32,
    /// Host running the consuming synapse group
    pub receiver: u32,
    /// Event buffers follow the true-spike buffers
    pub events: bool,
}

impl Transfer {
    /// Spike lists carried, in send order
    pub fn kinds(&self) -> &'static [SpikeKind] {
        static SPIKES: [SpikeKind; 1] = [SpikeKind::True];
        static BOTH: [SpikeKind; 2] = SpikeKind::ALL;
        if self.events {
            &BOTH
        } else {
            &SPIKES
        }
    }
}

/// What a host does for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Push to the receiver
    Send,
    /// Pull from the sender
    Receive,
}

/// Ordered list of transfers executed identically by every host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangePlan {
    transfers: Vec<Transfer>,
}

impl ExchangePlan {
    /// Derive the plan from host placement.
    ///
    /// A receiver appears once per population however many of its synapse
    /// groups read that population. Event buffers travel with a population
    /// as soon as any of its remote consumers is event driven.
    pub fn build(model: &ModelSpec) -> Self {
        let mut transfers = Vec::new();
        let mut next_tag = 0u32;
        for (id, ng) in model.neuron_groups() {
            let remote: Vec<_> = ng
                .out_syn()
                .iter()
                .map(|sid| model.synapse_group(*sid))
                .filter(|sg| sg.host_id() != ng.host_id())
                .collect();
            if remote.is_empty() {
                continue;
            }
            let events = remote.iter().any(|sg| sg.is_event_driven());
            let receivers: BTreeSet<u32> = remote.iter().map(|sg| sg.host_id()).collect();
            let tag = next_tag;
            next_tag += 1;
            for receiver in receivers {
                transfers.push(Transfer {
                    population: id,
                    tag,
                    sender: ng.host_id(),
                    receiver,
                    events,
                });
            }
        }
        log::debug!(
            "exchange plan for '{}': {} transfers, {} tags",
            model.name(),
            transfers.len(),
            next_tag
        );
        Self { transfers }
    }

    /// All transfers in execution order
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// True when no spikes cross host boundaries
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    /// Tag of a population, if it is exchanged
    pub fn tag_of(&self, population: NeuronGroupId) -> Option<u32> {
        self.transfers
            .iter()
            .find(|t| t.population == population)
            .map(|t| t.tag)
    }

    /// Exchanged populations with the spike lists they carry
    pub fn exchanged(&self) -> BTreeMap<NeuronGroupId, &'static [SpikeKind]> {
        self.transfers
            .iter()
            .map(|t| (t.population, t.kinds()))
            .collect()
    }

    /// The transfers `host` takes part in, with its role, in execution order
    pub fn for_host(&self, host: u32) -> impl Iterator<Item = (&Transfer, Role)> + '_ {
        self.transfers.iter().filter_map(move |t| {
            if t.sender == host {
                Some((t, Role::Send))
            } else if t.receiver == host {
                Some((t, Role::Receive))
            } else {
                None
            }
        })
    }
}
