//! Blocking spike exchange between hosts.
//!
//! Every host walks the same [`ExchangePlan`] and performs only the transfers
//! it takes part in. A transfer is a sequence of messages under the
//! population's tag: the spike count buffer, then the spike index buffer, then
//! the same pair for events when those travel too. Sends block until the peer
//! receives, so the shared transfer order is what keeps the hosts in step.

use crossbeam::channel::{bounded, Receiver, Sender};
use snnc_model::{ExchangePlan, Role};

use crate::error::{Result, RuntimeError};
use crate::state::SimulationContext;

/// Point-to-point blocking message passing between hosts
pub trait SpikeTransport {
    /// Host this endpoint belongs to
    fn host_id(&self) -> u32;

    /// Deliver `payload` to host `to` under `tag`; returns once it is received
    fn send(&self, to: u32, tag: u32, payload: &[u32]) -> Result<()>;

    /// Wait for the next message from host `from`, which must carry `tag`
    fn recv(&self, from: u32, tag: u32) -> Result<Vec<u32>>;
}

#[derive(Debug)]
struct Message {
    tag: u32,
    payload: Vec<u32>,
}

/// One host's end of an in-process channel mesh
#[derive(Debug)]
pub struct ChannelEndpoint {
    host_id: u32,
    to: Vec<Option<Sender<Message>>>,
    from: Vec<Option<Receiver<Message>>>,
}

impl SpikeTransport for ChannelEndpoint {
    fn host_id(&self) -> u32 {
        self.host_id
    }

    fn send(&self, to: u32, tag: u32, payload: &[u32]) -> Result<()> {
        let tx = self
            .to
            .get(to as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RuntimeError::transfer(tag, self.host_id, to, "no channel to host"))?;
        tx.send(Message {
            tag,
            payload: payload.to_vec(),
        })
        .map_err(|_| RuntimeError::transfer(tag, self.host_id, to, "peer disconnected"))
    }

    fn recv(&self, from: u32, tag: u32) -> Result<Vec<u32>> {
        let rx = self
            .from
            .get(from as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RuntimeError::transfer(tag, from, self.host_id, "no channel from host"))?;
        let msg = rx
            .recv()
            .map_err(|_| RuntimeError::transfer(tag, from, self.host_id, "peer disconnected"))?;
        if msg.tag != tag {
            return Err(RuntimeError::transfer(
                tag,
                from,
                self.host_id,
                format!("unexpected message tag {}", msg.tag),
            ));
        }
        Ok(msg.payload)
    }
}

/// Fully connected mesh of rendezvous channels, one endpoint per host
pub fn channel_mesh(hosts: u32) -> Result<Vec<ChannelEndpoint>> {
    if hosts == 0 {
        return Err(RuntimeError::invalid_parameter("hosts", "0", "> 0"));
    }
    let n = hosts as usize;
    let mut endpoints: Vec<ChannelEndpoint> = (0..hosts)
        .map(|host_id| ChannelEndpoint {
            host_id,
            to: (0..n).map(|_| None).collect(),
            from: (0..n).map(|_| None).collect(),
        })
        .collect();
    for a in 0..n {
        for b in 0..n {
            if a == b {
                continue;
            }
            let (tx, rx) = bounded(0);
            endpoints[a].to[b] = Some(tx);
            endpoints[b].from[a] = Some(rx);
        }
    }
    log::debug!("channel mesh for {hosts} hosts");
    Ok(endpoints)
}

/// Run this host's share of `plan` for the current step.
///
/// Senders ship the whole spike ring of the population, count buffer first,
/// for every spike list the transfer carries. Receivers overwrite their copy
/// with it. Any failure aborts the exchange.
pub fn execute_exchange<T>(
    plan: &ExchangePlan,
    ctx: &mut SimulationContext,
    transport: &T,
) -> Result<()>
where
    T: SpikeTransport + ?Sized,
{
    let host = transport.host_id();
    if host != ctx.host_id() {
        return Err(RuntimeError::invalid_config(format!(
            "transport of host {host} used with the context of host {}",
            ctx.host_id()
        )));
    }
    for (transfer, role) in plan.for_host(host) {
        for &kind in transfer.kinds() {
            match role {
                Role::Send => {
                    let (counts, entries) =
                        ctx.population(transfer.population)?.spike_buffers(kind)?;
                    log::trace!(
                        "host {host}: push {} {} of {} to host {} (tag {})",
                        counts.len(),
                        kind.label(),
                        transfer.population,
                        transfer.receiver,
                        transfer.tag
                    );
                    transport.send(transfer.receiver, transfer.tag, counts)?;
                    transport.send(transfer.receiver, transfer.tag, entries)?;
                }
                Role::Receive => {
                    let counts = transport.recv(transfer.sender, transfer.tag)?;
                    let entries = transport.recv(transfer.sender, transfer.tag)?;
                    log::trace!(
                        "host {host}: pulled {} {} of {} from host {} (tag {})",
                        counts.len(),
                        kind.label(),
                        transfer.population,
                        transfer.sender,
                        transfer.tag
                    );
                    ctx.population_mut(transfer.population)?
                        .restore_spike_buffers(kind, &counts, &entries)
                        .map_err(|e| {
                            RuntimeError::transfer(transfer.tag, transfer.sender, host, e.to_string())
                        })?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_connects_every_pair() {
        let mesh = channel_mesh(3).unwrap();
        assert_eq!(mesh.len(), 3);
        for (i, ep) in mesh.iter().enumerate() {
            assert_eq!(ep.host_id() as usize, i);
            assert!(ep.to[i].is_none());
            assert_eq!(ep.to.iter().flatten().count(), 2);
            assert_eq!(ep.from.iter().flatten().count(), 2);
        }
        assert!(channel_mesh(0).is_err());
    }

    #[test]
    fn tag_mismatch_is_a_transfer_error() {
        let mut mesh = channel_mesh(2).unwrap();
        let b = mesh.pop().unwrap();
        let a = mesh.pop().unwrap();
        std::thread::scope(|s| {
            s.spawn(|| a.send(1, 7, &[1, 2]).unwrap());
            let err = b.recv(0, 3).unwrap_err();
            assert!(matches!(err, RuntimeError::Transfer { tag: 3, from: 0, to: 1, .. }));
        });
    }

    #[test]
    fn dropped_peer_fails_the_send() {
        let mut mesh = channel_mesh(2).unwrap();
        drop(mesh.pop());
        let a = mesh.pop().unwrap();
        let err = a.send(1, 0, &[0]).unwrap_err();
        assert!(err.to_string().contains("peer disconnected"));
        assert!(a.send(5, 0, &[0]).is_err());
    }
}
