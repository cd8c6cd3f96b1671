//! Message passing between tiles.
//!
//! A tile talks to the outside world through a [`BorderExchange`]: it sends
//! strips of cells to the neighbour across one of its four sides, receives
//! the strips its neighbours sent, and combines its statistics with every
//! other tile once per tick.
//!
//! Two implementations exist. [`LocalExchange`] serves a single-tile torus
//! where every neighbour is the tile itself; a strip sent across a side is
//! simply held until it is received from the opposite side.
//! [`ChannelExchange`] connects the tiles of a [`TileLayout`] running on
//! separate threads through `tokio` channels. Statistics are gathered on
//! the rank 0 tile and the total is published back over a broadcast
//! channel.
//!
//! Messages are tagged with the tick they belong to and an
//! [`ExchangeTag`], so a fast neighbour can run ahead without its strips
//! being mistaken for the current ones.

use std::collections::HashMap;

use apocalypse_types::{Entity, Stats, Tick};
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::error::ExchangeError;
use crate::topology::{Side, TileLayout, TilePosition};

/// A line of cells, in ascending coordinate order. `None` is an empty cell.
pub type Strip = Vec<Option<Entity>>;

/// Capacity of the broadcast channel carrying reduced statistics.
const REDUCE_CAPACITY: usize = 16;

/// What a strip carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeTag {
    /// The outermost interior line of the input generation.
    BorderEdge,
    /// The second interior line of the input generation.
    BorderInner,
    /// Entities of the output generation that moved into the halo.
    Ghost,
}

/// The communication endpoint of one tile.
///
/// A strip sent with `send(side, ..)` arrives at the neighbour across
/// `side`, which receives it with `receive(side.opposite(), ..)`.
pub trait BorderExchange: Send {
    /// Send `strip` to the neighbour across `side`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Disconnected`] if the neighbour is gone.
    fn send(
        &mut self,
        side: Side,
        tag: ExchangeTag,
        clock: Tick,
        strip: Strip,
    ) -> Result<(), ExchangeError>;

    /// Block until the strip tagged `tag` for `clock` arrives from the
    /// neighbour across `side`.
    ///
    /// # Errors
    ///
    /// Returns an error if the strip can never arrive.
    fn receive(&mut self, side: Side, tag: ExchangeTag, clock: Tick)
    -> Result<Strip, ExchangeError>;

    /// Sum `local` over every tile and return the total.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Reduction`] or
    /// [`ExchangeError::PeerAborted`] if some tile cannot contribute.
    fn all_reduce(&mut self, clock: Tick, local: &Stats) -> Result<Stats, ExchangeError>;

    /// Tell every peer that this tile has failed, so that none of them
    /// waits forever for its messages.
    fn abort(&mut self) {}
}

// ---------------------------------------------------------------------------
// LocalExchange
// ---------------------------------------------------------------------------

/// Exchange for a single tile that neighbours itself on every side.
#[derive(Debug, Default)]
pub struct LocalExchange {
    pending: HashMap<(Side, ExchangeTag), Strip>,
}

impl LocalExchange {
    /// Create an empty exchange.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BorderExchange for LocalExchange {
    fn send(
        &mut self,
        side: Side,
        tag: ExchangeTag,
        _clock: Tick,
        strip: Strip,
    ) -> Result<(), ExchangeError> {
        // What leaves across `side` comes back in across the opposite one.
        self.pending.insert((side.opposite(), tag), strip);
        Ok(())
    }

    fn receive(
        &mut self,
        side: Side,
        tag: ExchangeTag,
        _clock: Tick,
    ) -> Result<Strip, ExchangeError> {
        self.pending
            .remove(&(side, tag))
            .ok_or(ExchangeError::MissingStrip { side })
    }

    fn all_reduce(&mut self, _clock: Tick, local: &Stats) -> Result<Stats, ExchangeError> {
        Ok(*local)
    }
}

// ---------------------------------------------------------------------------
// ChannelExchange
// ---------------------------------------------------------------------------

/// A strip on its way to a neighbour.
#[derive(Debug)]
enum Envelope {
    Strip {
        from: Side,
        tag: ExchangeTag,
        clock: Tick,
        strip: Strip,
    },
    Abort,
}

/// A tile's contribution to the reduction.
#[derive(Debug)]
enum Partial {
    Stats { clock: Tick, stats: Stats },
    Abort,
}

/// The reduced statistics of one tick, as published by rank 0.
#[derive(Debug, Clone)]
enum Total {
    Stats { clock: Tick, stats: Stats },
    Abort,
}

/// The gathering end of the reduction, held by rank 0 only.
#[derive(Debug)]
struct ReduceRoot {
    partials: mpsc::UnboundedReceiver<Partial>,
    publish: broadcast::Sender<Total>,
    tiles: usize,
}

/// Exchange endpoint of one tile in a multi-threaded run.
#[derive(Debug)]
pub struct ChannelExchange {
    position: TilePosition,
    outboxes: HashMap<Side, mpsc::UnboundedSender<Envelope>>,
    inbox: mpsc::UnboundedReceiver<Envelope>,
    stash: HashMap<(Side, ExchangeTag, Tick), Strip>,
    partials: mpsc::UnboundedSender<Partial>,
    totals: broadcast::Receiver<Total>,
    root: Option<ReduceRoot>,
    aborted: bool,
}

impl ChannelExchange {
    /// Build one connected endpoint per tile of `layout`, in rank order.
    pub fn mesh(layout: &TileLayout) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) = layout
            .positions()
            .map(|_| mpsc::unbounded_channel::<Envelope>())
            .unzip();
        let (partials, partials_rx) = mpsc::unbounded_channel();
        let (publish, _) = broadcast::channel(REDUCE_CAPACITY);
        let mut root = Some(ReduceRoot {
            partials: partials_rx,
            publish: publish.clone(),
            tiles: layout.tile_count(),
        });

        layout
            .positions()
            .zip(receivers)
            .map(|(position, inbox)| {
                let outboxes = Side::ALL
                    .into_iter()
                    .filter_map(|side| {
                        let neighbour = layout.neighbour(position, side)?;
                        let sender = senders.get(layout.rank(neighbour))?;
                        Some((side, sender.clone()))
                    })
                    .collect();
                Self {
                    position,
                    outboxes,
                    inbox,
                    stash: HashMap::new(),
                    partials: partials.clone(),
                    totals: publish.subscribe(),
                    root: root.take(),
                    aborted: false,
                }
            })
            .collect()
    }

    /// The tile this endpoint belongs to.
    pub const fn position(&self) -> TilePosition {
        self.position
    }

    fn peer_aborted(&mut self) -> ExchangeError {
        self.abort();
        ExchangeError::PeerAborted {
            tile: self.position,
        }
    }

    fn reduction_error(message: &str) -> ExchangeError {
        ExchangeError::Reduction {
            message: message.to_owned(),
        }
    }

    /// Collect one partial from every tile and publish the sum.
    fn gather(&mut self, clock: Tick) -> Result<(), ExchangeError> {
        let Some(root) = self.root.as_mut() else {
            return Ok(());
        };
        let mut total = Stats::default();
        for _ in 0..root.tiles {
            match root.partials.blocking_recv() {
                Some(Partial::Stats { clock: tick, stats }) if tick == clock => total.merge(&stats),
                Some(Partial::Stats { clock: tick, .. }) => {
                    return Err(Self::reduction_error(&format!(
                        "partial for tick {tick} arrived while reducing tick {clock}"
                    )));
                }
                Some(Partial::Abort) => {
                    // Everyone waiting on the total must hear about it.
                    let _ = root.publish.send(Total::Abort);
                    return Err(self.peer_aborted());
                }
                None => return Err(Self::reduction_error("every tile hung up")),
            }
        }
        root.publish
            .send(Total::Stats {
                clock,
                stats: total,
            })
            .map_err(|_| Self::reduction_error("no tile is listening for the total"))?;
        Ok(())
    }
}

impl BorderExchange for ChannelExchange {
    fn send(
        &mut self,
        side: Side,
        tag: ExchangeTag,
        clock: Tick,
        strip: Strip,
    ) -> Result<(), ExchangeError> {
        let disconnected = ExchangeError::Disconnected {
            tile: self.position,
            side,
        };
        let Some(outbox) = self.outboxes.get(&side) else {
            return Err(disconnected);
        };
        outbox
            .send(Envelope::Strip {
                from: side.opposite(),
                tag,
                clock,
                strip,
            })
            .map_err(|_| disconnected)
    }

    fn receive(
        &mut self,
        side: Side,
        tag: ExchangeTag,
        clock: Tick,
    ) -> Result<Strip, ExchangeError> {
        if let Some(strip) = self.stash.remove(&(side, tag, clock)) {
            return Ok(strip);
        }
        loop {
            match self.inbox.blocking_recv() {
                Some(Envelope::Strip {
                    from,
                    tag: got,
                    clock: tick,
                    strip,
                }) => {
                    if from == side && got == tag && tick == clock {
                        return Ok(strip);
                    }
                    self.stash.insert((from, got, tick), strip);
                }
                Some(Envelope::Abort) => return Err(self.peer_aborted()),
                None => {
                    return Err(ExchangeError::InboxClosed {
                        tile: self.position,
                        clock,
                    });
                }
            }
        }
    }

    fn all_reduce(&mut self, clock: Tick, local: &Stats) -> Result<Stats, ExchangeError> {
        self.partials
            .send(Partial::Stats {
                clock,
                stats: *local,
            })
            .map_err(|_| Self::reduction_error("the reducing tile is gone"))?;
        self.gather(clock)?;
        loop {
            match self.totals.blocking_recv() {
                Ok(Total::Stats { clock: tick, stats }) if tick == clock => return Ok(stats),
                Ok(Total::Stats { .. }) => {}
                Ok(Total::Abort) => return Err(self.peer_aborted()),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(tile = %self.position, skipped, "missed reduced statistics");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(Self::reduction_error("the reducing tile is gone"));
                }
            }
        }
    }

    fn abort(&mut self) {
        if self.aborted {
            return;
        }
        self.aborted = true;
        // Peers may already be gone; there is nobody left to tell then.
        for outbox in self.outboxes.values() {
            let _ = outbox.send(Envelope::Abort);
        }
        let _ = self.partials.send(Partial::Abort);
        if let Some(root) = self.root.as_ref() {
            let _ = root.publish.send(Total::Abort);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use apocalypse_types::Bearing;

    use super::*;
    use crate::topology::Topology;

    fn zombie(tick: Tick) -> Option<Entity> {
        Some(Entity::Zombie {
            became_zombie: tick,
            bearing: Bearing::ZERO,
        })
    }

    #[test]
    fn local_exchange_loops_back_across_the_opposite_side() {
        let mut exchange = LocalExchange::new();
        exchange
            .send(Side::Top, ExchangeTag::Ghost, 0, vec![zombie(1), None])
            .unwrap();
        assert!(matches!(
            exchange.receive(Side::Top, ExchangeTag::Ghost, 0),
            Err(ExchangeError::MissingStrip { side: Side::Top })
        ));
        let strip = exchange.receive(Side::Bottom, ExchangeTag::Ghost, 0).unwrap();
        assert_eq!(strip, vec![zombie(1), None]);
    }

    #[test]
    fn local_reduction_is_identity() {
        let mut exchange = LocalExchange::new();
        let stats = Stats {
            zombies: 5,
            ..Stats::default()
        };
        assert_eq!(exchange.all_reduce(3, &stats).unwrap(), stats);
    }

    #[test]
    fn mesh_routes_strips_to_neighbours() {
        let layout = TileLayout::new(8, 8, 2, 1, Topology::Bounded).unwrap();
        let mut mesh = ChannelExchange::mesh(&layout);
        let mut right = mesh.pop().unwrap();
        let mut left = mesh.pop().unwrap();
        assert_eq!(left.position(), TilePosition::new(0, 0));

        left.send(Side::Right, ExchangeTag::BorderEdge, 4, vec![zombie(9)])
            .unwrap();
        assert!(matches!(
            left.send(Side::Left, ExchangeTag::BorderEdge, 4, vec![]),
            Err(ExchangeError::Disconnected { side: Side::Left, .. })
        ));
        let strip = right.receive(Side::Left, ExchangeTag::BorderEdge, 4).unwrap();
        assert_eq!(strip, vec![zombie(9)]);
    }

    #[test]
    fn out_of_order_strips_are_stashed() {
        let layout = TileLayout::new(8, 8, 2, 1, Topology::Torus).unwrap();
        let mut mesh = ChannelExchange::mesh(&layout);
        let mut right = mesh.pop().unwrap();
        let mut left = mesh.pop().unwrap();

        left.send(Side::Right, ExchangeTag::Ghost, 1, vec![zombie(1)]).unwrap();
        left.send(Side::Left, ExchangeTag::Ghost, 1, vec![zombie(2)]).unwrap();
        left.send(Side::Right, ExchangeTag::Ghost, 0, vec![zombie(0)]).unwrap();

        assert_eq!(
            right.receive(Side::Left, ExchangeTag::Ghost, 0).unwrap(),
            vec![zombie(0)]
        );
        assert_eq!(
            right.receive(Side::Right, ExchangeTag::Ghost, 1).unwrap(),
            vec![zombie(2)]
        );
        assert_eq!(
            right.receive(Side::Left, ExchangeTag::Ghost, 1).unwrap(),
            vec![zombie(1)]
        );
    }

    #[test]
    fn all_reduce_sums_over_tiles() {
        let layout = TileLayout::new(8, 8, 2, 2, Topology::Torus).unwrap();
        let handles: Vec<_> = ChannelExchange::mesh(&layout)
            .into_iter()
            .enumerate()
            .map(|(rank, mut exchange)| {
                thread::spawn(move || {
                    let mut totals = Vec::new();
                    for clock in 0..3 {
                        let local = Stats {
                            zombies: u64::try_from(rank).unwrap() + 1,
                            human_males: clock,
                            ..Stats::default()
                        };
                        totals.push(exchange.all_reduce(clock.try_into().unwrap(), &local).unwrap());
                    }
                    totals
                })
            })
            .collect();
        for handle in handles {
            let totals = handle.join().unwrap();
            for (clock, total) in totals.iter().enumerate() {
                assert_eq!(total.zombies, 10);
                assert_eq!(total.human_males, 4 * u64::try_from(clock).unwrap());
            }
        }
    }

    #[test]
    fn abort_wakes_waiting_peers() {
        let layout = TileLayout::new(8, 8, 2, 1, Topology::Torus).unwrap();
        let mut mesh = ChannelExchange::mesh(&layout);
        let mut right = mesh.pop().unwrap();
        let mut left = mesh.pop().unwrap();

        let waiter = thread::spawn(move || right.receive(Side::Left, ExchangeTag::Ghost, 0));
        left.abort();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(ExchangeError::PeerAborted { .. })
        ));
    }

    #[test]
    fn abort_interrupts_the_reduction() {
        let layout = TileLayout::new(8, 8, 2, 1, Topology::Torus).unwrap();
        let mut mesh = ChannelExchange::mesh(&layout);
        let mut right = mesh.pop().unwrap();
        let mut root = mesh.pop().unwrap();

        let waiter = thread::spawn(move || root.all_reduce(0, &Stats::default()));
        right.abort();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(ExchangeError::PeerAborted { .. })
        ));
    }
}
