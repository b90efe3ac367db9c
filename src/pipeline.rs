use std::io::Write;

use futures_util::{stream::FuturesUnordered, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::{
    events::{DestroyEvent, EventFilter},
    render::{EventRenderer, FeedWriter, OutputLine},
    resolver::{CharacterLookup, IdentityResolver},
};

pub struct Pipeline<L> {
    filter: EventFilter,
    resolver: IdentityResolver<L>,
    renderer: EventRenderer,
}

impl<L: CharacterLookup> Pipeline<L> {
    pub fn new(filter: EventFilter, resolver: IdentityResolver<L>, renderer: EventRenderer) -> Self {
        Self {
            filter,
            resolver,
            renderer,
        }
    }

    pub fn resolver(&self) -> &IdentityResolver<L> {
        &self.resolver
    }

    // Lines come out in lookup completion order, not arrival order.
    pub async fn run<W: Write>(&self, mut events: mpsc::Receiver<Value>, sink: &mut FeedWriter<W>) {
        let mut pending = FuturesUnordered::new();
        let mut accepting = true;
        loop {
            tokio::select! {
                next = events.recv(), if accepting => match next {
                    Some(payload) => match self.filter.accept(&payload) {
                        Some(event) => {
                            trace!(
                                vehicle_id = event.vehicle_id,
                                victim_team_id = event.victim_team_id,
                                attacker_team_id = event.attacker_team_id,
                                "accepted vehicle destroy"
                            );
                            pending.push(self.handle(event));
                        }
                        None => trace!("dropped untracked or malformed payload"),
                    },
                    None => {
                        info!(pending = pending.len(), "event stream closed");
                        accepting = false;
                    }
                },
                Some(line) = pending.next(), if !pending.is_empty() => {
                    debug!(line = %line.markup(), "feed line");
                    if let Err(err) = sink.write_line(&line) {
                        warn!(?err, "failed writing feed line");
                    }
                }
                else => break,
            }
        }
    }

    async fn handle(&self, event: DestroyEvent) -> OutputLine {
        let (attacker, victim) = tokio::join!(
            self.resolver.resolve(event.attacker_id),
            self.resolver.resolve(event.victim_id)
        );
        self.renderer.render(&event, &attacker, &victim)
    }
}
