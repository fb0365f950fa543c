//! Per-category receive loops over the backend change stream.
//!
//! Each category gets exactly one consumer task, so events of one category are
//! handled one at a time in publication order. Categories run independently.

use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::handler::ChangeHandler;
use crate::errors::Result;
use crate::events::{EventCategory, EventChannel, EventEnvelope};

/// The running set of receive loops for one window.
pub struct EventSubscriber {
    tasks: Vec<(EventCategory, JoinHandle<()>)>,
}

impl EventSubscriber {
    /// Subscribes to every category, then starts one receive loop per category.
    ///
    /// All subscriptions are taken before any loop runs; a failure to
    /// subscribe to any channel leaves nothing running.
    pub(crate) fn spawn(channel: &dyn EventChannel, handler: Arc<ChangeHandler>) -> Result<Self> {
        let receivers = EventCategory::ALL
            .into_iter()
            .map(|category| Ok((category, channel.listen(category.channel_name())?)))
            .collect::<Result<Vec<_>>>()?;

        let tasks = receivers
            .into_iter()
            .map(|(category, receiver)| {
                let handler = Arc::clone(&handler);
                let task = tokio::spawn(receive_loop(category, receiver, handler));
                (category, task)
            })
            .collect();

        Ok(Self { tasks })
    }

    pub fn shutdown(&mut self) {
        for (category, task) in self.tasks.drain(..) {
            debug!("Stopping {} receive loop", category.channel_name());
            task.abort();
        }
    }
}

impl Drop for EventSubscriber {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn receive_loop(
    category: EventCategory,
    mut receiver: broadcast::Receiver<EventEnvelope>,
    handler: Arc<ChangeHandler>,
) {
    let channel = category.channel_name();
    debug!("Listening on {}", channel);

    loop {
        match receiver.recv().await {
            Ok(envelope) => {
                if envelope.event != channel {
                    warn!(
                        "Dropping '{}' envelope delivered on {}",
                        envelope.event, channel
                    );
                    continue;
                }
                match category.decode(&envelope.payload) {
                    Ok(event) => handler.handle(category, event),
                    // One bad payload must not stop the stream.
                    Err(e) => warn!("Dropping undecodable event: {}", e),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    "{} lagged by {} events, refetching {:?}",
                    channel,
                    skipped,
                    category.kinds()
                );
                if let Err(e) = handler.resync(category.kinds()).await {
                    error!("Refetch after {} gap failed: {}", channel, e);
                    handler.mark_stale();
                }
            }
            Err(RecvError::Closed) => {
                warn!("{} closed, cache is stale until reconnect", channel);
                handler.mark_stale();
                break;
            }
        }
    }

    info!("{} receive loop finished", channel);
}
