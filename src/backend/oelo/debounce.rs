use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::backend::oelo::client::ControllerApi;
use crate::error::DeviceError;

/// What became of one submitted command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    Failed(DeviceError),
    /// A newer command replaced this one before it was sent
    Superseded,
}

/// Runs in the sending task once the controller has answered, whether or not
/// the submitter is still waiting.
pub type OnSent = Box<dyn FnOnce(Result<(), DeviceError>) -> BoxFuture<'static, ()> + Send>;

type Reply = oneshot::Sender<Result<(), DeviceError>>;

struct Pending {
    url: Url,
    reply: Reply,
    on_sent: OnSent,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<Pending>,
    timer: CancellationToken,
}

/// Single-slot command buffer for one zone.
///
/// Each submitted url replaces the buffered one and restarts the delay. Only
/// the url that is still buffered when it gets its turn on the wire is sent.
/// At most one request per zone is on the wire at a time.
pub struct Debouncer {
    zone: u8,
    api: Arc<dyn ControllerApi>,
    delay: Duration,
    slot: Arc<Mutex<Slot>>,
    wire: Arc<Mutex<()>>,
}

impl Debouncer {
    #[must_use]
    pub fn new(zone: u8, api: Arc<dyn ControllerApi>, delay: Duration) -> Self {
        Self {
            zone,
            api,
            delay,
            slot: Arc::default(),
            wire: Arc::default(),
        }
    }

    /// Buffer `url` and wait for it to be sent, or replaced.
    ///
    /// `on_sent` is only called if the url reaches the controller. It is
    /// dropped unused when the command is superseded or cancelled.
    pub async fn submit(&self, url: Url, on_sent: OnSent) -> CommandOutcome {
        let (reply, rx) = oneshot::channel();
        let timer = CancellationToken::new();

        let generation = {
            let mut slot = self.slot.lock().await;
            slot.timer.cancel();
            let pending = Pending {
                url,
                reply,
                on_sent,
            };
            if slot.pending.replace(pending).is_some() {
                log::debug!("[zone {}] Superseding buffered command", self.zone);
            }
            slot.generation += 1;
            slot.timer = timer.clone();
            slot.generation
        };

        tokio::spawn(Self::fire(
            self.zone,
            self.api.clone(),
            self.slot.clone(),
            self.wire.clone(),
            self.delay,
            timer,
            generation,
        ));

        match rx.await {
            Ok(Ok(())) => CommandOutcome::Accepted,
            Ok(Err(err)) => CommandOutcome::Failed(err),
            Err(_) => CommandOutcome::Superseded,
        }
    }

    async fn fire(
        zone: u8,
        api: Arc<dyn ControllerApi>,
        slot: Arc<Mutex<Slot>>,
        wire: Arc<Mutex<()>>,
        delay: Duration,
        timer: CancellationToken,
        generation: u64,
    ) {
        tokio::select! {
            () = timer.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        // the buffer is read only once the wire is free, so a newer command
        // can still replace this one while an earlier send is in flight
        let _wire = wire.lock().await;

        let Pending {
            url,
            reply,
            on_sent,
        } = {
            let mut slot = slot.lock().await;
            if slot.generation != generation {
                return;
            }
            let Some(pending) = slot.pending.take() else {
                return;
            };
            pending
        };

        log::debug!("[zone {zone}] Sending {url}");
        let res = api.send_command(&url).await;
        on_sent(res.clone()).await;

        // nobody may be waiting anymore
        let _ = reply.send(res);
    }

    /// Drop the buffered command, if any. Its caller sees it superseded.
    pub async fn cancel(&self) {
        let mut slot = self.slot.lock().await;
        slot.timer.cancel();
        if slot.pending.take().is_some() {
            log::debug!("[zone {}] Discarding buffered command", self.zone);
        }
    }
}
