use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, broadcast};

use oelo_api::zone::{ZoneEvent, ZoneView};

use crate::backend::oelo::debounce::{CommandOutcome, Debouncer, OnSent};
use crate::error::{DeviceError, ZoneError};
use crate::model::availability::Transition;
use crate::model::command::{ControllerEndpoint, PatternCommand, build_off_command};
use crate::model::patterns::PatternCatalog;
use crate::model::state::StateStore;
use crate::model::zone::{TurnOn, ZoneState};

/// Resources shared by every zone of one controller
#[derive(Clone)]
pub struct LightContext {
    pub endpoint: ControllerEndpoint,
    pub catalog: Arc<PatternCatalog>,
    pub events: broadcast::Sender<ZoneEvent>,
    pub store: Arc<Mutex<StateStore>>,
}

/// What a sent command asked the zone to do
enum Sent {
    On(PatternCommand),
    Off,
}

/// Zone state, shared with the send task of every command in flight
struct ZoneCore {
    zone: u8,
    state: Mutex<ZoneState>,
    ctx: LightContext,
}

impl ZoneCore {
    fn publish(&self, evt: ZoneEvent) {
        // no subscribers is fine
        let _ = self.ctx.events.send(evt);
    }

    fn publish_if_changed(&self, before: &ZoneView, zone: &ZoneState) {
        let after = zone.view();
        if &after != before {
            self.publish(ZoneEvent::Update(after));
        }
    }

    /// Fold a send or poll outcome into availability, notifying observers on
    /// transitions only.
    fn record(&self, zone: &mut ZoneState, result: Result<(), &DeviceError>) {
        match (zone.record_outcome(result.is_ok()), result) {
            (Some(Transition::Recovered), _) => {
                log::info!("[zone {}] Controller reachable again", self.zone);
                self.publish(ZoneEvent::Recovered { zone: self.zone });
            }
            (Some(Transition::Lost), Err(err)) => {
                log::warn!("[zone {}] Zone unavailable: {err}", self.zone);
                self.publish(ZoneEvent::Lost { zone: self.zone });
            }
            (Some(Transition::Lost), Ok(())) | (None, _) => {}
        }
    }

    async fn persist(&self, zone: &ZoneState) {
        let mut store = self.ctx.store.lock().await;
        if store.update(zone, &self.ctx.endpoint) {
            if let Err(err) = store.save() {
                log::error!("[zone {}] Failed to save state: {err}", self.zone);
            }
        }
    }

    /// Fold the controller's answer to a sent command into the zone
    async fn settle(&self, sent: Sent, res: Result<(), DeviceError>) {
        let mut zone = self.state.lock().await;
        let before = zone.view();
        match &res {
            Ok(()) => {
                match &sent {
                    Sent::On(base) => {
                        zone.commit_success(base);
                    }
                    Sent::Off => zone.confirm_off(),
                }
                self.record(&mut zone, Ok(()));
                self.publish_if_changed(&before, &zone);
                self.persist(&zone).await;
            }
            Err(err) => {
                self.record(&mut zone, Err(err));
                self.publish_if_changed(&before, &zone);
            }
        }
    }
}

/// One zone of a controller, as a light
pub struct OeloLight {
    core: Arc<ZoneCore>,
    debouncer: Debouncer,
}

impl OeloLight {
    #[must_use]
    pub fn new(state: ZoneState, debouncer: Debouncer, ctx: LightContext) -> Self {
        let core = ZoneCore {
            zone: state.zone_id(),
            state: Mutex::new(state),
            ctx,
        };
        Self {
            core: Arc::new(core),
            debouncer,
        }
    }

    #[must_use]
    pub fn zone(&self) -> u8 {
        self.core.zone
    }

    pub async fn view(&self) -> ZoneView {
        self.core.state.lock().await.view()
    }

    pub async fn seq(&self) -> u64 {
        self.core.state.lock().await.seq()
    }

    fn on_sent(&self, sent: Sent) -> OnSent {
        let core = self.core.clone();
        Box::new(move |res| async move { core.settle(sent, res).await }.boxed())
    }

    /// Turn the zone on, optionally changing brightness, color or effect.
    ///
    /// The new state is shown right away. A failed send leaves it in place
    /// and marks the zone unavailable until the next successful poll or
    /// command.
    pub async fn turn_on(&self, req: &TurnOn) -> Result<CommandOutcome, ZoneError> {
        let zone_id = self.zone();
        let (url, base) = {
            let mut zone = self.core.state.lock().await;
            let Some(res) = zone.resolve(req, &self.core.ctx.catalog)? else {
                log::debug!("[zone {zone_id}] Already on, nothing to send");
                return Ok(CommandOutcome::Accepted);
            };

            let before = zone.view();
            zone.apply_optimistic(&res);
            self.core.publish_if_changed(&before, &zone);

            log::debug!("[zone {zone_id}] Requesting {}", res.command);
            (self.core.ctx.endpoint.command_url(&res.command), res.base)
        };

        let outcome = self.debouncer.submit(url, self.on_sent(Sent::On(base))).await;
        match &outcome {
            CommandOutcome::Accepted => log::info!("[zone {zone_id}] Turned on"),
            CommandOutcome::Failed(err) => log::error!("[zone {zone_id}] Failed to turn on: {err}"),
            CommandOutcome::Superseded => log::debug!("[zone {zone_id}] Turn on superseded"),
        }

        Ok(outcome)
    }

    /// Turn the zone off. Power is only cleared once the controller accepts
    /// the command.
    pub async fn turn_off(&self) -> CommandOutcome {
        let zone_id = self.zone();
        let command = build_off_command(zone_id);
        log::debug!("[zone {zone_id}] Requesting {command}");

        let url = self.core.ctx.endpoint.command_url(&command);
        let outcome = self.debouncer.submit(url, self.on_sent(Sent::Off)).await;
        match &outcome {
            CommandOutcome::Accepted => log::info!("[zone {zone_id}] Turned off"),
            CommandOutcome::Failed(err) => {
                log::error!("[zone {zone_id}] Failed to turn off: {err}");
            }
            CommandOutcome::Superseded => log::debug!("[zone {zone_id}] Turn off superseded"),
        }

        outcome
    }

    /// Fold this zone's part of a status poll into its state. `since_seq`
    /// is [`OeloLight::seq`] as read before the poll was sent.
    pub async fn apply_poll(
        &self,
        report: Result<(&str, Option<&str>), DeviceError>,
        since_seq: u64,
    ) {
        let core = &self.core;
        let mut zone = core.state.lock().await;
        let before = zone.view();
        match report {
            Ok((pattern, colors)) => {
                core.record(&mut zone, Ok(()));
                zone.reconcile(pattern, colors, since_seq);
            }
            Err(err) => {
                log::debug!("[zone {}] No usable status: {err}", core.zone);
                core.record(&mut zone, Err(&err));
            }
        }
        core.publish_if_changed(&before, &zone);
    }

    /// Discard any command still waiting to be sent
    pub async fn cancel_pending(&self) {
        self.debouncer.cancel().await;
    }
}
