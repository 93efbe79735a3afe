pub mod client;
pub mod debounce;
pub mod light;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rgb::RGB8;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use oelo_api::config::ControllerConfig;
use oelo_api::zone::{LightRequest, LightResponse, Outcome, ZONE_COUNT, ZoneEvent, ZoneView};

use crate::backend::oelo::client::{ControllerApi, OeloClient};
use crate::backend::oelo::debounce::{CommandOutcome, Debouncer};
use crate::backend::oelo::light::{LightContext, OeloLight};
use crate::error::{ApiResult, ZoneError};
use crate::model::command::ControllerEndpoint;
use crate::model::patterns::PatternCatalog;
use crate::model::state::StateStore;
use crate::model::zone::TurnOn;

const EVENT_CHANNEL_SIZE: usize = 64;

/// Everything belonging to one configured controller: its client, its six
/// zones and the state they share.
pub struct OeloBackend {
    api: Arc<dyn ControllerApi>,
    lights: Vec<Arc<OeloLight>>,
    ctx: LightContext,
    poll_interval: Duration,
}

impl OeloBackend {
    #[must_use]
    pub fn new(
        conf: &ControllerConfig,
        endpoint: ControllerEndpoint,
        http: reqwest::Client,
        store: StateStore,
    ) -> Self {
        let client = OeloClient::new(endpoint.clone(), http, conf.timeout());
        Self::with_api(
            Arc::new(client),
            endpoint,
            store,
            conf.debounce(),
            conf.poll_interval(),
        )
    }

    #[must_use]
    pub fn with_api(
        api: Arc<dyn ControllerApi>,
        endpoint: ControllerEndpoint,
        store: StateStore,
        debounce: Duration,
        poll_interval: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        let lights = (1..=ZONE_COUNT)
            .map(|zone| store.restore(zone))
            .collect::<Vec<_>>();

        let ctx = LightContext {
            endpoint,
            catalog: Arc::new(PatternCatalog::builtin()),
            events,
            store: Arc::new(Mutex::new(store)),
        };

        let lights = lights
            .into_iter()
            .map(|state| {
                let debouncer = Debouncer::new(state.zone_id(), api.clone(), debounce);
                Arc::new(OeloLight::new(state, debouncer, ctx.clone()))
            })
            .collect();

        Self {
            api,
            lights,
            ctx,
            poll_interval,
        }
    }

    #[must_use]
    pub fn host(&self) -> String {
        self.ctx.endpoint.host()
    }

    pub fn light(&self, zone: u8) -> Result<&Arc<OeloLight>, ZoneError> {
        self.lights
            .iter()
            .find(|light| light.zone() == zone)
            .ok_or(ZoneError::NoSuchZone(zone))
    }

    #[must_use]
    pub fn effects(&self) -> Vec<String> {
        self.ctx
            .catalog
            .list_effects()
            .map(ToString::to_string)
            .collect()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ZoneEvent> {
        self.ctx.events.subscribe()
    }

    pub async fn views(&self) -> Vec<ZoneView> {
        join_all(self.lights.iter().map(|light| light.view())).await
    }

    /// Apply a client request to one zone and report what became of it.
    pub async fn request(&self, zone: u8, req: LightRequest) -> ApiResult<LightResponse> {
        let light = self.light(zone)?;

        let outcome = if req.on {
            let turn_on = TurnOn {
                brightness: req.brightness,
                rgb: req.rgb.map(|[r, g, b]| RGB8::new(r, g, b)),
                effect: req.effect,
            };
            light.turn_on(&turn_on).await?
        } else {
            light.turn_off().await
        };

        let outcome = match outcome {
            CommandOutcome::Accepted => Outcome::Accepted,
            CommandOutcome::Failed(_) => Outcome::Failed,
            CommandOutcome::Superseded => Outcome::Superseded,
        };

        Ok(LightResponse {
            outcome,
            zone: light.view().await,
        })
    }

    /// Fetch controller status once, and fold it into every zone.
    pub async fn poll(&self) {
        let seqs = join_all(self.lights.iter().map(|light| light.seq())).await;

        match self.api.poll_status().await {
            Ok(status) => {
                log::trace!("[{}] Polled {} zones", self.host(), status.zones.len());
                for (light, seq) in self.lights.iter().zip(seqs) {
                    light.apply_poll(status.zone(light.zone()), seq).await;
                }
            }
            Err(err) => {
                log::warn!("[{}] Status poll failed: {err}", self.host());
                for (light, seq) in self.lights.iter().zip(seqs) {
                    light.apply_poll(Err(err.clone()), seq).await;
                }
            }
        }
    }

    /// Poll periodically until `shutdown` is cancelled. The first poll
    /// happens one interval from now.
    pub async fn run(&self, shutdown: CancellationToken) {
        let start = Instant::now() + self.poll_interval;
        let mut tick = interval_at(start, self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => self.poll().await,
                () = shutdown.cancelled() => break,
            }
        }

        log::debug!("[{}] Poll loop stopped", self.host());
    }

    /// Drop pending commands and write state to disk.
    pub async fn shutdown(&self) -> ApiResult<()> {
        for light in &self.lights {
            light.cancel_pending().await;
        }
        self.ctx.store.lock().await.save()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use tokio_util::sync::CancellationToken;

    use oelo_api::zone::{LightRequest, Outcome, ZoneEvent};

    use crate::backend::oelo::OeloBackend;
    use crate::backend::oelo::debounce::tests::FakeController;
    use crate::error::{ApiError, DeviceError, ZoneError};
    use crate::model::command::{ControllerEndpoint, ZoneCommand};
    use crate::model::state::StateStore;

    const STATUS: &str = r#"[
        {"num": 1, "pattern": "custom", "colors": "10,20,30"},
        {"num": 2, "pattern": "off", "colors": "0,0,0"},
        {"num": 3, "pattern": "chase", "colors": "255,255,255,0,183,245"},
        {"num": 4, "pattern": "off"},
        {"num": 5, "pattern": "off"}
    ]"#;

    fn backend(api: Arc<FakeController>, dir: &tempfile::TempDir) -> OeloBackend {
        let file = Utf8PathBuf::try_from(dir.path().join("state.yaml")).unwrap();
        OeloBackend::with_api(
            api,
            ControllerEndpoint::parse("10.1.1.1").unwrap(),
            StateStore::load(&file),
            Duration::from_secs(1),
            Duration::from_secs(30),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn poll_updates_each_zone() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeController::default());
        api.set_status(Ok(STATUS));
        let backend = backend(api, &dir);

        backend.poll().await;
        let views = backend.views().await;

        assert_eq!(views.len(), 6);
        assert_eq!(views[0].on, Some(true));
        assert_eq!(views[0].rgb, Some([10, 20, 30]));
        assert_eq!(views[1].on, Some(false));
        assert_eq!(views[2].rgb, Some([255, 255, 255]));
        // a poll does not guess effects
        assert_eq!(views[2].effect, None);
        // zone 6 is missing from the response
        assert!(!views[5].available);
        assert!(views[4].available);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_marks_every_zone() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeController::default());
        api.set_status(Err(DeviceError::Timeout));
        let backend = backend(api.clone(), &dir);
        let mut events = backend.subscribe();

        backend.poll().await;
        assert!(backend.views().await.iter().all(|view| !view.available));

        let lost = std::iter::from_fn(|| events.try_recv().ok())
            .filter(|evt| matches!(evt, ZoneEvent::Lost { .. }))
            .count();
        assert_eq!(lost, 6);

        api.set_status(Ok(STATUS));
        backend.poll().await;
        assert!(backend.views().await[..5].iter().all(|view| view.available));
    }

    #[tokio::test(start_paused = true)]
    async fn connection_error_then_poll_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeController::default());
        api.set_status(Ok(STATUS));
        api.fail_sends(Some(DeviceError::Connection("refused".to_string())));
        let backend = backend(api.clone(), &dir);

        let req = LightRequest {
            on: true,
            rgb: Some([1, 2, 3]),
            ..LightRequest::default()
        };
        let res = backend.request(1, req).await.unwrap();
        assert_eq!(res.outcome, Outcome::Failed);
        assert!(!res.zone.available);

        backend.poll().await;
        let view = backend.light(1).unwrap().view().await;
        assert!(view.available);
        assert_eq!(view.rgb, Some([10, 20, 30]));
    }

    #[tokio::test(start_paused = true)]
    async fn request_effect_builds_command() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeController::default());
        let backend = backend(api.clone(), &dir);

        let req = LightRequest {
            on: true,
            brightness: Some(128),
            effect: Some("Christmas: Icicle Chase".to_string()),
            ..LightRequest::default()
        };
        let res = backend.request(3, req).await.unwrap();
        assert_eq!(res.outcome, Outcome::Accepted);
        assert_eq!(res.zone.effect.as_deref(), Some("Christmas: Icicle Chase"));

        let sent = api.sent();
        let cmd = ZoneCommand::from_url(&sent[0]).unwrap();
        assert_eq!(cmd.zone, 3);
        assert_eq!(cmd.pattern.pattern_type, "chase");
    }

    #[tokio::test(start_paused = true)]
    async fn request_errors() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(Arc::new(FakeController::default()), &dir);

        let res = backend.request(7, LightRequest::default()).await;
        assert!(matches!(
            res,
            Err(ApiError::ZoneError(ZoneError::NoSuchZone(7)))
        ));

        let req = LightRequest {
            on: true,
            effect: Some("Strobe".to_string()),
            ..LightRequest::default()
        };
        let res = backend.request(1, req).await;
        assert!(matches!(
            res,
            Err(ApiError::ZoneError(ZoneError::UnknownEffect(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeController::default());

        let backend1 = backend(api.clone(), &dir);
        let req = LightRequest {
            on: true,
            rgb: Some([9, 9, 9]),
            ..LightRequest::default()
        };
        backend1.request(2, req).await.unwrap();
        backend1.shutdown().await.unwrap();

        let backend2 = backend(api, &dir);
        let view = backend2.light(2).unwrap().view().await;
        assert_eq!(view.on, Some(true));
        assert_eq!(view.rgb, Some([9, 9, 9]));
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(FakeController::default());
        api.set_status(Err(DeviceError::Timeout));
        let backend = Arc::new(backend(api, &dir));
        let token = CancellationToken::new();

        let task = tokio::spawn({
            let backend = backend.clone();
            let token = token.clone();
            async move { backend.run(token).await }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(backend.views().await[0].available);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(!backend.views().await[0].available);

        token.cancel();
        task.await.unwrap();
    }
}
