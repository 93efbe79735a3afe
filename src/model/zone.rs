use rgb::RGB8;

use oelo_api::zone::ZoneView;

use crate::error::ZoneError;
use crate::model::availability::{Availability, Transition};
use crate::model::command::{
    BLACK, PATTERN_OFF, PatternCommand, WHITE, ZoneCommand, build_color_command,
    build_effect_command, parse_color_list,
};
use crate::model::patterns::PatternCatalog;

/// Turn-on request. Every attribute is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnOn {
    pub brightness: Option<u8>,
    pub rgb: Option<RGB8>,
    pub effect: Option<String>,
}

/// The command chosen for a turn-on request, and the state it implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Command to send, scaled to `brightness`
    pub command: ZoneCommand,
    /// Unscaled version of `command`, remembered for replay once accepted
    pub base: PatternCommand,
    pub brightness: u8,
    pub rgb: RGB8,
    pub effect: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneState {
    zone_id: u8,
    pub power: bool,
    pub brightness: u8,
    /// Base color, never pre-scaled by brightness
    pub rgb: RGB8,
    pub intended_effect: Option<String>,
    pub last_successful_command: Option<PatternCommand>,
    pub availability: Availability,
    /// Bumped on every command-driven change; guards against stale polls
    seq: u64,
}

impl ZoneState {
    #[must_use]
    pub fn new(zone_id: u8) -> Self {
        Self {
            zone_id,
            power: false,
            brightness: 255,
            rgb: WHITE,
            intended_effect: None,
            last_successful_command: None,
            availability: Availability::default(),
            seq: 0,
        }
    }

    #[must_use]
    pub const fn zone_id(&self) -> u8 {
        self.zone_id
    }

    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.availability.is_available()
    }

    /// Choose the command for a turn-on request.
    ///
    /// Returns `Ok(None)` when the zone is already on and nothing was
    /// requested, so there is nothing to send.
    pub fn resolve(
        &self,
        req: &TurnOn,
        catalog: &PatternCatalog,
    ) -> Result<Option<Resolution>, ZoneError> {
        let zone = self.zone_id;
        let brightness = req.brightness.unwrap_or(self.brightness);

        if let Some(name) = &req.effect {
            let template = catalog
                .lookup(name)
                .ok_or_else(|| ZoneError::UnknownEffect(name.clone()))?;
            return Ok(Some(Resolution {
                command: build_effect_command(zone, template, brightness),
                base: template.clone(),
                brightness,
                rgb: template.first_color().unwrap_or(self.rgb),
                effect: Some(name.clone()),
            }));
        }

        if let Some(rgb) = req.rgb {
            return Ok(Some(Resolution {
                command: build_color_command(zone, rgb, brightness),
                base: PatternCommand::solid(rgb),
                brightness,
                rgb,
                effect: None,
            }));
        }

        if self.power && req.brightness.is_none() {
            return Ok(None);
        }

        Ok(Some(self.replay(brightness, catalog)))
    }

    /// Rebuild the current look at a new brightness: the intended effect if
    /// there is one, otherwise the last accepted command, otherwise white.
    fn replay(&self, brightness: u8, catalog: &PatternCatalog) -> Resolution {
        let zone = self.zone_id;

        if let Some(name) = &self.intended_effect {
            if let Some(template) = catalog.lookup(name) {
                log::debug!("[zone {zone}] Replaying effect {name:?}");
                return Resolution {
                    command: build_effect_command(zone, template, brightness),
                    base: template.clone(),
                    brightness,
                    rgb: template.first_color().unwrap_or(self.rgb),
                    effect: Some(name.clone()),
                };
            }
            log::warn!("[zone {zone}] Effect {name:?} no longer exists, not replaying it");
        }

        if let Some(last) = &self.last_successful_command {
            log::debug!("[zone {zone}] Replaying last successful command");
            let effect = if last.is_custom() {
                None
            } else {
                catalog.reverse_lookup(last).map(ToString::to_string)
            };
            return Resolution {
                command: build_effect_command(zone, last, brightness),
                base: last.clone(),
                brightness,
                rgb: last.first_color().unwrap_or(self.rgb),
                effect,
            };
        }

        log::debug!("[zone {zone}] Nothing to replay, falling back to white");
        Resolution {
            command: build_color_command(zone, WHITE, brightness),
            base: PatternCommand::solid(WHITE),
            brightness,
            rgb: WHITE,
            effect: None,
        }
    }

    /// Show the resolved state right away, before the device confirms it.
    pub fn apply_optimistic(&mut self, res: &Resolution) {
        self.power = true;
        self.brightness = res.brightness;
        self.rgb = res.rgb;
        self.intended_effect.clone_from(&res.effect);
        self.seq += 1;
    }

    /// Remember `base` as the last accepted command. Returns true if it
    /// changed.
    pub fn commit_success(&mut self, base: &PatternCommand) -> bool {
        if self.last_successful_command.as_ref() == Some(base) {
            return false;
        }
        self.last_successful_command = Some(base.clone());
        true
    }

    /// The device accepted an off command. The last successful command is
    /// kept, so a bare turn-on restores the previous look.
    pub const fn confirm_off(&mut self) {
        self.power = false;
        self.seq += 1;
    }

    /// Fold one zone entry of a status poll into this state.
    ///
    /// `since_seq` is the value of [`ZoneState::seq`] when the poll was
    /// started. If a command has touched the zone since then, the poll is
    /// older than the optimistic state, and power/color are left alone.
    /// Returns true if any observable attribute changed.
    pub fn reconcile(&mut self, pattern: &str, colors: Option<&str>, since_seq: u64) -> bool {
        if self.seq != since_seq {
            log::debug!(
                "[zone {}] Ignoring poll result older than latest command",
                self.zone_id
            );
            return false;
        }

        let power = pattern != PATTERN_OFF;
        let mut changed = self.power != power;
        if changed {
            log::info!(
                "[zone {}] Controller reports zone {} (pattern {pattern:?})",
                self.zone_id,
                if power { "on" } else { "off" }
            );
        }
        self.power = power;

        if power {
            match colors.and_then(|text| parse_color_list(text).first().copied()) {
                Some(rgb) => {
                    changed |= self.rgb != rgb;
                    self.rgb = rgb;
                }
                None => log::debug!(
                    "[zone {}] No usable color in poll ({colors:?}), keeping {:?}",
                    self.zone_id,
                    self.rgb
                ),
            }
        }

        changed
    }

    pub const fn record_outcome(&mut self, success: bool) -> Option<Transition> {
        self.availability.record(success)
    }

    /// State as presented to clients
    #[must_use]
    pub fn view(&self) -> ZoneView {
        let mut view = ZoneView {
            zone: self.zone_id,
            name: format!("Zone {}", self.zone_id),
            available: self.is_available(),
            on: None,
            brightness: None,
            rgb: None,
            effect: None,
        };

        if !view.available {
            return view;
        }

        let rgb = if self.power { self.rgb } else { BLACK };
        view.on = Some(self.power);
        view.brightness = Some(self.brightness);
        view.rgb = Some([rgb.r, rgb.g, rgb.b]);
        if self.power {
            view.effect.clone_from(&self.intended_effect);
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use rgb::RGB8;

    use crate::error::ZoneError;
    use crate::model::command::{PatternCommand, WHITE};
    use crate::model::patterns::PatternCatalog;
    use crate::model::zone::{TurnOn, ZoneState};

    const ICICLE: &str = "Christmas: Icicle Chase";

    fn turn_on(zone: &mut ZoneState, cat: &PatternCatalog, req: &TurnOn) -> PatternCommand {
        let res = zone.resolve(req, cat).unwrap().unwrap();
        zone.apply_optimistic(&res);
        zone.commit_success(&res.base);
        res.command.pattern
    }

    #[test]
    fn effect_from_default_state() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(1);

        let req = TurnOn {
            effect: Some(ICICLE.to_string()),
            ..TurnOn::default()
        };
        let res = zone.resolve(&req, &cat).unwrap().unwrap();

        assert_eq!(res.command.pattern.pattern_type, "chase");
        assert_eq!(
            res.command.pattern.colors,
            [
                RGB8::new(255, 255, 255),
                RGB8::new(0, 183, 245),
                RGB8::new(0, 73, 245)
            ]
        );

        zone.apply_optimistic(&res);
        assert!(zone.power);
        assert_eq!(zone.intended_effect.as_deref(), Some(ICICLE));
        assert_eq!(zone.rgb, RGB8::new(255, 255, 255));
    }

    #[test]
    fn brightness_only_rebuilds_intended_effect() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(1);
        turn_on(
            &mut zone,
            &cat,
            &TurnOn {
                effect: Some(ICICLE.to_string()),
                ..TurnOn::default()
            },
        );

        let cmd = turn_on(
            &mut zone,
            &cat,
            &TurnOn {
                brightness: Some(128),
                ..TurnOn::default()
            },
        );

        assert_eq!(cmd.pattern_type, "chase");
        assert_eq!(
            cmd.colors,
            [
                RGB8::new(128, 128, 128),
                RGB8::new(0, 92, 123),
                RGB8::new(0, 37, 123)
            ]
        );
        assert_eq!(zone.intended_effect.as_deref(), Some(ICICLE));
        assert_eq!(zone.brightness, 128);
    }

    #[test]
    fn effect_wins_over_rgb() {
        let cat = PatternCatalog::builtin();
        let zone = ZoneState::new(1);
        let req = TurnOn {
            rgb: Some(RGB8::new(1, 2, 3)),
            effect: Some(ICICLE.to_string()),
            ..TurnOn::default()
        };

        let res = zone.resolve(&req, &cat).unwrap().unwrap();
        assert_eq!(res.effect.as_deref(), Some(ICICLE));
    }

    #[test]
    fn rgb_clears_effect() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(2);
        zone.intended_effect = Some(ICICLE.to_string());
        zone.brightness = 51;

        let cmd = turn_on(
            &mut zone,
            &cat,
            &TurnOn {
                rgb: Some(RGB8::new(255, 100, 0)),
                ..TurnOn::default()
            },
        );

        assert_eq!(cmd.pattern_type, "custom");
        assert_eq!(cmd.colors, [RGB8::new(51, 20, 0)]);
        assert_eq!(zone.intended_effect, None);
        assert_eq!(zone.rgb, RGB8::new(255, 100, 0));
        assert_eq!(
            zone.last_successful_command,
            Some(PatternCommand::solid(RGB8::new(255, 100, 0)))
        );
    }

    #[test]
    fn unknown_effect_rejected() {
        let cat = PatternCatalog::builtin();
        let zone = ZoneState::new(1);
        let req = TurnOn {
            effect: Some("Disco".to_string()),
            ..TurnOn::default()
        };

        assert_eq!(
            zone.resolve(&req, &cat),
            Err(ZoneError::UnknownEffect("Disco".to_string()))
        );
    }

    #[test]
    fn bare_turn_on_defaults_to_white() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(3);
        let cmd = turn_on(&mut zone, &cat, &TurnOn::default());

        assert_eq!(cmd, PatternCommand::solid(WHITE));
        assert!(zone.power);
    }

    #[test]
    fn bare_turn_on_when_on_sends_nothing() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(3);
        zone.power = true;

        assert_eq!(zone.resolve(&TurnOn::default(), &cat), Ok(None));
    }

    #[test]
    fn replay_last_command_after_off() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(1);
        turn_on(
            &mut zone,
            &cat,
            &TurnOn {
                rgb: Some(RGB8::new(0, 0, 200)),
                brightness: Some(255),
                ..TurnOn::default()
            },
        );
        zone.confirm_off();

        let cmd = turn_on(
            &mut zone,
            &cat,
            &TurnOn {
                brightness: Some(51),
                ..TurnOn::default()
            },
        );
        assert_eq!(cmd.colors, [RGB8::new(0, 0, 40)]);
        assert_eq!(zone.rgb, RGB8::new(0, 0, 200));
        assert_eq!(zone.intended_effect, None);
    }

    #[test]
    fn replay_reverse_maps_effect_exactly() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(1);
        zone.last_successful_command = cat.lookup("Pride: Split").cloned();

        let res = zone.resolve(&TurnOn::default(), &cat).unwrap().unwrap();
        assert_eq!(res.effect.as_deref(), Some("Pride: Split"));

        let mut unknown = cat.lookup("Pride: Split").cloned().unwrap();
        unknown.colors.pop();
        zone.last_successful_command = Some(unknown);

        let res = zone.resolve(&TurnOn::default(), &cat).unwrap().unwrap();
        assert_eq!(res.effect, None);
        assert_eq!(res.command.pattern.pattern_type, "split");
    }

    #[test]
    fn commit_reports_change() {
        let mut zone = ZoneState::new(1);
        let cmd = PatternCommand::solid(RGB8::new(1, 1, 1));

        assert!(zone.commit_success(&cmd));
        assert!(!zone.commit_success(&cmd));
    }

    #[test]
    fn poll_off_overrides_optimistic_state() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(1);
        turn_on(&mut zone, &cat, &TurnOn::default());

        let seq = zone.seq();
        assert!(zone.reconcile("off", None, seq));
        assert!(!zone.power);
    }

    #[test]
    fn poll_malformed_colors_keep_rgb() {
        let mut zone = ZoneState::new(1);
        zone.rgb = RGB8::new(10, 20, 30);

        let seq = zone.seq();
        zone.reconcile("custom", Some("garbage"), seq);
        assert!(zone.power);
        assert_eq!(zone.rgb, RGB8::new(10, 20, 30));

        zone.reconcile("custom", Some("7,8"), seq);
        assert_eq!(zone.rgb, RGB8::new(10, 20, 30));

        zone.reconcile("custom", Some("7,8,9,1,1,1"), seq);
        assert_eq!(zone.rgb, RGB8::new(7, 8, 9));
    }

    #[test]
    fn poll_keeps_intended_effect() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(1);
        turn_on(
            &mut zone,
            &cat,
            &TurnOn {
                effect: Some(ICICLE.to_string()),
                ..TurnOn::default()
            },
        );

        let seq = zone.seq();
        zone.reconcile("off", None, seq);
        zone.reconcile("chase", Some("1,2,3"), seq);
        assert_eq!(zone.intended_effect.as_deref(), Some(ICICLE));
    }

    #[test]
    fn stale_poll_is_ignored() {
        let cat = PatternCatalog::builtin();
        let mut zone = ZoneState::new(1);
        let seq = zone.seq();

        turn_on(&mut zone, &cat, &TurnOn::default());

        assert!(!zone.reconcile("off", None, seq));
        assert!(zone.power);
    }

    #[test]
    fn view_hides_state_when_unavailable() {
        let mut zone = ZoneState::new(4);
        zone.power = true;
        zone.record_outcome(false);

        let view = zone.view();
        assert!(!view.available);
        assert_eq!(view.on, None);
        assert_eq!(view.brightness, None);
        assert_eq!(view.rgb, None);
        assert_eq!(view.effect, None);
    }

    #[test]
    fn view_when_off_is_black_without_effect() {
        let mut zone = ZoneState::new(4);
        zone.intended_effect = Some(ICICLE.to_string());
        zone.rgb = RGB8::new(1, 2, 3);

        let view = zone.view();
        assert_eq!(view.on, Some(false));
        assert_eq!(view.rgb, Some([0, 0, 0]));
        assert_eq!(view.effect, None);
        assert_eq!(view.name, "Zone 4");

        // internal values are kept for replay
        assert_eq!(zone.intended_effect.as_deref(), Some(ICICLE));
    }
}
