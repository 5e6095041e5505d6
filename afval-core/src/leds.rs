//! Container LEDs and the system heartbeat.
//!
//! Each blinking channel is a tokio task that owns a handle to its pin and
//! toggles it on a fixed interval. Stopping a blink aborts the task.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use crate::model::{ClockState, Color, DayColorSet, LedState};
use crate::ports::OutputPin;

/// Toggle rate for tomorrow's containers.
pub const BLINK_HZ: u32 = 1;

/// One LED with an optional blink task.
pub struct LedChannel {
    label: String,
    pin: Arc<dyn OutputPin>,
    blinker: Option<JoinHandle<()>>,
    state: LedState,
}

impl LedChannel {
    /// Wrap a pin. The pin is left untouched until the first state change.
    #[must_use]
    pub fn new(label: impl Into<String>, pin: Arc<dyn OutputPin>) -> Self {
        Self {
            label: label.into(),
            pin,
            blinker: None,
            state: LedState::Off,
        }
    }

    /// Current output state.
    #[must_use]
    pub fn state(&self) -> LedState {
        self.state
    }

    /// Stop blinking and drive the pin low.
    pub fn off(&mut self) {
        self.stop_blink();
        self.write(false);
        self.state = LedState::Off;
    }

    /// Stop blinking and drive the pin high.
    pub fn solid(&mut self) {
        self.stop_blink();
        self.write(true);
        self.state = LedState::Solid;
    }

    /// Toggle the pin `hz` times per second until stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn blink(&mut self, hz: u32) {
        self.stop_blink();
        let period = Duration::from_secs(1) / hz.max(1);
        let pin = Arc::clone(&self.pin);
        let label = self.label.clone();
        self.blinker = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if let Err(err) = pin.toggle() {
                    log::warn!("Toggling {label} failed: {err}");
                }
            }
        }));
        self.state = LedState::Blinking { hz };
    }

    /// Abort the blink task, if any. The pin keeps its last level.
    pub fn stop_blink(&mut self) {
        if let Some(blinker) = self.blinker.take() {
            blinker.abort();
        }
    }

    fn write(&self, high: bool) {
        if let Err(err) = self.pin.set_level(high) {
            log::warn!("Setting {} to {} failed: {err}", self.label, u8::from(high));
        }
    }
}

impl Drop for LedChannel {
    fn drop(&mut self) {
        self.stop_blink();
    }
}

/// Drives one LED per container color.
pub struct LedDriver {
    channels: Vec<(Color, LedChannel)>,
}

impl LedDriver {
    /// Build a driver from color/pin pairs. [`Color::Unknown`] is never wired.
    #[must_use]
    pub fn new<I>(pins: I) -> Self
    where
        I: IntoIterator<Item = (Color, Arc<dyn OutputPin>)>,
    {
        let channels = pins
            .into_iter()
            .filter(|(color, _pin)| color.has_channel())
            .map(|(color, pin)| (color, LedChannel::new(color.to_string(), pin)))
            .collect();
        Self { channels }
    }

    /// Reset every channel, then light today's colors solid and blink tomorrow's.
    pub fn apply(&mut self, colors: &DayColorSet) {
        for (_color, channel) in &mut self.channels {
            channel.off();
        }

        for color in &colors.today {
            if let Some(channel) = self.channel_mut(*color) {
                log::info!("{color} will be on solid for pickup today");
                channel.solid();
            }
        }

        for color in &colors.tomorrow {
            if let Some(channel) = self.channel_mut(*color) {
                log::info!("{color} will be flashing for pickup tomorrow");
                channel.blink(BLINK_HZ);
            }
        }
    }

    /// State of the channel for `color`; unwired colors are always off.
    #[must_use]
    pub fn state(&self, color: Color) -> LedState {
        self.channels
            .iter()
            .find(|(channel_color, _channel)| *channel_color == color)
            .map_or(LedState::Off, |(_color, channel)| channel.state())
    }

    /// States of all wired channels in output order.
    #[must_use]
    pub fn states(&self) -> Vec<(Color, LedState)> {
        self.channels
            .iter()
            .map(|(color, channel)| (*color, channel.state()))
            .collect()
    }

    fn channel_mut(&mut self, color: Color) -> Option<&mut LedChannel> {
        self.channels
            .iter_mut()
            .find(|(channel_color, _channel)| *channel_color == color)
            .map(|(_color, channel)| channel)
    }
}

/// System status LED whose blink rate reflects the clock state.
pub struct Heartbeat {
    channel: LedChannel,
    clock: ClockState,
}

impl Heartbeat {
    /// Start blinking at the boot rate.
    #[must_use]
    pub fn start(pin: Arc<dyn OutputPin>) -> Self {
        let mut channel = LedChannel::new("status", pin);
        channel.blink(ClockState::Booting.heartbeat_hz());
        Self {
            channel,
            clock: ClockState::Booting,
        }
    }

    /// Switch to the rate of `clock`.
    pub fn set(&mut self, clock: ClockState) {
        if clock == self.clock {
            return;
        }
        log::debug!("Heartbeat {clock:?} at {} Hz", clock.heartbeat_hz());
        self.channel.blink(clock.heartbeat_hz());
        self.clock = clock;
    }

    /// Clock state currently shown.
    #[must_use]
    pub fn clock_state(&self) -> ClockState {
        self.clock
    }

    /// Output state of the status LED.
    #[must_use]
    pub fn led_state(&self) -> LedState {
        self.channel.state()
    }
}
