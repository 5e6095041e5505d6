//! Output pin backends selected by the `platform` setting.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use afval_core::{Color, OutputPin, PortError};
use linux_embedded_hal::SysfsPin;
use linux_embedded_hal::sysfs_gpio::{self, Direction};
use tokio::time::sleep;

use crate::config::{PinConfig, Platform};

const EXPORT_POLLS: u32 = 100;
const EXPORT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pin that only logs level changes.
pub(crate) struct ConsolePin {
    label: String,
    level: AtomicBool,
}

impl ConsolePin {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            level: AtomicBool::new(false),
        }
    }
}

impl OutputPin for ConsolePin {
    fn set_level(&self, high: bool) -> Result<(), PortError> {
        if self.level.swap(high, Ordering::Relaxed) != high {
            log::trace!("{} -> {}", self.label, u8::from(high));
        }
        Ok(())
    }

    fn level(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

/// GPIO line driven through the sysfs interface.
pub(crate) struct GpioPin {
    gpio: u32,
    pin: SysfsPin,
    level: AtomicBool,
}

impl GpioPin {
    /// Export `gpio` and configure it as an output, initially low.
    pub(crate) async fn export(gpio: u32) -> Result<Self, PortError> {
        let pin = SysfsPin::new(u64::from(gpio));
        pin.export().map_err(|err| pin_error(gpio, &err))?;

        let mut polls = 0;
        while !pin.is_exported() {
            polls += 1;
            if polls > EXPORT_POLLS {
                return Err(PortError::Pin(format!("gpio{gpio} did not appear after export")));
            }
            sleep(EXPORT_POLL_INTERVAL).await;
        }

        pin.set_direction(Direction::Out)
            .map_err(|err| pin_error(gpio, &err))?;

        let pin = Self {
            gpio,
            pin,
            level: AtomicBool::new(false),
        };
        pin.set_level(false)?;
        Ok(pin)
    }
}

impl OutputPin for GpioPin {
    fn set_level(&self, high: bool) -> Result<(), PortError> {
        self.pin
            .set_value(u8::from(high))
            .map_err(|err| pin_error(self.gpio, &err))?;
        self.level.store(high, Ordering::Relaxed);
        Ok(())
    }

    fn level(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

fn pin_error(gpio: u32, err: &sysfs_gpio::Error) -> PortError {
    PortError::Pin(format!("gpio{gpio}: {err}"))
}

/// Container channels plus the status LED.
pub(crate) struct Board {
    pub channels: Vec<(Color, Arc<dyn OutputPin>)>,
    pub status: Arc<dyn OutputPin>,
}

async fn open(
    platform: Platform,
    label: String,
    gpio: u32,
) -> Result<Arc<dyn OutputPin>, PortError> {
    let pin: Arc<dyn OutputPin> = match platform {
        Platform::Console => Arc::new(ConsolePin::new(label)),
        Platform::Sysfs => Arc::new(GpioPin::export(gpio).await?),
    };
    Ok(pin)
}

pub(crate) async fn board(platform: Platform, pins: &PinConfig) -> Result<Board, PortError> {
    let layout = [
        (Color::Gray, pins.gray),
        (Color::Green, pins.green),
        (Color::Blue, pins.blue),
        (Color::Orange, pins.orange),
        (Color::Red, pins.red),
    ];

    let mut channels = Vec::with_capacity(layout.len());
    for (color, gpio) in layout {
        channels.push((color, open(platform, color.to_string(), gpio).await?));
    }
    let status = open(platform, "STATUS".to_owned(), pins.status).await?;

    log::info!("{platform:?} pins ready");
    Ok(Board { channels, status })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_pin_toggles() {
        let pin = ConsolePin::new("GRAY");
        assert!(!pin.level());
        pin.toggle().expect("console pins never fail");
        assert!(pin.level());
        pin.toggle().expect("console pins never fail");
        assert!(!pin.level());
    }

    #[tokio::test]
    async fn console_board_wires_every_channel() {
        let board = board(Platform::Console, &PinConfig::default())
            .await
            .expect("console board");
        let colors: Vec<Color> = board.channels.iter().map(|(color, _pin)| *color).collect();
        assert_eq!(colors, Color::CHANNELS.to_vec());
        assert!(!board.status.level());
    }

    #[tokio::test]
    async fn missing_gpio_line_is_a_pin_error() {
        let result = GpioPin::export(99_999).await;
        assert!(matches!(result, Err(PortError::Pin(_))));
    }
}
