//! Linux sysfs-backed feedback surface.
//!
//! * LEDs: LED class devices, `<dir>/brightness` (written with the device's
//!   `max_brightness` or `0`).
//! * Buzzer: a PWM channel, `<dir>/{period,duty_cycle,enable}` in ns.
//! * Display: the `message` attribute of a line display (auxdisplay driver).

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::HardwareConfig;

use super::{ButtonId, HardwareError, Note, Surface};

/// Number of characters the front display can show at once.
pub const DISPLAY_WIDTH: usize = 4;

/// Feedback surface writing sysfs attributes.
#[derive(Debug)]
pub struct SysfsSurface {
    leds: [LedNode; 3],
    pwm: PathBuf,
    display: PathBuf,
}

#[derive(Debug)]
struct LedNode {
    brightness: PathBuf,
    max: String,
}

impl SysfsSurface {
    /// Verify every attribute exists and build the surface.
    ///
    /// # Errors
    ///
    /// [`HardwareError::Unavailable`] naming the first missing attribute.
    pub fn probe(config: &HardwareConfig) -> Result<Self, HardwareError> {
        let leds = [
            LedNode::probe(&config.led_a)?,
            LedNode::probe(&config.led_b)?,
            LedNode::probe(&config.led_c)?,
        ];

        for attr in ["period", "duty_cycle", "enable"] {
            require(&config.buzzer_pwm.join(attr))?;
        }
        require(&config.display_message)?;

        Ok(Self {
            leds,
            pwm: config.buzzer_pwm.clone(),
            display: config.display_message.clone(),
        })
    }
}

impl LedNode {
    fn probe(dir: &Path) -> Result<Self, HardwareError> {
        let brightness = dir.join("brightness");
        require(&brightness)?;
        let max = fs::read_to_string(dir.join("max_brightness"))
            .map(|s| s.trim().to_string())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "1".to_string());
        Ok(Self { brightness, max })
    }
}

fn require(path: &Path) -> Result<(), HardwareError> {
    if path.exists() {
        Ok(())
    } else {
        Err(HardwareError::Unavailable(path.display().to_string()))
    }
}

fn write_attr(path: &Path, value: &str, resource: &'static str) -> Result<(), HardwareError> {
    fs::write(path, value).map_err(|source| HardwareError::Io { resource, source })
}

impl Surface for SysfsSurface {
    fn name(&self) -> &'static str {
        "sysfs"
    }

    fn show_text(&self, text: &str) -> Result<(), HardwareError> {
        let shown: String = text.chars().take(DISPLAY_WIDTH).collect();
        write_attr(&self.display, &shown, "display")
    }

    fn clear_display(&self) -> Result<(), HardwareError> {
        write_attr(&self.display, "\n", "display")
    }

    fn set_led(&self, led: ButtonId, on: bool) -> Result<(), HardwareError> {
        let node = &self.leds[led.index()];
        let value = if on { node.max.as_str() } else { "0" };
        write_attr(&node.brightness, value, "led")
    }

    fn tone_on(&self, note: Note) -> Result<(), HardwareError> {
        let period_ns = (1e9 / note.frequency_hz()).round() as u64;
        // duty_cycle must never exceed period, so zero it before changing period.
        write_attr(&self.pwm.join("duty_cycle"), "0", "buzzer")?;
        write_attr(&self.pwm.join("period"), &period_ns.to_string(), "buzzer")?;
        write_attr(
            &self.pwm.join("duty_cycle"),
            &(period_ns / 2).to_string(),
            "buzzer",
        )?;
        write_attr(&self.pwm.join("enable"), "1", "buzzer")
    }

    fn tone_off(&self) -> Result<(), HardwareError> {
        write_attr(&self.pwm.join("enable"), "0", "buzzer")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Lay out a fake sysfs tree and return a config pointing into it.
    fn fake_tree() -> (TempDir, HardwareConfig) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        for name in ["a", "b", "c"] {
            let led = root.join(format!("led-{name}"));
            fs::create_dir_all(&led).unwrap();
            fs::write(led.join("brightness"), "0").unwrap();
            fs::write(led.join("max_brightness"), "255\n").unwrap();
        }
        let pwm = root.join("pwm1");
        fs::create_dir_all(&pwm).unwrap();
        for attr in ["period", "duty_cycle", "enable"] {
            fs::write(pwm.join(attr), "0").unwrap();
        }
        fs::write(root.join("message"), "").unwrap();

        let config = HardwareConfig {
            led_a: root.join("led-a"),
            led_b: root.join("led-b"),
            led_c: root.join("led-c"),
            buzzer_pwm: pwm,
            display_message: root.join("message"),
            ..HardwareConfig::default()
        };
        (dir, config)
    }

    #[test]
    fn probe_succeeds_on_complete_tree() {
        let (_dir, config) = fake_tree();
        assert!(SysfsSurface::probe(&config).is_ok());
    }

    #[test]
    fn probe_reports_missing_display() {
        let (_dir, mut config) = fake_tree();
        config.display_message = config.display_message.with_file_name("gone");
        let err = SysfsSurface::probe(&config).unwrap_err();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn led_uses_max_brightness() {
        let (_dir, config) = fake_tree();
        let surface = SysfsSurface::probe(&config).unwrap();

        surface.set_led(ButtonId::B, true).unwrap();
        let on = fs::read_to_string(config.led_b.join("brightness")).unwrap();
        assert_eq!(on, "255");

        surface.set_led(ButtonId::B, false).unwrap();
        let off = fs::read_to_string(config.led_b.join("brightness")).unwrap();
        assert_eq!(off, "0");
    }

    #[test]
    fn display_truncates_to_four_chars() {
        let (_dir, config) = fake_tree();
        let surface = SysfsSurface::probe(&config).unwrap();
        surface.show_text("DOLPHIN").unwrap();
        assert_eq!(fs::read_to_string(&config.display_message).unwrap(), "DOLP");
    }

    #[test]
    fn tone_programs_half_duty_cycle() {
        let (_dir, config) = fake_tree();
        let surface = SysfsSurface::probe(&config).unwrap();
        surface.tone_on(Note::A4).unwrap();

        let period: u64 = fs::read_to_string(config.buzzer_pwm.join("period"))
            .unwrap()
            .parse()
            .unwrap();
        let duty: u64 = fs::read_to_string(config.buzzer_pwm.join("duty_cycle"))
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(period, 2_272_727);
        assert_eq!(duty, period / 2);
        assert_eq!(
            fs::read_to_string(config.buzzer_pwm.join("enable")).unwrap(),
            "1"
        );

        surface.tone_off().unwrap();
        assert_eq!(
            fs::read_to_string(config.buzzer_pwm.join("enable")).unwrap(),
            "0"
        );
    }
}
