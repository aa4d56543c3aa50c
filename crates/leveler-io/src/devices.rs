//! Audio device enumeration.

use crate::{Error, Result};
use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};

/// Get a device's display name.
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// Whether `name` contains `search`, ignoring case.
pub(crate) fn name_matches(name: &str, search: &str) -> bool {
    name.to_lowercase().contains(&search.to_lowercase())
}

fn describe(device: &Device, is_input: bool, is_output: bool) -> Option<AudioDevice> {
    let name = device_name(device).ok()?;
    let config = if is_input {
        device.default_input_config()
    } else {
        device.default_output_config()
    };
    Some(AudioDevice {
        name,
        is_input,
        is_output,
        default_sample_rate: config.map_or(48000, |c| c.sample_rate()),
    })
}

/// List all devices of the default host.
///
/// A device that both captures and plays appears once, as an input with
/// `is_output` set.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices: Vec<AudioDevice> = Vec::new();

    for device in host.input_devices().into_iter().flatten() {
        let duplex = device.default_output_config().is_ok();
        devices.extend(describe(&device, true, duplex));
    }
    for device in host.output_devices().into_iter().flatten() {
        if let Some(output) = describe(&device, false, true)
            && !devices.iter().any(|d| d.name == output.name)
        {
            devices.push(output);
        }
    }

    tracing::debug!(count = devices.len(), "enumerated audio devices");
    Ok(devices)
}

/// Default capture and playback devices of the default host.
pub fn default_device() -> Result<(Option<AudioDevice>, Option<AudioDevice>)> {
    let host = cpal::default_host();
    let input = host
        .default_input_device()
        .and_then(|d| describe(&d, true, false));
    let output = host
        .default_output_device()
        .and_then(|d| describe(&d, false, true));
    Ok((input, output))
}

/// First device in `devices` whose name contains `search` (case-insensitive).
///
/// ```rust
/// use leveler_io::{AudioDevice, find_device_fuzzy};
///
/// let devices = vec![AudioDevice {
///     name: "USB Audio CODEC".into(),
///     is_input: true,
///     is_output: true,
///     default_sample_rate: 48000,
/// }];
/// assert!(find_device_fuzzy(&devices, "usb", true).is_ok());
/// ```
pub fn find_device_fuzzy<'a>(
    devices: &'a [AudioDevice],
    search: &str,
    is_input: bool,
) -> Result<&'a AudioDevice> {
    devices
        .iter()
        .filter(|d| if is_input { d.is_input } else { d.is_output })
        .find(|d| name_matches(&d.name, search))
        .ok_or_else(|| not_found(search, is_input))
}

pub(crate) fn not_found(search: &str, is_input: bool) -> Error {
    let role = if is_input { "input" } else { "output" };
    Error::DeviceNotFound(format!("no {role} device matching '{search}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, is_input: bool, is_output: bool) -> AudioDevice {
        AudioDevice {
            name: name.to_string(),
            is_input,
            is_output,
            default_sample_rate: 48000,
        }
    }

    #[test]
    fn fuzzy_match_respects_direction() {
        let devices = [
            device("Built-in Microphone", true, false),
            device("Built-in Output", false, true),
        ];
        assert_eq!(
            find_device_fuzzy(&devices, "built-in", false).map(|d| d.name.as_str()).ok(),
            Some("Built-in Output")
        );
        assert!(matches!(
            find_device_fuzzy(&devices, "microphone", false),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn names_match_ignoring_case() {
        assert!(name_matches("Scarlett 2i2 USB", "usb"));
        assert!(!name_matches("Built-in Output", "usb"));
    }

    #[test]
    fn list_devices_does_not_panic() {
        // Availability depends on the system
        let _ = list_devices();
        let _ = default_device();
    }
}
