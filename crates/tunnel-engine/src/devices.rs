use crate::config::DeviceSelector;
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub is_input: bool,
    pub is_output: bool,
    pub is_default_input: bool,
    pub is_default_output: bool,
}

/// Every device the host reports, with direction support and default marks.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_in = host.default_input_device().map(|d| device_name(&d));
    let default_out = host.default_output_device().map(|d| device_name(&d));
    let devices = host.devices().map_err(|e| Error::Device(e.to_string()))?;

    Ok(devices
        .map(|dev| {
            let caps = (supports(&dev, Direction::Input), supports(&dev, Direction::Output));
            describe(device_name(&dev), caps, (default_in.as_deref(), default_out.as_deref()))
        })
        .collect())
}

fn describe(name: String, caps: (bool, bool), defaults: (Option<&str>, Option<&str>)) -> DeviceInfo {
    DeviceInfo {
        is_input: caps.0,
        is_output: caps.1,
        is_default_input: defaults.0 == Some(name.as_str()),
        is_default_output: defaults.1 == Some(name.as_str()),
        name,
    }
}

fn device_name(dev: &cpal::Device) -> String {
    dev.name().unwrap_or_else(|_| "<unknown>".to_string())
}

/// `(index, name)` of every capture-capable device. The index is what
/// [`DeviceSelector::Index`] refers to.
pub fn list_input_devices() -> Result<Vec<(usize, String)>> {
    indexed_names(Direction::Input)
}

/// `(index, name)` of every playback-capable device.
pub fn list_output_devices() -> Result<Vec<(usize, String)>> {
    indexed_names(Direction::Output)
}

fn indexed_names(dir: Direction) -> Result<Vec<(usize, String)>> {
    let host = cpal::default_host();
    Ok(capable_devices(&host, dir)?
        .iter()
        .enumerate()
        .map(|(i, d)| (i, device_name(d)))
        .collect())
}

fn supports(dev: &cpal::Device, dir: Direction) -> bool {
    let any = match dir {
        Direction::Input => dev.supported_input_configs().map(|mut c| c.next().is_some()),
        Direction::Output => dev.supported_output_configs().map(|mut c| c.next().is_some()),
    };
    any.unwrap_or(false)
}

fn capable_devices(host: &cpal::Host, dir: Direction) -> Result<Vec<cpal::Device>> {
    let devices = host.devices().map_err(|e| Error::Device(e.to_string()))?;
    Ok(devices.filter(|d| supports(d, dir)).collect())
}

/* ---------- device picking (by index or name) ---------- */

/// Resolve a selector to a device: explicit index first, then substring
/// match, then the host default.
pub(crate) fn pick_device(
    host: &cpal::Host,
    dir: Direction,
    selector: Option<&DeviceSelector>,
) -> Result<cpal::Device> {
    let candidates = capable_devices(host, dir)?;

    match selector {
        Some(DeviceSelector::Index(idx)) => {
            if let Some(dev) = candidates.into_iter().nth(*idx) {
                return Ok(dev);
            }
            tracing::warn!(index = idx, ?dir, "no device at index, using default");
        }
        Some(DeviceSelector::Name(q)) => {
            let qn = q.to_lowercase();
            let found = candidates
                .into_iter()
                .find(|d| d.name().map(|n| n.to_lowercase().contains(&qn)).unwrap_or(false));
            if let Some(dev) = found {
                return Ok(dev);
            }
            tracing::warn!(name = %q, ?dir, "no device matched, using default");
        }
        None => {}
    }

    let default = match dir {
        Direction::Input => host.default_input_device(),
        Direction::Output => host.default_output_device(),
    };
    default.ok_or_else(|| {
        let wanted = match selector {
            Some(s) => format!("{s:?}"),
            None => "default".to_string(),
        };
        Error::DeviceNotFound(format!("{dir:?} device {wanted} (and no default available)"))
    })
}
