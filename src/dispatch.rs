//! Inbound status handling.
//!
//! One entry point ties the codec, the cache and the auto-correction rule
//! together so the transport layer only has to route topics and publish
//! whatever frame comes back.

use crate::cache::StateCache;
use crate::command;
use crate::error::Result;
use crate::profile::Device;
use crate::protocol::{self, Mode, Reading};

/// Decodes a status frame and stores it in the cache.
///
/// Returns the stored reading plus, for the pump in local mode, the
/// remote-override frame the caller must publish after the correction delay.
/// An override that fails to build is suppressed, not an error. On a decode
/// failure the cache is left untouched.
pub fn apply_status(
    cache: &StateCache,
    device: Device,
    payload: &[u8],
) -> Result<(Reading, Option<Vec<u8>>)> {
    let reading = protocol::parse(payload, device.profile())?;

    let correction = if device == Device::Pump && reading.mode == Mode::Local {
        command::build_override(device, &reading.coils).ok()
    } else {
        None
    };

    cache.update(device, reading.clone());
    Ok((reading, correction))
}
