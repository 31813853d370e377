//! Per-device constants and rules.
//!
//! The bridge talks to exactly three logical devices: two solenoid-valve
//! controllers (`sv1`, `sv2`) and one pump controller (`pump`). Each has a
//! fixed read-response shape, a fixed poll request, and its own rule for
//! deriving the control-source mode from a response byte. The first valve
//! additionally wires its middle coil bank in reverse order, see
//! [`CoilLayout::Packed`].

/// How a device's coil bank is laid out inside a frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilLayout {
    /// Coils are packed one bit each into a 4-byte little-endian integer.
    ///
    /// With `reversed_bank` set, the 9-coil window at positions 9..18 is
    /// reversed relative to the register bit order. The transform is its own
    /// inverse, so the same swap is applied on decode and encode.
    Packed { reversed_bank: bool },
    /// Each coil occupies one big-endian 16-bit register; the response
    /// carries the coil values in the low byte of each register.
    Registers,
}

/// How the control-source mode is derived from a response byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRule {
    /// `remote` when the byte equals the sentinel, `local` otherwise.
    RemoteIfEquals(u8),
    /// `local` when the byte is non-zero, `remote` otherwise.
    LocalIfNonZero,
}

/// Immutable per-device constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    /// Expected length of a status response frame.
    pub response_len: usize,
    /// Expected function-code byte of a status response.
    pub function_code: u8,
    /// Number of coils in this device's coil set.
    pub coil_count: usize,
    /// Payload layout of the coil bank.
    pub layout: CoilLayout,
    /// Offset of the mode discriminator byte in a status response.
    pub mode_offset: usize,
    /// Rule applied to the discriminator byte.
    pub mode_rule: ModeRule,
    /// Constant "read registers" request published on every poll tick.
    pub poll_frame: &'static [u8],
    /// Precomputed command frames: coil pattern -> frame per status flag
    /// (index 0 for status 0, index 1 for any non-zero status).
    pub canned: &'static [(&'static [u8], [&'static [u8]; 2])],
}

impl Profile {
    /// Looks up a precomputed command frame for the given coil pattern.
    pub fn canned_command(&self, coils: &[u8], status: u16) -> Option<&'static [u8]> {
        self.canned
            .iter()
            .find(|(pattern, _)| *pattern == coils)
            .map(|(_, frames)| frames[usize::from(status != 0)])
    }
}

// Read requests, fixed per device kind. Valves: read 3 holding registers at
// 0x000A. Pump: read 4 input registers at 0x0000.
const VALVE_POLL_FRAME: &[u8] = &[0x01, 0x03, 0x00, 0x0A, 0x00, 0x03, 0x25, 0xC9];
const PUMP_POLL_FRAME: &[u8] = &[0x01, 0x04, 0x00, 0x00, 0x00, 0x04, 0xF1, 0xC9];

// Write-single-register frames for the common single-pump commands. The
// register index selects the pump, the register value carries the status flag.
const PUMP1_STATUS0: &[u8] = &[0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x89, 0xCA];
const PUMP1_STATUS1: &[u8] = &[0x01, 0x06, 0x00, 0x00, 0x00, 0x01, 0x48, 0x0A];
const PUMP2_STATUS0: &[u8] = &[0x01, 0x06, 0x00, 0x01, 0x00, 0x00, 0xD8, 0x0A];
const PUMP2_STATUS1: &[u8] = &[0x01, 0x06, 0x00, 0x01, 0x00, 0x01, 0x19, 0xCA];

const PUMP_CANNED: &[(&[u8], [&[u8]; 2])] = &[
    (&[1, 0], [PUMP1_STATUS0, PUMP1_STATUS1]),
    (&[0, 1], [PUMP2_STATUS0, PUMP2_STATUS1]),
];

const SV1_PROFILE: Profile = Profile {
    response_len: 11,
    function_code: 0x03,
    coil_count: 27,
    layout: CoilLayout::Packed {
        reversed_bank: true,
    },
    mode_offset: 7,
    mode_rule: ModeRule::RemoteIfEquals(4),
    poll_frame: VALVE_POLL_FRAME,
    canned: &[],
};

const SV2_PROFILE: Profile = Profile {
    response_len: 11,
    function_code: 0x03,
    coil_count: 27,
    layout: CoilLayout::Packed {
        reversed_bank: false,
    },
    mode_offset: 7,
    mode_rule: ModeRule::RemoteIfEquals(4),
    poll_frame: VALVE_POLL_FRAME,
    canned: &[],
};

const PUMP_PROFILE: Profile = Profile {
    response_len: 13,
    function_code: 0x04,
    coil_count: 2,
    layout: CoilLayout::Registers,
    mode_offset: 10,
    mode_rule: ModeRule::LocalIfNonZero,
    poll_frame: PUMP_POLL_FRAME,
    canned: PUMP_CANNED,
};

/// One of the three bridged devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Device {
    Sv1,
    Sv2,
    Pump,
}

impl Device {
    /// All bridged devices, in poll order.
    pub const ALL: [Device; 3] = [Device::Sv1, Device::Sv2, Device::Pump];

    /// Stable identifier used in the HTTP API and push events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Sv1 => "sv1",
            Device::Sv2 => "sv2",
            Device::Pump => "pump",
        }
    }

    /// Resolves an API identifier (`sv1`, `sv2`, `pump`).
    pub fn from_tab(tab: &str) -> Option<Device> {
        match tab {
            "sv1" => Some(Device::Sv1),
            "sv2" => Some(Device::Sv2),
            "pump" => Some(Device::Pump),
            _ => None,
        }
    }

    pub fn profile(&self) -> &'static Profile {
        match self {
            Device::Sv1 => &SV1_PROFILE,
            Device::Sv2 => &SV2_PROFILE,
            Device::Pump => &PUMP_PROFILE,
        }
    }

    /// Topic the device publishes status frames on (subscribed).
    pub fn status_topic(&self) -> &'static str {
        match self {
            Device::Sv1 => "DZZ-SV1/Post",
            Device::Sv2 => "DZZ-SV2/Post",
            Device::Pump => "/DZZ-PUMP/Post",
        }
    }

    /// Topic the bridge publishes poll requests and commands on.
    pub fn request_topic(&self) -> &'static str {
        match self {
            Device::Sv1 => "DZZ-SV1/Get",
            Device::Sv2 => "DZZ-SV2/Get",
            Device::Pump => "/DZZ-PUMP/Get",
        }
    }

    /// Reverse topic lookup for inbound message routing.
    pub fn for_status_topic(topic: &str) -> Option<Device> {
        Device::ALL
            .into_iter()
            .find(|device| device.status_topic() == topic)
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
