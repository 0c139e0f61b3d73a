//! Arity-based channel names.
//!
//! A node with a single port in one direction gets the bare name; with more
//! than one, every port gets a 1-based suffix following declaration order.

use flowcore::{PortDirection, PortSlot};

pub const OUTPUT_CHANNEL: &str = "outputChannel";
pub const INPUT_CHANNEL: &str = "inputChannel";

pub fn channel_base(direction: PortDirection) -> &'static str {
    match direction {
        PortDirection::Input => INPUT_CHANNEL,
        PortDirection::Output => OUTPUT_CHANNEL,
    }
}

/// Name of the channel for the port at zero-based `index` among `count`
/// ports of the same direction.
pub fn channel_name(direction: PortDirection, index: usize, count: usize) -> String {
    let base = channel_base(direction);
    if count <= 1 {
        base.to_string()
    } else {
        format!("{}{}", base, index + 1)
    }
}

pub fn slot_channel(slot: &PortSlot) -> String {
    channel_name(slot.direction, slot.index, slot.count)
}
