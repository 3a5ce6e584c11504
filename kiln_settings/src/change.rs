// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Change notifications.

use kiln_formula::Value;

use crate::flags::SettingFlags;

/// State of a setting on one channel, as reported to listeners.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelState {
    /// The stored value.
    pub value: Value,
    /// Flags after the notification flush.
    pub flags: SettingFlags,
}

impl ChannelState {
    /// Returns `true` if the setting is active on this channel.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(SettingFlags::ENABLED)
    }
}

/// One setting changed during an operation.
///
/// Delivered once per setting per operation, however many channels or
/// recomputations were involved.
#[derive(Clone, Debug, PartialEq)]
pub struct SettingChange {
    /// The setting name.
    pub name: String,
    /// The single value consumers should use.
    pub resolved: Value,
    /// Per-channel state, in channel order.
    pub channels: Vec<ChannelState>,
}

/// Receives change notifications from a
/// [`SettingsEngine`](crate::SettingsEngine).
///
/// Closures taking `&SettingChange` implement this trait.
pub trait ChangeSink {
    /// Called once per changed setting at the end of an operation.
    fn setting_changed(&mut self, change: &SettingChange);
}

impl<F> ChangeSink for F
where
    F: FnMut(&SettingChange),
{
    fn setting_changed(&mut self, change: &SettingChange) {
        self(change);
    }
}
