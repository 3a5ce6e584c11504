// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-channel value storage.
//!
//! This module provides [`ValueStore`], a dense table holding one value and
//! one [`SettingFlags`] set per (channel, setting).
//!
//! # Implementation
//!
//! Each channel is a `Vec` indexed by [`SettingId`], so every lookup is a
//! pair of slice indexes. Channels live in a `SmallVec`: most machines have
//! one or two, and those stay inline.
//!
//! All mutators compare before writing and report whether anything actually
//! changed, which is what keeps change notifications free of noise.

use kiln_definition::SettingId;
use kiln_formula::Value;
use smallvec::SmallVec;

use crate::flags::SettingFlags;

/// Number of channels stored without a heap allocation for the channel list.
const INLINE_CHANNELS: usize = 2;

#[derive(Clone, Debug, Default, PartialEq)]
struct Entry {
    value: Value,
    flags: SettingFlags,
}

/// Values and flags for every setting on every channel.
///
/// Channel 0 always exists. Out-of-range channels or ids read as absent and
/// ignore writes.
///
/// # Example
///
/// ```rust
/// use kiln_definition::SettingId;
/// use kiln_formula::Value;
/// use kiln_settings::{SettingFlags, ValueStore};
///
/// let speed = SettingId::from_index(0).unwrap();
/// let mut store = ValueStore::new(1);
///
/// assert!(store.set(0, speed, Value::Float(50.0)));
/// // Structurally equal writes are not changes.
/// assert!(!store.set(0, speed, Value::Int(50)));
///
/// let copy = store.clone_channel(0).unwrap();
/// assert_eq!(copy, 1);
/// assert!(store.equal_on_all_channels(speed));
///
/// assert!(store.set_flag(1, speed, SettingFlags::CHANGED));
/// assert!(!store.set_flag(1, speed, SettingFlags::CHANGED));
/// ```
#[derive(Clone, Debug)]
pub struct ValueStore {
    channels: SmallVec<[Vec<Entry>; INLINE_CHANNELS]>,
    len: usize,
}

impl ValueStore {
    /// Creates a store with one channel of `len` settings, all `None` and
    /// enabled.
    #[must_use]
    pub fn new(len: usize) -> Self {
        let mut channels = SmallVec::new();
        channels.push(vec![Entry::default(); len]);
        Self { channels, len }
    }

    /// Number of channels.
    #[must_use]
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of settings per channel.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the store holds no settings.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn entry(&self, channel: usize, id: SettingId) -> Option<&Entry> {
        self.channels.get(channel)?.get(id.as_usize())
    }

    fn entry_mut(&mut self, channel: usize, id: SettingId) -> Option<&mut Entry> {
        self.channels.get_mut(channel)?.get_mut(id.as_usize())
    }

    /// The value of `id` on `channel`.
    #[must_use]
    pub fn value(&self, channel: usize, id: SettingId) -> Option<&Value> {
        self.entry(channel, id).map(|e| &e.value)
    }

    /// The flags of `id` on `channel`; empty when out of range.
    #[must_use]
    pub fn flags(&self, channel: usize, id: SettingId) -> SettingFlags {
        self.entry(channel, id)
            .map_or(SettingFlags::empty(), |e| e.flags)
    }

    /// Values of `id` on every channel, in channel order.
    pub fn channel_values(&self, id: SettingId) -> impl Iterator<Item = &Value> + '_ {
        self.channels
            .iter()
            .filter_map(move |channel| channel.get(id.as_usize()))
            .map(|e| &e.value)
    }

    /// Stores `value`. Returns `true` if it differs structurally from the
    /// previous value; equal values leave the stored one in place.
    pub fn set(&mut self, channel: usize, id: SettingId, value: Value) -> bool {
        let Some(entry) = self.entry_mut(channel, id) else {
            return false;
        };
        if entry.value == value {
            return false;
        }
        entry.value = value;
        true
    }

    /// Sets `flag`. Returns `true` if it was not already set.
    pub fn set_flag(&mut self, channel: usize, id: SettingId, flag: SettingFlags) -> bool {
        let Some(entry) = self.entry_mut(channel, id) else {
            return false;
        };
        let changed = !entry.flags.contains(flag);
        entry.flags.insert(flag);
        changed
    }

    /// Clears `flag`. Returns `true` if any of its bits were set.
    pub fn clear_flag(&mut self, channel: usize, id: SettingId, flag: SettingFlags) -> bool {
        let Some(entry) = self.entry_mut(channel, id) else {
            return false;
        };
        let changed = entry.flags.intersects(flag);
        entry.flags.remove(flag);
        changed
    }

    /// Sets or clears `flag` according to `on`. Returns `true` on change.
    pub fn assign_flag(
        &mut self,
        channel: usize,
        id: SettingId,
        flag: SettingFlags,
        on: bool,
    ) -> bool {
        if on {
            self.set_flag(channel, id, flag)
        } else {
            self.clear_flag(channel, id, flag)
        }
    }

    /// Returns `true` if every channel holds a value structurally equal to
    /// channel 0's.
    #[must_use]
    pub fn equal_on_all_channels(&self, id: SettingId) -> bool {
        let mut values = self.channel_values(id);
        let Some(first) = values.next() else {
            return true;
        };
        values.all(|v| v == first)
    }

    /// Appends a copy of channel `from` and returns the new channel's index.
    ///
    /// Returns `None` if `from` does not exist.
    pub fn clone_channel(&mut self, from: usize) -> Option<usize> {
        let copy = self.channels.get(from)?.clone();
        self.channels.push(copy);
        Some(self.channels.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(index: usize) -> SettingId {
        SettingId::from_index(index).unwrap()
    }

    #[test]
    fn set_uses_structural_equality() {
        let mut store = ValueStore::new(2);
        let list = || Value::List(vec![Value::Int(1), Value::from("a")]);
        assert!(store.set(0, id(0), list()));
        assert!(!store.set(0, id(0), list()));
        assert!(store.set(0, id(0), Value::List(vec![Value::Int(2)])));
    }

    #[test]
    fn out_of_range_is_inert() {
        let mut store = ValueStore::new(1);
        assert!(!store.set(3, id(0), Value::Int(1)));
        assert!(!store.set(0, id(7), Value::Int(1)));
        assert!(store.value(3, id(0)).is_none());
        assert_eq!(store.flags(0, id(7)), SettingFlags::empty());
        assert!(store.clone_channel(5).is_none());
    }

    #[test]
    fn flags_report_changes() {
        let mut store = ValueStore::new(1);
        assert_eq!(store.flags(0, id(0)), SettingFlags::ENABLED);
        assert!(store.set_flag(0, id(0), SettingFlags::MUST_NOTIFY));
        assert!(store.clear_flag(0, id(0), SettingFlags::MUST_NOTIFY | SettingFlags::INVALID));
        assert!(!store.clear_flag(0, id(0), SettingFlags::INVALID));
        assert!(!store.assign_flag(0, id(0), SettingFlags::ENABLED, true));
        assert!(store.assign_flag(0, id(0), SettingFlags::ENABLED, false));
    }

    #[test]
    fn channels_diverge_after_cloning() {
        let mut store = ValueStore::new(1);
        store.set(0, id(0), Value::Int(1));
        assert_eq!(store.clone_channel(0), Some(1));
        assert_eq!(store.channel_count(), 2);
        assert!(store.equal_on_all_channels(id(0)));
        store.set(1, id(0), Value::Int(2));
        assert!(!store.equal_on_all_channels(id(0)));
        assert_eq!(
            store.channel_values(id(0)).collect::<Vec<_>>(),
            [&Value::Int(1), &Value::Int(2)]
        );
    }
}
