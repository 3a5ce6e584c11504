// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-value state bits.

bitflags::bitflags! {
    /// State of one setting on one channel.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SettingFlags: u8 {
        /// The `enabled` formula currently evaluates truthy.
        const ENABLED     = 0b0000_0001;
        /// Set explicitly by a user or profile; propagation leaves the
        /// value alone until it is unset.
        const CHANGED     = 0b0000_0010;
        /// A formula failed, the setting sits on a rejected cycle, or the
        /// channels disagree with nothing to reconcile them.
        const INVALID     = 0b0000_0100;
        /// Changed since the last notification flush.
        const MUST_NOTIFY = 0b0000_1000;
    }
}

impl Default for SettingFlags {
    fn default() -> Self {
        Self::ENABLED
    }
}
