// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-type counts of what a build emitted and skipped.

use std::collections::BTreeMap;

use kiln_definition::SettingType;
use serde::Serialize;

/// How one setting value was treated by a build.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Emitted: differs from the default.
    Changed,
    /// Skipped: disabled on that channel.
    Inactive,
    /// Skipped: equal to the default.
    Default,
}

/// Counts for one setting type.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TypeStats {
    /// Values emitted.
    pub changed: usize,
    /// Values skipped because the setting was disabled.
    pub inactive: usize,
    /// Values skipped because they equal the default.
    pub default: usize,
}

impl TypeStats {
    /// All values seen.
    #[must_use]
    pub fn total(&self) -> usize {
        self.changed + self.inactive + self.default
    }

    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Changed => self.changed += 1,
            Disposition::Inactive => self.inactive += 1,
            Disposition::Default => self.default += 1,
        }
    }
}

/// Build statistics keyed by setting type. Global values count once,
/// per-channel values once per channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    by_type: BTreeMap<SettingType, TypeStats>,
}

impl BuildStats {
    pub(crate) fn record(&mut self, setting_type: SettingType, disposition: Disposition) {
        self.by_type.entry(setting_type).or_default().record(disposition);
    }

    /// Counts for `setting_type`; zero if none were seen.
    #[must_use]
    pub fn get(&self, setting_type: SettingType) -> TypeStats {
        self.by_type.get(&setting_type).copied().unwrap_or_default()
    }

    /// Types seen, in declaration order of [`SettingType`].
    pub fn iter(&self) -> impl Iterator<Item = (SettingType, TypeStats)> + '_ {
        self.by_type.iter().map(|(&setting_type, &stats)| (setting_type, stats))
    }

    /// Sum over all types.
    #[must_use]
    pub fn totals(&self) -> TypeStats {
        self.by_type.values().fold(TypeStats::default(), |sum, stats| TypeStats {
            changed: sum.changed + stats.changed,
            inactive: sum.inactive + stats.inactive,
            default: sum.default + stats.default,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate_per_type() {
        let mut stats = BuildStats::default();
        stats.record(SettingType::Float, Disposition::Changed);
        stats.record(SettingType::Float, Disposition::Default);
        stats.record(SettingType::Bool, Disposition::Inactive);

        assert_eq!(
            stats.get(SettingType::Float),
            TypeStats {
                changed: 1,
                inactive: 0,
                default: 1,
            }
        );
        assert_eq!(stats.get(SettingType::Enum), TypeStats::default());
        assert_eq!(stats.totals().total(), 3);
        let types: Vec<_> = stats.iter().map(|(setting_type, _)| setting_type).collect();
        assert_eq!(types, [SettingType::Float, SettingType::Bool]);
    }
}
