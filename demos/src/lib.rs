// Copyright 2025 the Kiln Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared pieces for the Kiln demos: a small printer schema and logging
//! setup.

use tracing_subscriber::EnvFilter;

/// Base schema shared by every printer: a handful of real-world settings
/// with formulas, enabled conditions and per-extruder values.
pub const BASE_SCHEMA: &str = r#"{
  "settings": {
    "resolution": {
      "type": "category",
      "label": "Quality",
      "children": {
        "layer_height": {
          "type": "float", "unit": "mm", "default_value": 0.1,
          "minimum_value": "0.001", "maximum_value_warning": "0.8 * machine_nozzle_size"
        },
        "layer_height_0": {
          "type": "float", "unit": "mm", "default_value": 0.3,
          "value": "resolveOrValue('layer_height') * 1.5"
        },
        "line_width": {
          "type": "float", "unit": "mm", "default_value": 0.4,
          "value": "machine_nozzle_size", "settable_per_extruder": true
        }
      }
    },
    "machine": {
      "type": "category",
      "children": {
        "machine_nozzle_size": {
          "type": "float", "default_value": 0.4, "settable_per_extruder": true
        }
      }
    },
    "infill": {
      "type": "category",
      "children": {
        "infill_sparse_density": {
          "type": "float", "unit": "%", "default_value": 20,
          "settable_per_mesh": true, "minimum_value": "0", "maximum_value": "100"
        },
        "infill_pattern": {
          "type": "enum", "default_value": "grid",
          "options": { "grid": "Grid", "lines": "Lines", "gyroid": "Gyroid" },
          "value": "'lines' if infill_sparse_density > 25 else 'grid'",
          "enabled": "infill_sparse_density > 0", "settable_per_mesh": true
        },
        "infill_line_distance": {
          "type": "float", "unit": "mm", "default_value": 2,
          "value": "0 if infill_sparse_density == 0 else line_width * 100 / infill_sparse_density * (2 if infill_pattern == 'grid' else 1)",
          "settable_per_mesh": true
        }
      }
    },
    "material": {
      "type": "category",
      "children": {
        "material_print_temperature": {
          "type": "float", "unit": "C", "default_value": 200,
          "settable_per_extruder": true,
          "minimum_value_warning": "150", "maximum_value_warning": "260"
        },
        "build_volume_temperature": {
          "type": "float", "unit": "C", "default_value": 28,
          "resolve": "max(extruderValues('material_print_temperature')) / 8"
        }
      }
    },
    "support": {
      "type": "category",
      "children": {
        "support_enable": { "type": "bool", "default_value": false },
        "support_extruder_nr": {
          "type": "extruder", "default_value": "0", "enabled": "support_enable"
        },
        "support_angle": {
          "type": "float", "unit": "deg", "default_value": 50,
          "enabled": "support_enable", "settable_per_extruder": true,
          "limit_to_extruder": "support_extruder_nr"
        }
      }
    }
  }
}"#;

/// A printer document layered over [`BASE_SCHEMA`]: overrides a default,
/// and deletes the upper temperature warning with `null`.
pub const PRINTER_SCHEMA: &str = r#"{
  "overrides": {
    "layer_height": { "default_value": 0.15 },
    "machine_nozzle_size": { "default_value": 0.6 },
    "material_print_temperature": { "maximum_value_warning": null }
  }
}"#;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, defaulting to
/// `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
