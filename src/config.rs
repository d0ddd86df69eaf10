use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the packer splits an ordered item list into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "usize", into = "usize")]
pub enum ColumnPolicy {
    /// First-fit-decreasing-height against `max_row_width`.
    Auto,
    SingleColumn,
    /// N items per row, in order.
    Fixed(usize),
}

impl From<usize> for ColumnPolicy {
    fn from(value: usize) -> Self {
        match value {
            0 => ColumnPolicy::Auto,
            1 => ColumnPolicy::SingleColumn,
            n => ColumnPolicy::Fixed(n),
        }
    }
}

impl From<ColumnPolicy> for usize {
    fn from(value: ColumnPolicy) -> Self {
        match value {
            ColumnPolicy::Auto => 0,
            ColumnPolicy::SingleColumn => 1,
            ColumnPolicy::Fixed(n) => n,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub horizontal_gap: f32,
    pub vertical_gap: f32,
    pub group_padding: f32,
    pub title_height: f32,
    pub origin_x: f32,
    pub origin_y: f32,
    pub max_iterations: usize,
    pub column_policy: ColumnPolicy,
    pub max_row_width: f32,
    pub collapse_reroutes: bool,
    pub margin_gap: f32,
    pub overlap_gap: f32,
    pub default_width: f32,
    pub default_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_gap: 60.0,
            vertical_gap: 30.0,
            group_padding: 20.0,
            title_height: 34.0,
            origin_x: 50.0,
            origin_y: 50.0,
            max_iterations: 24,
            column_policy: ColumnPolicy::SingleColumn,
            max_row_width: 1200.0,
            collapse_reroutes: true,
            margin_gap: 80.0,
            overlap_gap: 20.0,
            default_width: 200.0,
            default_height: 100.0,
        }
    }
}

/// Partial configuration: every field is optional and only set fields
/// override the base config.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutOverrides {
    pub horizontal_gap: Option<f32>,
    pub vertical_gap: Option<f32>,
    pub group_padding: Option<f32>,
    pub title_height: Option<f32>,
    pub origin_x: Option<f32>,
    pub origin_y: Option<f32>,
    pub max_iterations: Option<usize>,
    pub column_policy: Option<ColumnPolicy>,
    pub max_row_width: Option<f32>,
    pub collapse_reroutes: Option<bool>,
    pub margin_gap: Option<f32>,
    pub overlap_gap: Option<f32>,
    pub default_width: Option<f32>,
    pub default_height: Option<f32>,
}

impl LayoutConfig {
    pub fn apply(&mut self, overrides: &LayoutOverrides) {
        if let Some(v) = overrides.horizontal_gap {
            self.horizontal_gap = v;
        }
        if let Some(v) = overrides.vertical_gap {
            self.vertical_gap = v;
        }
        if let Some(v) = overrides.group_padding {
            self.group_padding = v;
        }
        if let Some(v) = overrides.title_height {
            self.title_height = v;
        }
        if let Some(v) = overrides.origin_x {
            self.origin_x = v;
        }
        if let Some(v) = overrides.origin_y {
            self.origin_y = v;
        }
        if let Some(v) = overrides.max_iterations {
            self.max_iterations = v;
        }
        if let Some(v) = overrides.column_policy {
            self.column_policy = v;
        }
        if let Some(v) = overrides.max_row_width {
            self.max_row_width = v;
        }
        if let Some(v) = overrides.collapse_reroutes {
            self.collapse_reroutes = v;
        }
        if let Some(v) = overrides.margin_gap {
            self.margin_gap = v;
        }
        if let Some(v) = overrides.overlap_gap {
            self.overlap_gap = v;
        }
        if let Some(v) = overrides.default_width {
            self.default_width = v;
        }
        if let Some(v) = overrides.default_height {
            self.default_height = v;
        }
        self.sanitize();
    }

    pub fn with_overrides(overrides: &LayoutOverrides) -> Self {
        let mut config = Self::default();
        config.apply(overrides);
        config
    }

    /// Clamps values that would produce non-finite or negative geometry.
    fn sanitize(&mut self) {
        let defaults = Self::default();
        let non_negative = |value: f32, fallback: f32| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                fallback
            }
        };
        self.horizontal_gap = non_negative(self.horizontal_gap, defaults.horizontal_gap);
        self.vertical_gap = non_negative(self.vertical_gap, defaults.vertical_gap);
        self.group_padding = non_negative(self.group_padding, defaults.group_padding);
        self.title_height = non_negative(self.title_height, defaults.title_height);
        self.margin_gap = non_negative(self.margin_gap, defaults.margin_gap);
        self.overlap_gap = non_negative(self.overlap_gap, defaults.overlap_gap);
        if !self.origin_x.is_finite() {
            self.origin_x = defaults.origin_x;
        }
        if !self.origin_y.is_finite() {
            self.origin_y = defaults.origin_y;
        }
        if !self.max_row_width.is_finite() || self.max_row_width <= 0.0 {
            self.max_row_width = defaults.max_row_width;
        }
        if !self.default_width.is_finite() || self.default_width <= 0.0 {
            self.default_width = defaults.default_width;
        }
        if !self.default_height.is_finite() || self.default_height <= 0.0 {
            self.default_height = defaults.default_height;
        }
    }
}

pub fn load_config(path: Option<&Path>) -> crate::error::Result<LayoutConfig> {
    let mut config = LayoutConfig::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: LayoutOverrides = serde_json::from_str(&contents)?;
    config.apply(&parsed);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_policy_round_trips_through_numeric_code() {
        assert_eq!(ColumnPolicy::from(0), ColumnPolicy::Auto);
        assert_eq!(ColumnPolicy::from(1), ColumnPolicy::SingleColumn);
        assert_eq!(ColumnPolicy::from(4), ColumnPolicy::Fixed(4));
        let encoded = serde_json::to_string(&ColumnPolicy::Fixed(3)).unwrap();
        assert_eq!(encoded, "3");
    }

    #[test]
    fn overrides_only_touch_set_fields() {
        let overrides: LayoutOverrides =
            serde_json::from_str(r#"{"horizontalGap": 12, "columnPolicy": 0}"#).unwrap();
        let config = LayoutConfig::with_overrides(&overrides);
        assert_eq!(config.horizontal_gap, 12.0);
        assert_eq!(config.column_policy, ColumnPolicy::Auto);
        assert_eq!(config.vertical_gap, LayoutConfig::default().vertical_gap);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let overrides = LayoutOverrides {
            vertical_gap: Some(-4.0),
            max_row_width: Some(f32::NAN),
            ..Default::default()
        };
        let config = LayoutConfig::with_overrides(&overrides);
        assert_eq!(config.vertical_gap, 30.0);
        assert_eq!(config.max_row_width, 1200.0);
    }

    #[test]
    fn missing_config_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert!(config.collapse_reroutes);
        assert_eq!(config.column_policy, ColumnPolicy::SingleColumn);
    }
}
