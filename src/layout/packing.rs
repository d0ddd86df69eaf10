use std::cmp::Ordering;

use super::types::{LayoutId, Row};
use crate::config::ColumnPolicy;

/// Allowed height ratio between an item and the row it joins in auto mode.
const MIN_ROW_RATIO: f32 = 0.5;
const MAX_ROW_RATIO: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackItem {
    pub id: LayoutId,
    pub width: f32,
    pub height: f32,
}

impl PackItem {
    pub fn new(id: LayoutId, width: f32, height: f32) -> Self {
        Self { id, width, height }
    }
}

/// Splits `items` (already in their preferred order) into rows.
pub fn pack(items: &[PackItem], policy: ColumnPolicy, max_row_width: f32, gap: f32) -> Vec<Row> {
    if items.is_empty() {
        return Vec::new();
    }
    match policy {
        ColumnPolicy::SingleColumn => items.iter().map(|item| single_row(*item)).collect(),
        ColumnPolicy::Fixed(columns) => items
            .chunks(columns.max(1))
            .map(|chunk| {
                let mut row = Row::default();
                for item in chunk {
                    push_item(&mut row, *item, gap);
                }
                row
            })
            .collect(),
        ColumnPolicy::Auto => first_fit_decreasing_height(items, max_row_width, gap),
    }
}

fn single_row(item: PackItem) -> Row {
    Row {
        items: vec![item.id],
        width: item.width,
        height: item.height,
    }
}

fn push_item(row: &mut Row, item: PackItem, gap: f32) {
    if !row.items.is_empty() {
        row.width += gap;
    }
    row.items.push(item.id);
    row.width += item.width;
    row.height = row.height.max(item.height);
}

fn first_fit_decreasing_height(items: &[PackItem], max_row_width: f32, gap: f32) -> Vec<Row> {
    let mut sorted: Vec<PackItem> = items.to_vec();
    sorted.sort_by(|a, b| {
        b.height
            .partial_cmp(&a.height)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    let mut rows: Vec<Row> = Vec::new();
    for item in sorted {
        let slot = rows.iter().position(|row| {
            let fits = row.width + gap + item.width <= max_row_width;
            let ratio = if row.height > 0.0 {
                item.height / row.height
            } else {
                1.0
            };
            fits && (MIN_ROW_RATIO..=MAX_ROW_RATIO).contains(&ratio)
        });
        match slot {
            Some(idx) => push_item(&mut rows[idx], item, gap),
            None => rows.push(single_row(item)),
        }
    }

    // stable: equal heights keep their opening order
    rows.sort_by(|a, b| b.height.partial_cmp(&a.height).unwrap_or(Ordering::Equal));
    rows
}

/// Total height of stacked rows including the gaps between them.
pub fn stacked_height(rows: &[Row], gap: f32) -> f32 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|row| row.height).sum::<f32>() + gap * (rows.len() - 1) as f32
}

pub fn widest_row(rows: &[Row]) -> f32 {
    rows.iter().map(|row| row.width).fold(0.0, f32::max)
}
