use crate::ir::Graph;
use crate::layout::{LayoutStats, SelectionStats};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f32,
    pub height: f32,
    pub stats: StatsDump,
    pub elements: Vec<ElementDump>,
    pub groups: Vec<GroupDump>,
}

#[derive(Debug, Serialize)]
pub struct StatsDump {
    pub positioned: usize,
    pub layers: Option<usize>,
    pub resized_groups: Option<usize>,
    pub processed_groups: Option<usize>,
    pub elapsed_ms: f64,
}

impl From<&LayoutStats> for StatsDump {
    fn from(stats: &LayoutStats) -> Self {
        Self {
            positioned: stats.positioned,
            layers: Some(stats.layers),
            resized_groups: Some(stats.resized_groups),
            processed_groups: None,
            elapsed_ms: stats.elapsed.as_secs_f64() * 1000.0,
        }
    }
}

impl From<&SelectionStats> for StatsDump {
    fn from(stats: &SelectionStats) -> Self {
        Self {
            positioned: stats.positioned,
            layers: None,
            resized_groups: None,
            processed_groups: Some(stats.processed_groups),
            elapsed_ms: stats.elapsed.as_secs_f64() * 1000.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ElementDump {
    pub id: i64,
    pub kind: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub fixed: bool,
}

#[derive(Debug, Serialize)]
pub struct GroupDump {
    pub id: i64,
    pub title: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutDump {
    pub fn from_graph(graph: &Graph, stats: StatsDump) -> Self {
        let elements: Vec<ElementDump> = graph
            .elements
            .values()
            .map(|element| ElementDump {
                id: element.id,
                kind: format!("{:?}", element.kind),
                x: element.x,
                y: element.y,
                width: element.width,
                height: element.height,
                fixed: element.is_fixed(),
            })
            .collect();

        let groups: Vec<GroupDump> = graph
            .groups
            .values()
            .filter_map(|group| {
                let bounds = group.valid_bounds()?;
                Some(GroupDump {
                    id: group.id,
                    title: group.title.clone(),
                    x: bounds.x,
                    y: bounds.y,
                    width: bounds.width,
                    height: bounds.height,
                })
            })
            .collect();

        let right = elements
            .iter()
            .map(|e| e.x + e.width)
            .chain(groups.iter().map(|g| g.x + g.width))
            .fold(0.0, f32::max);
        let bottom = elements
            .iter()
            .map(|e| e.y + e.height)
            .chain(groups.iter().map(|g| g.y + g.height))
            .fold(0.0, f32::max);

        LayoutDump {
            width: right,
            height: bottom,
            stats,
            elements,
            groups,
        }
    }
}

pub fn write_layout_dump(path: &Path, graph: &Graph, stats: StatsDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_graph(graph, stats);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}
