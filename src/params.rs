//! The persisted parameter shape of a map, and its conversions to and from
//! the live graph/registry state.
//!
//! Telemetry percentages are stored as decimal strings, matching the host
//! content type's historical format. Engine-side values are `f64`; strings
//! exist only at this boundary.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::graph::{Stage, StageGraph, StageId, StageKind, StageTelemetry};
use crate::registry::{PathKey, PathRegistry, PathVisuals};
use crate::{EditorError, Result};

/// Percent telemetry of one element, as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryParams {
    pub x: String,
    pub y: String,
    pub width: String,
    pub height: String,
}

impl From<StageTelemetry> for TelemetryParams {
    fn from(telemetry: StageTelemetry) -> Self {
        TelemetryParams {
            x: telemetry.x.to_string(),
            y: telemetry.y.to_string(),
            width: telemetry.width.to_string(),
            height: telemetry.height.to_string(),
        }
    }
}

impl TelemetryParams {
    pub fn parse(&self) -> Result<StageTelemetry> {
        Ok(StageTelemetry {
            x: parse_percent("x", &self.x)?,
            y: parse_percent("y", &self.y)?,
            width: parse_percent("width", &self.width)?,
            height: parse_percent("height", &self.height)?,
        })
    }
}

fn parse_percent(field: &'static str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|parsed| parsed.is_finite())
        .ok_or_else(|| EditorError::InvalidTelemetry {
            field,
            value: value.to_string(),
        })
}

/// Persisted parameters of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementParams {
    pub id: StageId,
    pub label: String,
    #[serde(default)]
    pub kind: StageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_stage_type: Option<String>,
    pub telemetry: TelemetryParams,
    #[serde(default)]
    pub neighbors: Vec<StageId>,
}

/// Whether a path uses the global default visuals or author overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualsType {
    #[default]
    Default,
    Custom,
}

/// Author visual overrides of one path, in the host's field names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomVisuals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_style: Option<crate::registry::PathStyle>,
}

/// Persisted parameters of one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathParams {
    pub from: StageId,
    pub to: StageId,
    #[serde(default)]
    pub visuals_type: VisualsType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_visuals: Option<CustomVisuals>,
}

/// The full serialization contract the engine round-trips with its host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapParams {
    #[serde(default)]
    pub elements: Vec<ElementParams>,
    #[serde(default)]
    pub paths: Vec<PathParams>,
}

impl MapParams {
    /// Snapshot the live state. Elements follow stage insertion order; paths
    /// follow required-edge order, so output is deterministic.
    pub fn from_state(graph: &StageGraph, registry: &PathRegistry) -> Self {
        let elements = graph
            .iter()
            .map(|stage| ElementParams {
                id: stage.id,
                label: stage.label.clone(),
                kind: stage.kind,
                special_stage_type: stage.special_type.clone(),
                telemetry: stage.telemetry.into(),
                neighbors: stage.neighbors.iter().copied().collect(),
            })
            .collect();

        let paths = graph
            .required_edges()
            .into_iter()
            .map(|key| {
                let visuals = registry
                    .get(key)
                    .map(|path| path.visuals.clone())
                    .unwrap_or_default();
                PathParams {
                    from: key.from,
                    to: key.to,
                    visuals_type: if visuals.is_default() {
                        VisualsType::Default
                    } else {
                        VisualsType::Custom
                    },
                    custom_visuals: if visuals.is_default() {
                        None
                    } else {
                        Some(CustomVisuals {
                            color_path: visuals.color,
                            path_width: visuals.width_factor,
                            path_style: visuals.style,
                        })
                    },
                }
            })
            .collect();

        MapParams { elements, paths }
    }

    /// Rebuild graph and registry from persisted params.
    ///
    /// Hand-edited files are repaired rather than rejected where that is
    /// safe: asymmetric neighbor lists become symmetric by union, neighbor
    /// references to missing stages are dropped, and path entries whose
    /// endpoints no longer both exist are discarded. Malformed telemetry
    /// strings are an error.
    pub fn into_state(self) -> Result<(StageGraph, PathRegistry)> {
        let known: HashSet<StageId> = self.elements.iter().map(|element| element.id).collect();

        let mut graph = StageGraph::new();
        for element in &self.elements {
            let telemetry = element.telemetry.parse()?;
            let neighbors = element
                .neighbors
                .iter()
                .copied()
                .filter(|neighbor| {
                    let keep = *neighbor != element.id && known.contains(neighbor);
                    if !keep {
                        warn!(stage = %element.id, neighbor = %neighbor, "dropping dangling neighbor reference");
                    }
                    keep
                })
                .collect();

            graph.insert_raw(Stage {
                id: element.id,
                label: element.label.clone(),
                kind: element.kind,
                special_type: element.special_stage_type.clone(),
                telemetry,
                neighbors,
            });
        }

        restore_symmetry(&mut graph);

        let mut registry = PathRegistry::new();
        for path in &self.paths {
            if path.from == path.to || !known.contains(&path.from) || !known.contains(&path.to) {
                warn!(from = %path.from, to = %path.to, "dropping path with missing endpoint");
                continue;
            }

            let visuals = match (&path.visuals_type, &path.custom_visuals) {
                (VisualsType::Custom, Some(custom)) => PathVisuals {
                    color: custom.color_path.clone(),
                    width_factor: custom.path_width,
                    style: custom.path_style,
                },
                _ => PathVisuals::default(),
            };
            registry.insert_visuals(PathKey::new(path.from, path.to), visuals);
        }

        Ok((graph, registry))
    }
}

/// Union-repair neighbor symmetry: whenever A lists B, make B list A.
fn restore_symmetry(graph: &mut StageGraph) {
    let mut missing: Vec<(StageId, StageId)> = Vec::new();
    for stage in graph.iter() {
        for neighbor in &stage.neighbors {
            let reciprocal = graph
                .get(*neighbor)
                .is_some_and(|other| other.neighbors.contains(&stage.id));
            if !reciprocal {
                missing.push((*neighbor, stage.id));
            }
        }
    }

    for (subject, to_add) in missing {
        warn!(stage = %subject, neighbor = %to_add, "restoring neighbor symmetry");
        let mut desired: Vec<StageId> = graph
            .get(subject)
            .map(|stage| stage.neighbors.iter().copied().collect())
            .unwrap_or_default();
        desired.push(to_add);
        // Subject exists; the reference came out of a live neighbor set.
        let _ = graph.set_neighbors(subject, &desired);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StageKind;

    fn element(id: StageId, label: &str, neighbors: Vec<StageId>) -> ElementParams {
        ElementParams {
            id,
            label: label.to_string(),
            kind: StageKind::Stage,
            special_stage_type: None,
            telemetry: TelemetryParams {
                x: "10".to_string(),
                y: "20.5".to_string(),
                width: "4.375".to_string(),
                height: "8.75".to_string(),
            },
            neighbors,
        }
    }

    #[test]
    fn telemetry_strings_parse() {
        let a = StageId::new();
        let params = MapParams {
            elements: vec![element(a, "A", vec![])],
            paths: vec![],
        };

        let (graph, _) = params.into_state().unwrap();
        let telemetry = graph.get(a).unwrap().telemetry;
        assert_eq!(telemetry.y, 20.5);
        assert_eq!(telemetry.height, 8.75);
    }

    #[test]
    fn malformed_telemetry_is_an_error() {
        let a = StageId::new();
        let mut broken = element(a, "A", vec![]);
        broken.telemetry.x = "wide".to_string();

        let result = MapParams {
            elements: vec![broken],
            paths: vec![],
        }
        .into_state();

        assert!(matches!(
            result,
            Err(EditorError::InvalidTelemetry { field: "x", .. })
        ));
    }

    #[test]
    fn asymmetric_neighbors_are_repaired_by_union() {
        let a = StageId::new();
        let b = StageId::new();
        let params = MapParams {
            elements: vec![element(a, "A", vec![b]), element(b, "B", vec![])],
            paths: vec![],
        };

        let (graph, _) = params.into_state().unwrap();
        assert!(graph.get(b).unwrap().neighbors.contains(&a));
    }

    #[test]
    fn dangling_paths_and_neighbors_are_dropped() {
        let a = StageId::new();
        let b = StageId::new();
        let ghost = StageId::new();
        let params = MapParams {
            elements: vec![element(a, "A", vec![ghost, b]), element(b, "B", vec![a])],
            paths: vec![PathParams {
                from: a,
                to: ghost,
                visuals_type: VisualsType::Default,
                custom_visuals: None,
            }],
        };

        let (graph, registry) = params.into_state().unwrap();
        assert!(!graph.get(a).unwrap().neighbors.contains(&ghost));
        assert!(registry.is_empty());
    }

    #[test]
    fn round_trip_preserves_shape() {
        let a = StageId::new();
        let b = StageId::new();
        let params = MapParams {
            elements: vec![element(a, "A", vec![b]), element(b, "B", vec![a])],
            paths: vec![PathParams {
                from: PathKey::new(a, b).from,
                to: PathKey::new(a, b).to,
                visuals_type: VisualsType::Custom,
                custom_visuals: Some(CustomVisuals {
                    color_path: Some("#aa0000".to_string()),
                    path_width: Some(0.25),
                    path_style: Some(crate::registry::PathStyle::Dashed),
                }),
            }],
        };

        let (graph, registry) = params.clone().into_state().unwrap();
        let back = MapParams::from_state(&graph, &registry);

        assert_eq!(back.elements.len(), 2);
        assert_eq!(back.paths.len(), 1);
        assert_eq!(back.paths[0].custom_visuals, params.paths[0].custom_visuals);
        assert_eq!(back.elements[0].telemetry, params.elements[0].telemetry);
    }

    #[test]
    fn json_field_names_match_host_contract() {
        let a = StageId::new();
        let b = StageId::new();
        let key = PathKey::new(a, b);
        let params = MapParams {
            elements: vec![element(a, "A", vec![b])],
            paths: vec![PathParams {
                from: key.from,
                to: key.to,
                visuals_type: VisualsType::Custom,
                custom_visuals: Some(CustomVisuals {
                    color_path: Some("red".to_string()),
                    path_width: None,
                    path_style: None,
                }),
            }],
        };

        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"visualsType\":\"custom\""));
        assert!(json.contains("\"customVisuals\""));
        assert!(json.contains("\"colorPath\":\"red\""));
        assert!(json.contains("\"x\":\"10\""));
    }
}
