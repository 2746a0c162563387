//! Command line inspection of map parameter files: invariant checks, edge
//! listing, geometry dumps at a given container size, and normalization of
//! hand-edited files.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Read, Write};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use serde::Serialize;

use crate::coords::Size;
use crate::geometry::{PathTelemetry, compute_path_telemetry};
use crate::params::MapParams;
use crate::registry::PathKey;
use crate::{DEFAULT_PATH_WIDTH_FACTOR, StageId};

#[derive(Debug, Parser)]
#[command(
    name = "stagemap",
    about = "Inspect and validate stage map parameter files."
)]
pub struct InspectArgs {
    /// Path to the map parameter JSON file. Use '-' to read from stdin.
    #[arg(short = 'i', long = "input")]
    input: String,

    /// Validate graph invariants and telemetry; exit non-zero on violations.
    #[arg(long = "check", action = ArgAction::SetTrue)]
    check: bool,

    /// Print the required edge list derived from the neighbor sets.
    #[arg(long = "edges", action = ArgAction::SetTrue)]
    edges: bool,

    /// Compute every path's derived telemetry at this container size
    /// (pixels, e.g. 1000x500) and print it as JSON.
    #[arg(short = 'c', long = "container")]
    container: Option<String>,

    /// Default path stroke width as a fraction of the stage width.
    #[arg(long = "path-width", default_value_t = DEFAULT_PATH_WIDTH_FACTOR)]
    path_width: f64,

    /// Rewrite the map with symmetry repaired and dangling references
    /// dropped.
    #[arg(long = "normalize", action = ArgAction::SetTrue, requires = "output")]
    normalize: bool,

    /// Output path for --normalize. Use '-' to write to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Suppress informational output.
    #[arg(short = 'q', long = "quiet", action = ArgAction::SetTrue)]
    quiet: bool,
}

#[derive(Debug, Serialize)]
struct EdgeTelemetryReport {
    from: StageId,
    to: StageId,
    telemetry: PathTelemetry,
}

pub fn run(args: InspectArgs) -> Result<()> {
    let source = read_source(&args.input)?;
    let params: MapParams = serde_json::from_str(&source)
        .with_context(|| format!("failed to parse map parameters from '{}'", args.input))?;

    if args.check {
        let violations = check_params(&params);
        if !violations.is_empty() {
            let mut report = String::from("map parameter check failed:\n");
            for violation in &violations {
                report.push_str("  - ");
                report.push_str(violation);
                report.push('\n');
            }
            bail!(report.trim_end().to_string());
        }
        if !args.quiet {
            println!(
                "ok: {} stages, {} paths, all invariants hold",
                params.elements.len(),
                params.paths.len()
            );
        }
    }

    let (graph, registry) = params
        .into_state()
        .context("map parameters could not be loaded")?;

    if args.edges {
        for key in graph.required_edges() {
            let from = graph.get(key.from).map(|stage| stage.label.as_str());
            let to = graph.get(key.to).map(|stage| stage.label.as_str());
            println!(
                "{} <-> {}",
                from.unwrap_or("<missing>"),
                to.unwrap_or("<missing>")
            );
        }
    }

    if let Some(spec) = &args.container {
        let container = parse_container(spec)?;
        let reports: Vec<EdgeTelemetryReport> = graph
            .required_edges()
            .into_iter()
            .filter_map(|key| {
                let from = graph.get(key.from)?;
                let to = graph.get(key.to)?;
                let factor = registry
                    .width_factor_override(key)
                    .unwrap_or(args.path_width);
                let telemetry =
                    compute_path_telemetry(&from.telemetry, &to.telemetry, container, factor)?;
                Some(EdgeTelemetryReport {
                    from: key.from,
                    to: key.to,
                    telemetry,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if args.normalize {
        let normalized = MapParams::from_state(&graph, &registry);
        let json = serde_json::to_string_pretty(&normalized)?;
        write_output(args.output.as_deref().unwrap_or("-"), &json)?;
        if !args.quiet {
            eprintln!("normalized map written");
        }
    } else if !args.check && !args.edges && args.container.is_none() && !args.quiet {
        println!(
            "{} stages, {} required paths",
            graph.len(),
            graph.required_edges().len()
        );
    }

    Ok(())
}

fn read_source(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read map parameters from stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("failed to read map parameter file '{input}'"))
    }
}

fn write_output(output: &str, contents: &str) -> Result<()> {
    if output == "-" {
        let mut stdout = io::stdout().lock();
        stdout.write_all(contents.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    } else {
        fs::write(output, format!("{contents}\n"))
            .with_context(|| format!("failed to write normalized map to '{output}'"))
    }
}

fn parse_container(spec: &str) -> Result<Size> {
    let (width, height) = spec
        .split_once(['x', 'X'])
        .with_context(|| format!("container size '{spec}' is not of the form WIDTHxHEIGHT"))?;
    let width: f64 = width
        .trim()
        .parse()
        .with_context(|| format!("container width '{width}' is not a number"))?;
    let height: f64 = height
        .trim()
        .parse()
        .with_context(|| format!("container height '{height}' is not a number"))?;
    if width <= 0.0 || height <= 0.0 {
        bail!("container size must be positive on both axes");
    }
    Ok(Size::new(width, height))
}

/// Report invariant violations in raw params, before any load-time repair.
fn check_params(params: &MapParams) -> Vec<String> {
    let mut violations = Vec::new();
    let known: HashSet<StageId> = params.elements.iter().map(|element| element.id).collect();

    if known.len() != params.elements.len() {
        violations.push("duplicate stage ids".to_string());
    }

    for element in &params.elements {
        if let Err(error) = element.telemetry.parse() {
            violations.push(format!("stage '{}': {error}", element.label));
        }

        for neighbor in &element.neighbors {
            if *neighbor == element.id {
                violations.push(format!(
                    "stage '{}' lists itself as neighbor",
                    element.label
                ));
                continue;
            }
            match params.elements.iter().find(|other| other.id == *neighbor) {
                None => violations.push(format!(
                    "stage '{}' references missing neighbor {neighbor}",
                    element.label
                )),
                Some(other) if !other.neighbors.contains(&element.id) => {
                    violations.push(format!(
                        "asymmetric neighbors: '{}' lists '{}' but not vice versa",
                        element.label, other.label
                    ));
                }
                Some(_) => {}
            }
        }
    }

    let mut seen_pairs = HashSet::new();
    for path in &params.paths {
        if path.from == path.to {
            violations.push(format!("path connects stage {} to itself", path.from));
            continue;
        }
        if !known.contains(&path.from) || !known.contains(&path.to) {
            violations.push(format!(
                "path {} -> {} references a missing stage",
                path.from, path.to
            ));
            continue;
        }
        if !seen_pairs.insert(PathKey::new(path.from, path.to)) {
            violations.push(format!("duplicate path entry {} -> {}", path.from, path.to));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StageKind;
    use crate::params::{ElementParams, TelemetryParams};

    fn element(id: StageId, label: &str, neighbors: Vec<StageId>) -> ElementParams {
        ElementParams {
            id,
            label: label.to_string(),
            kind: StageKind::Stage,
            special_stage_type: None,
            telemetry: TelemetryParams {
                x: "10".to_string(),
                y: "10".to_string(),
                width: "4.375".to_string(),
                height: "4.375".to_string(),
            },
            neighbors,
        }
    }

    #[test]
    fn container_spec_parses() {
        let size = parse_container("1000x500").unwrap();
        assert_eq!(size.width, 1000.0);
        assert_eq!(size.height, 500.0);
        assert!(parse_container("1000").is_err());
        assert!(parse_container("0x500").is_err());
    }

    #[test]
    fn check_flags_asymmetry_and_self_loops() {
        let a = StageId::new();
        let b = StageId::new();
        let params = MapParams {
            elements: vec![element(a, "A", vec![b, a]), element(b, "B", vec![])],
            paths: vec![],
        };

        let violations = check_params(&params);
        assert_eq!(violations.len(), 2);
        assert!(violations.iter().any(|v| v.contains("asymmetric")));
        assert!(violations.iter().any(|v| v.contains("itself")));
    }

    #[test]
    fn check_accepts_valid_map() {
        let a = StageId::new();
        let b = StageId::new();
        let params = MapParams {
            elements: vec![element(a, "A", vec![b]), element(b, "B", vec![a])],
            paths: vec![],
        };
        assert!(check_params(&params).is_empty());
    }
}
