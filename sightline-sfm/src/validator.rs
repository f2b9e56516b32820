//! Advisory consistency checking for the scene graph.
//!
//! Validation never mutates anything. Structural problems are errors (the
//! graph also refuses to create such constraints in the first place);
//! geometric contradictions between declared values are errors; redundancy
//! and over-constraint are informational findings that propagation resolves
//! by priority rather than rejection.

use itertools::Itertools;
use sightline_core::nalgebra::Point3;
use sightline_core::{
    Constraint, ConstraintKey, ConstraintKind, ConstraintStatus, PointKey, SceneGraph,
};
use sightline_geom::direction::{alignment_deviation, distance_to_line, length_deviation};
use sightline_geom::plane_fit::{max_deviation, PlaneFitter};

use crate::InferenceSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Non-blocking observation (redundancy).
    Info,
    /// Non-blocking but suspicious (over-constraint, out-of-bounds pixels).
    Warning,
    /// Structural or geometric inconsistency; the report is invalid.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// Dangling reference, duplicate participant or missing minimum count.
    Structural,
    /// Declared values contradict each other beyond tolerance.
    GeometricConflict,
    /// Points of a coplanarity declaration leave the fitted plane.
    CoplanarDeviation,
    /// The constraint adds no information.
    Redundant,
    /// More equations than free unknowns on a point.
    OverConstrained,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
    /// The offending constraint, when the finding is about one. `None` for
    /// line/plane declarations and for a candidate under test.
    pub constraint: Option<ConstraintKey>,
    pub points: Vec<PointKey>,
}

/// The outcome of a validation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// True when no error-severity issue was found.
    pub fn valid(&self) -> bool {
        self.issues.iter().all(|i| i.severity != Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
    }
}

/// Validates the whole graph, optionally together with a candidate
/// constraint that has not been added yet.
pub fn validate(
    graph: &SceneGraph,
    candidate: Option<&Constraint>,
    settings: &InferenceSettings,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for &key in graph.constraint_order() {
        check_constraint(graph, Some(key), &graph.constraints[key], settings, &mut report);
    }
    if let Some(candidate) = candidate {
        check_constraint(graph, None, candidate, settings, &mut report);
        check_duplicate(graph, candidate, &mut report);
    }

    check_lines(graph, settings, &mut report);
    check_planes(graph, settings, &mut report);
    check_over_constraint(graph, candidate, &mut report);

    report
}

fn issue(
    report: &mut ValidationReport,
    severity: Severity,
    kind: IssueKind,
    constraint: Option<ConstraintKey>,
    points: Vec<PointKey>,
    message: String,
) {
    report.issues.push(Issue {
        severity,
        kind,
        message,
        constraint,
        points,
    });
}

fn known(graph: &SceneGraph, point: PointKey) -> Option<Point3<f64>> {
    graph.points.get(point)?.known_point()
}

fn check_constraint(
    graph: &SceneGraph,
    key: Option<ConstraintKey>,
    constraint: &Constraint,
    settings: &InferenceSettings,
    report: &mut ValidationReport,
) {
    if let Err(error) = graph.check_constraint(constraint) {
        issue(
            report,
            Severity::Error,
            IssueKind::Structural,
            key,
            constraint.points(),
            error.to_string(),
        );
        return;
    }

    let tolerance = settings.tolerance;
    match constraint {
        Constraint::FixedPoint { point, xyz } => {
            let locked = graph.points[*point].locked;
            let mut redundant = true;
            for ix in 0..3 {
                match (xyz[ix], locked[ix]) {
                    (Some(target), Some(held)) if (target - held).abs() > tolerance => {
                        issue(
                            report,
                            Severity::Error,
                            IssueKind::GeometricConflict,
                            key,
                            vec![*point],
                            format!(
                                "fixed value {target} contradicts locked value {held} beyond tolerance"
                            ),
                        );
                        redundant = false;
                    }
                    (Some(_), Some(_)) => {}
                    (Some(_), None) => redundant = false,
                    (None, _) => {}
                }
            }
            if redundant {
                issue(
                    report,
                    Severity::Info,
                    IssueKind::Redundant,
                    key,
                    vec![*point],
                    "fixed point repeats values already locked".to_string(),
                );
            }
        }
        Constraint::Distance { a, b, value } => {
            if let (Some(pa), Some(pb)) = (known(graph, *a), known(graph, *b)) {
                let actual = (pb - pa).norm();
                if (actual - value).abs() > tolerance {
                    issue(
                        report,
                        Severity::Error,
                        IssueKind::GeometricConflict,
                        key,
                        vec![*a, *b],
                        format!("declared distance {value} but points are {actual:.6} apart"),
                    );
                } else if graph.points[*a].status() == ConstraintStatus::Locked
                    && graph.points[*b].status() == ConstraintStatus::Locked
                {
                    issue(
                        report,
                        Severity::Info,
                        IssueKind::Redundant,
                        key,
                        vec![*a, *b],
                        "distance between fully locked points adds no information".to_string(),
                    );
                }
            }
        }
        Constraint::Angle {
            vertex,
            a,
            c,
            radians,
        } => {
            if let (Some(pv), Some(pa), Some(pc)) =
                (known(graph, *vertex), known(graph, *a), known(graph, *c))
            {
                let u = pa - pv;
                let w = pc - pv;
                if u.norm() > 1e-12 && w.norm() > 1e-12 {
                    let actual = (u.dot(&w) / (u.norm() * w.norm())).clamp(-1.0, 1.0).acos();
                    if (actual - radians).abs() > tolerance {
                        issue(
                            report,
                            Severity::Error,
                            IssueKind::GeometricConflict,
                            key,
                            vec![*vertex, *a, *c],
                            format!("declared angle {radians} but points span {actual:.6}"),
                        );
                    }
                }
            }
        }
        Constraint::Collinear { points } => {
            let positioned: Vec<(PointKey, Point3<f64>)> = points
                .iter()
                .filter_map(|&p| Some((p, known(graph, p)?)))
                .collect();
            if positioned.len() >= 3 {
                let (_, pa) = positioned[0];
                let (_, pb) = positioned[1];
                for &(pkey, p) in &positioned[2..] {
                    if let Some(deviation) = distance_to_line(p, pa, pb) {
                        if deviation > tolerance {
                            issue(
                                report,
                                Severity::Error,
                                IssueKind::GeometricConflict,
                                key,
                                vec![pkey],
                                format!("point leaves the declared line by {deviation:.6}"),
                            );
                        }
                    }
                }
            }
        }
        Constraint::Coplanar { points } => {
            let positioned: Vec<Point3<f64>> =
                points.iter().filter_map(|&p| known(graph, p)).collect();
            if positioned.len() >= 4 {
                let fitter = PlaneFitter::new().epsilon(settings.solver_epsilon);
                if let Some(equation) = fitter.fit(&positioned) {
                    let deviation = max_deviation(&equation, &positioned);
                    if deviation > tolerance {
                        issue(
                            report,
                            Severity::Error,
                            IssueKind::CoplanarDeviation,
                            key,
                            points.clone(),
                            format!("points deviate from the fitted plane by {deviation:.6}"),
                        );
                    }
                }
            }
        }
        Constraint::ParallelLines { a, b } | Constraint::PerpendicularLines { a, b } => {
            let directions = [a, b].map(|&l| {
                let line = &graph.lines[l];
                Some((known(graph, line.b)? - known(graph, line.a)?).normalize())
            });
            if let [Some(u), Some(w)] = directions {
                let cosine = u.dot(&w).abs();
                let (kind, misfit) = match constraint.kind() {
                    ConstraintKind::ParallelLines => ("parallel", 1.0 - cosine),
                    _ => ("perpendicular", cosine),
                };
                if misfit > tolerance {
                    issue(
                        report,
                        Severity::Error,
                        IssueKind::GeometricConflict,
                        key,
                        Vec::new(),
                        format!("lines declared {kind} misfit by {misfit:.6}"),
                    );
                }
            }
        }
        Constraint::EqualDistances { pairs } => {
            let lengths: Vec<f64> = pairs
                .iter()
                .filter_map(|&(a, b)| Some((known(graph, b)? - known(graph, a)?).norm()))
                .collect();
            if lengths.len() == pairs.len() {
                if let Some((min, max)) = lengths.iter().copied().minmax().into_option() {
                    if max - min > tolerance {
                        issue(
                            report,
                            Severity::Error,
                            IssueKind::GeometricConflict,
                            key,
                            constraint.points(),
                            format!("distances declared equal spread over {:.6}", max - min),
                        );
                    }
                }
            }
        }
        Constraint::EqualAngles { triplets } => {
            let angles: Vec<f64> = triplets
                .iter()
                .filter_map(|&(vertex, a, c)| {
                    let pv = known(graph, vertex)?;
                    let u = known(graph, a)? - pv;
                    let w = known(graph, c)? - pv;
                    if u.norm() < 1e-12 || w.norm() < 1e-12 {
                        return None;
                    }
                    Some((u.dot(&w) / (u.norm() * w.norm())).clamp(-1.0, 1.0).acos())
                })
                .collect();
            if angles.len() == triplets.len() {
                if let Some((min, max)) = angles.iter().copied().minmax().into_option() {
                    if max - min > tolerance {
                        issue(
                            report,
                            Severity::Error,
                            IssueKind::GeometricConflict,
                            key,
                            constraint.points(),
                            format!("angles declared equal spread over {:.6}", max - min),
                        );
                    }
                }
            }
        }
        Constraint::Projection { view, u, v, .. } => {
            if let Some(viewpoint) = graph.views.get(*view) {
                if !viewpoint.contains_pixel(*u, *v) {
                    issue(
                        report,
                        Severity::Warning,
                        IssueKind::Structural,
                        key,
                        constraint.points(),
                        format!("observation ({u}, {v}) lies outside the image bounds"),
                    );
                }
            }
        }
    }
}

fn check_duplicate(graph: &SceneGraph, candidate: &Constraint, report: &mut ValidationReport) {
    for &key in graph.constraint_order() {
        if &graph.constraints[key] == candidate {
            issue(
                report,
                Severity::Info,
                IssueKind::Redundant,
                Some(key),
                candidate.points(),
                "an identical constraint already exists".to_string(),
            );
            return;
        }
    }
}

fn check_lines(graph: &SceneGraph, settings: &InferenceSettings, report: &mut ValidationReport) {
    for &lkey in graph.line_order() {
        let line = &graph.lines[lkey];
        if line.construction {
            continue;
        }
        let (Some(pa), Some(pb)) = (known(graph, line.a), known(graph, line.b)) else {
            continue;
        };
        let misalignment = alignment_deviation(pa, pb, line.direction);
        if misalignment > settings.tolerance {
            issue(
                report,
                Severity::Error,
                IssueKind::GeometricConflict,
                None,
                vec![line.a, line.b],
                format!(
                    "line endpoints violate the {:?} direction by {misalignment:.6}",
                    line.direction
                ),
            );
        }
        if let Some(target) = line.target_length {
            let deviation = length_deviation(pa, pb, target);
            if deviation > settings.tolerance {
                issue(
                    report,
                    Severity::Error,
                    IssueKind::GeometricConflict,
                    None,
                    vec![line.a, line.b],
                    format!("line misses its target length {target} by {deviation:.6}"),
                );
            }
        }
    }
}

fn check_planes(graph: &SceneGraph, settings: &InferenceSettings, report: &mut ValidationReport) {
    let fitter = PlaneFitter::new().epsilon(settings.solver_epsilon);
    for pkey in graph.planes.keys() {
        let Ok(member_keys) = graph.plane_points(pkey) else {
            continue;
        };
        let positioned: Vec<Point3<f64>> = member_keys
            .iter()
            .filter_map(|&p| known(graph, p))
            .collect();
        if positioned.len() == member_keys.len() && positioned.len() >= 3 {
            if fitter.fit(&positioned).is_none() {
                issue(
                    report,
                    Severity::Warning,
                    IssueKind::GeometricConflict,
                    None,
                    member_keys,
                    "plane definition is degenerate (collinear points)".to_string(),
                );
            }
        }
    }
}

/// Counts constraint equations against free unknowns per point. Observations
/// are excluded: they are measurements for the optimizer, not geometric
/// declarations.
fn check_over_constraint(
    graph: &SceneGraph,
    candidate: Option<&Constraint>,
    report: &mut ValidationReport,
) {
    let mut equations: slotmap::SecondaryMap<PointKey, usize> = Default::default();
    let add = |point: PointKey, count: usize, equations: &mut slotmap::SecondaryMap<PointKey, usize>| {
        if graph.points.contains_key(point) {
            *equations.entry(point).unwrap().or_insert(0) += count;
        }
    };

    let count_constraint = |constraint: &Constraint,
                            equations: &mut slotmap::SecondaryMap<PointKey, usize>| {
        match constraint {
            Constraint::FixedPoint { point, xyz } => {
                add(*point, xyz.iter().flatten().count(), equations)
            }
            Constraint::Distance { a, b, .. } => {
                add(*a, 1, equations);
                add(*b, 1, equations);
            }
            Constraint::Angle { vertex, a, c, .. } => {
                for p in [vertex, a, c] {
                    add(*p, 1, equations);
                }
            }
            // Lying on a known line removes two degrees of freedom.
            Constraint::Collinear { points } => {
                for &p in points {
                    add(p, 2, equations);
                }
            }
            Constraint::Coplanar { points } => {
                for &p in points {
                    add(p, 1, equations);
                }
            }
            Constraint::EqualDistances { pairs } => {
                for &(a, b) in pairs {
                    add(a, 1, equations);
                    add(b, 1, equations);
                }
            }
            Constraint::EqualAngles { triplets } => {
                for &(v, a, c) in triplets {
                    for p in [v, a, c] {
                        add(p, 1, equations);
                    }
                }
            }
            Constraint::ParallelLines { .. }
            | Constraint::PerpendicularLines { .. }
            | Constraint::Projection { .. } => {}
        }
    };

    for &key in graph.constraint_order() {
        count_constraint(&graph.constraints[key], &mut equations);
    }
    if let Some(candidate) = candidate {
        count_constraint(candidate, &mut equations);
    }
    for &lkey in graph.line_order() {
        let line = &graph.lines[lkey];
        if line.construction {
            continue;
        }
        let pinned = line.direction.pinned_axes().len()
            + usize::from(line.target_length.is_some());
        add(line.a, pinned, &mut equations);
        add(line.b, pinned, &mut equations);
    }

    for (point, &count) in &equations {
        let unknowns = graph.points[point]
            .locked
            .iter()
            .filter(|v| v.is_none())
            .count();
        if count > unknowns {
            issue(
                report,
                Severity::Warning,
                IssueKind::OverConstrained,
                None,
                vec![point],
                format!("{count} constraint equations for {unknowns} free unknowns"),
            );
        }
    }
}
