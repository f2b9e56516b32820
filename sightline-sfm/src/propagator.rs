//! Iterative constraint propagation.
//!
//! Propagation is a pure function of the current graph: it recomputes the
//! inferred coordinate layer (and nothing else) by repeatedly letting each
//! deriving rule fill in unknown axes from known ones until a fixed point is
//! reached or the pass cap trips. Derived values carry a provenance
//! [`Priority`]; a stronger source overwrites a weaker one, equal sources
//! keep the first-declared value, and any disagreement beyond the tolerance
//! is recorded as a non-fatal [`Conflict`] on the affected point.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use sightline_core::nalgebra::Point3;
use sightline_core::{
    Axis, Constraint, ConstraintKey, LineKey, PointKey, SceneGraph,
};
use sightline_geom::direction::{line_parameter, point_on_line};
use sightline_geom::plane_fit::{solve_plane_axis, PlaneFitter};

use crate::InferenceSettings;

/// Provenance of a derived axis value, strongest first.
///
/// `Locked` marks values seeded from the user's locked layer; everything
/// else is a deriving rule. Ordering is the resolution order: a value may
/// only be replaced by one from a strictly stronger source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Locked,
    FixedPoint,
    LineDirection,
    Collinear,
    Coplanar,
}

/// A disagreement beyond tolerance between two sources for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conflict {
    pub point: PointKey,
    pub axis: Axis,
    /// The value propagation kept (the priority winner).
    pub kept: f64,
    pub kept_priority: Priority,
    /// The value propagation discarded.
    pub rejected: f64,
    pub rejected_priority: Priority,
}

/// The outcome of one propagation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropagationReport {
    /// Passes executed over the rule set.
    pub passes: usize,
    /// False only when the pass cap tripped before stabilizing.
    pub converged: bool,
    /// Points whose inferred layer was recomputed, in key order.
    pub recomputed: Vec<PointKey>,
    /// Disagreements encountered; propagation continued past all of them.
    pub conflicts: Vec<Conflict>,
    /// Recomputed points that still lack at least one axis.
    pub underdetermined: Vec<PointKey>,
    /// Points still changing when the pass cap tripped.
    pub unstable: Vec<PointKey>,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    value: f64,
    priority: Priority,
}

/// One deriving rule, in the priority group it evaluates at.
#[derive(Debug, Clone, Copy)]
enum Rule {
    /// `FixedPoint` constraint: sets the listed axes directly.
    Fixed(ConstraintKey),
    /// Line direction/length declarations between two endpoints.
    Line(LineKey),
    /// A line's declared collinear members.
    LineMembers(LineKey),
    /// A `Collinear` constraint over three or more points.
    Collinear(ConstraintKey),
    /// A `Coplanar` constraint solving a single missing axis.
    Coplanar(ConstraintKey),
}

struct Table {
    slots: BTreeMap<PointKey, [Option<Slot>; 3]>,
    tolerance: f64,
    conflicts: Vec<Conflict>,
    changed: BTreeSet<PointKey>,
}

impl Table {
    fn get(&self, point: PointKey, axis: Axis) -> Option<f64> {
        self.slots.get(&point)?[axis.index()].map(|s| s.value)
    }

    fn known(&self, point: PointKey) -> [Option<f64>; 3] {
        match self.slots.get(&point) {
            Some(slots) => [
                slots[0].map(|s| s.value),
                slots[1].map(|s| s.value),
                slots[2].map(|s| s.value),
            ],
            None => [None; 3],
        }
    }

    fn full(&self, point: PointKey) -> Option<Point3<f64>> {
        let [x, y, z] = self.known(point);
        Some(Point3::new(x?, y?, z?))
    }

    /// Offers a derived value for one axis. Unknown axes accept it; known
    /// axes keep the stronger (or first) source and record a conflict when
    /// the two disagree beyond tolerance.
    fn assign(&mut self, point: PointKey, axis: Axis, value: f64, priority: Priority) {
        if !value.is_finite() {
            return;
        }
        let current = match self.slots.get(&point) {
            Some(slots) => slots[axis.index()],
            None => return,
        };
        let mut new_slot = None;
        match current {
            None => {
                new_slot = Some(Slot { value, priority });
                self.changed.insert(point);
            }
            Some(existing) => {
                let disagree = (existing.value - value).abs() > self.tolerance;
                if priority < existing.priority {
                    if disagree {
                        self.record_conflict(Conflict {
                            point,
                            axis,
                            kept: value,
                            kept_priority: priority,
                            rejected: existing.value,
                            rejected_priority: existing.priority,
                        });
                    }
                    if existing.value != value {
                        self.changed.insert(point);
                    }
                    new_slot = Some(Slot { value, priority });
                } else if disagree {
                    self.record_conflict(Conflict {
                        point,
                        axis,
                        kept: existing.value,
                        kept_priority: existing.priority,
                        rejected: value,
                        rejected_priority: priority,
                    });
                }
            }
        }
        if let Some(s) = new_slot {
            if let Some(slots) = self.slots.get_mut(&point) {
                slots[axis.index()] = Some(s);
            }
        }
    }

    fn record_conflict(&mut self, conflict: Conflict) {
        if !self.conflicts.contains(&conflict) {
            self.conflicts.push(conflict);
        }
    }
}

/// Recomputes the inferred layer of every dirty point (and of every point
/// reachable from one through shared constraints or lines).
///
/// Only `inferred` values and `unstable` flags are written; locked and
/// optimized layers are never touched. Running again on an unchanged graph
/// recomputes nothing.
pub fn propagate(graph: &mut SceneGraph, settings: &InferenceSettings) -> PropagationReport {
    let targets = dirty_closure(graph);
    if targets.is_empty() {
        return PropagationReport {
            converged: true,
            ..PropagationReport::default()
        };
    }

    let rules = collect_rules(graph, &targets);

    let mut table = Table {
        slots: targets.iter().map(|&p| (p, [None; 3])).collect(),
        tolerance: settings.tolerance,
        conflicts: Vec::new(),
        changed: BTreeSet::new(),
    };
    for &point in &targets {
        for axis in Axis::ALL {
            if let Some(value) = graph.points[point].locked[axis.index()] {
                table.slots.get_mut(&point).unwrap()[axis.index()] =
                    Some(Slot {
                        value,
                        priority: Priority::Locked,
                    });
            }
        }
    }

    let fitter = PlaneFitter::new().epsilon(settings.solver_epsilon);
    let mut passes = 0;
    let mut converged = false;
    while passes < settings.max_passes {
        passes += 1;
        table.changed.clear();
        for &rule in &rules {
            evaluate(rule, graph, &mut table, &fitter);
        }
        if table.changed.is_empty() {
            converged = true;
            break;
        }
    }

    let unstable: Vec<PointKey> = if converged {
        Vec::new()
    } else {
        table.changed.iter().copied().collect()
    };

    let mut underdetermined = Vec::new();
    for &key in &targets {
        let point = &mut graph.points[key];
        point.clear_inferred();
        let slots = table.slots[&key];
        for axis in Axis::ALL {
            let ix = axis.index();
            if point.locked[ix].is_none() {
                point.inferred[ix] = slots[ix].map(|s| s.value);
            }
        }
        point.unstable = unstable.contains(&key);
        if point.known_point().is_none() {
            underdetermined.push(key);
        }
    }

    if converged {
        debug!(
            "propagated {} points in {} passes ({} conflicts)",
            targets.len(),
            passes,
            table.conflicts.len()
        );
    } else {
        warn!(
            "propagation hit the pass cap of {} with {} points still changing",
            settings.max_passes,
            unstable.len()
        );
    }

    PropagationReport {
        passes,
        converged,
        recomputed: targets.into_iter().collect(),
        conflicts: table.conflicts,
        underdetermined,
        unstable,
    }
}

/// Expands the graph's dirty set to every point reachable through shared
/// constraints or lines, then clears it.
fn dirty_closure(graph: &mut SceneGraph) -> BTreeSet<PointKey> {
    let mut closure = graph.take_dirty();
    let mut frontier: Vec<PointKey> = closure.iter().copied().collect();
    while let Some(point) = frontier.pop() {
        let mut neighbors: Vec<PointKey> = Vec::new();
        for ckey in graph.constraints_on(point) {
            neighbors.extend(graph.constraints[ckey].points());
        }
        for lkey in graph.lines_on(point) {
            neighbors.extend(graph.lines[lkey].points());
        }
        for neighbor in neighbors {
            if closure.insert(neighbor) {
                frontier.push(neighbor);
            }
        }
    }
    closure
}

/// Builds the evaluation sequence: rules touching any target point, grouped
/// strongest priority first, declaration order within each group (with
/// `Collinear` constraints ahead of line-declared members).
fn collect_rules(graph: &SceneGraph, targets: &BTreeSet<PointKey>) -> Vec<Rule> {
    let touches = |points: &[PointKey]| points.iter().any(|p| targets.contains(p));
    let mut rules = Vec::new();

    for &ckey in graph.constraint_order() {
        if let Constraint::FixedPoint { point, .. } = graph.constraints[ckey] {
            if targets.contains(&point) {
                rules.push(Rule::Fixed(ckey));
            }
        }
    }
    for &lkey in graph.line_order() {
        let line = &graph.lines[lkey];
        if line.construction {
            continue;
        }
        if (!line.direction.is_free() || line.target_length.is_some())
            && touches(&[line.a, line.b])
        {
            rules.push(Rule::Line(lkey));
        }
    }
    for &ckey in graph.constraint_order() {
        if let Constraint::Collinear { ref points } = graph.constraints[ckey] {
            if touches(points) {
                rules.push(Rule::Collinear(ckey));
            }
        }
    }
    for &lkey in graph.line_order() {
        let line = &graph.lines[lkey];
        if line.construction || line.collinear.is_empty() {
            continue;
        }
        if touches(&line.points().collect::<Vec<_>>()) {
            rules.push(Rule::LineMembers(lkey));
        }
    }
    for &ckey in graph.constraint_order() {
        if let Constraint::Coplanar { ref points } = graph.constraints[ckey] {
            if touches(points) {
                rules.push(Rule::Coplanar(ckey));
            }
        }
    }
    rules
}

fn evaluate(rule: Rule, graph: &SceneGraph, table: &mut Table, fitter: &PlaneFitter) {
    match rule {
        Rule::Fixed(ckey) => {
            let Constraint::FixedPoint { point, xyz } = graph.constraints[ckey] else {
                return;
            };
            for axis in Axis::ALL {
                if let Some(value) = xyz[axis.index()] {
                    table.assign(point, axis, value, Priority::FixedPoint);
                }
            }
        }
        Rule::Line(lkey) => {
            let line = &graph.lines[lkey];
            let (a, b) = (line.a, line.b);

            // Off-axis coordinates are equal at both endpoints.
            for &axis in line.direction.pinned_axes() {
                match (table.get(a, axis), table.get(b, axis)) {
                    (Some(va), None) => table.assign(b, axis, va, Priority::LineDirection),
                    (None, Some(vb)) => table.assign(a, axis, vb, Priority::LineDirection),
                    (Some(va), Some(_)) => {
                        // Both known; offer a's value to b so a misalignment
                        // surfaces as a conflict.
                        table.assign(b, axis, va, Priority::LineDirection);
                    }
                    (None, None) => {}
                }
            }

            // A declared length walks along the axis, positive direction by
            // convention when only one endpoint is known.
            if let (Some(axis), Some(length)) = (line.direction.axis(), line.target_length) {
                match (table.get(a, axis), table.get(b, axis)) {
                    (Some(va), None) => {
                        table.assign(b, axis, va + length, Priority::LineDirection)
                    }
                    (None, Some(vb)) => {
                        table.assign(a, axis, vb - length, Priority::LineDirection)
                    }
                    (Some(va), Some(vb)) => {
                        // Validate the span, accepting either axis direction.
                        let span = vb - va;
                        let target = va + span.signum() * length;
                        table.assign(b, axis, target, Priority::LineDirection);
                    }
                    (None, None) => {}
                }
            }
        }
        Rule::LineMembers(lkey) => {
            let line = &graph.lines[lkey];
            let (Some(pa), Some(pb)) = (table.full(line.a), table.full(line.b)) else {
                return;
            };
            for &member in &line.collinear {
                place_on_line(table, member, pa, pb);
            }
        }
        Rule::Collinear(ckey) => {
            let Constraint::Collinear { ref points } = graph.constraints[ckey] else {
                return;
            };
            // The first two fully-known points anchor the line.
            let mut anchors = points.iter().filter_map(|&p| Some((p, table.full(p)?)));
            let (Some((akey, pa)), Some((bkey, pb))) = (anchors.next(), anchors.next()) else {
                return;
            };
            for &member in points {
                if member != akey && member != bkey {
                    place_on_line(table, member, pa, pb);
                }
            }
        }
        Rule::Coplanar(ckey) => {
            let Constraint::Coplanar { ref points } = graph.constraints[ckey] else {
                return;
            };
            let (full, incomplete): (Vec<PointKey>, Vec<PointKey>) = points
                .iter()
                .copied()
                .partition(|&p| table.full(p).is_some());
            // Solvable only when a single point is missing a single axis;
            // with every point known this rule is validation-only.
            let &[member] = incomplete.as_slice() else {
                return;
            };
            if full.len() < 3 {
                return;
            }
            let known = table.known(member);
            let unknown: Vec<Axis> = Axis::ALL
                .into_iter()
                .filter(|a| known[a.index()].is_none())
                .collect();
            let &[axis] = unknown.as_slice() else {
                return;
            };
            let anchor_points: Vec<Point3<f64>> =
                full.iter().filter_map(|&p| table.full(p)).collect();
            let Some(equation) = fitter.fit(&anchor_points) else {
                return;
            };
            if let Some(value) = solve_plane_axis(&equation, known, axis) {
                table.assign(member, axis, value, Priority::Coplanar);
            }
        }
    }
}

/// Places a partially-known point on the line through two anchors: its known
/// axes pick the line parameter by least squares, its unknown axes are
/// filled from it. Points with no known axis stay underdetermined.
fn place_on_line(table: &mut Table, member: PointKey, pa: Point3<f64>, pb: Point3<f64>) {
    let known = table.known(member);
    let Some(t) = line_parameter(pa, pb, known) else {
        return;
    };
    let q = point_on_line(pa, pb, t);
    for axis in Axis::ALL {
        table.assign(member, axis, q[axis.index()], Priority::Collinear);
    }
}
