use std::collections::BTreeSet;

use slotmap::{DenseSlotMap, SecondaryMap};

use crate::{
    Axis, Constraint, ConstraintKey, ConstraintKind, GraphError, Line, LineKey, Observation, Plane,
    PlaneDefinition, PlaneKey, PointKey, VanishingLine, ViewKey, Viewpoint, WorldPoint,
};

/// The single owning container for all reconstruction entities.
///
/// Entities reference each other only through keys. The graph maintains
/// reverse indices (point → touching constraints and lines) and a dirty-point
/// set: every structural or locked-value mutation marks the affected points
/// dirty, and the propagator later recomputes exactly the dirty closure.
///
/// Mutations that would leave a dangling or degenerate reference are rejected
/// with a [`GraphError`] and change nothing. Deleting an entity cascades
/// deletion of every constraint that references it.
#[derive(Default)]
pub struct SceneGraph {
    pub points: DenseSlotMap<PointKey, WorldPoint>,
    pub lines: DenseSlotMap<LineKey, Line>,
    pub planes: DenseSlotMap<PlaneKey, Plane>,
    pub views: DenseSlotMap<ViewKey, Viewpoint>,
    pub constraints: DenseSlotMap<ConstraintKey, Constraint>,
    /// Constraint declaration order; the propagation tie-break.
    constraint_order: Vec<ConstraintKey>,
    /// Line declaration order.
    line_order: Vec<LineKey>,
    point_constraints: SecondaryMap<PointKey, BTreeSet<ConstraintKey>>,
    point_lines: SecondaryMap<PointKey, BTreeSet<LineKey>>,
    dirty: BTreeSet<PointKey>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constraints in declaration order.
    pub fn constraint_order(&self) -> &[ConstraintKey] {
        &self.constraint_order
    }

    /// Lines in declaration order.
    pub fn line_order(&self) -> &[LineKey] {
        &self.line_order
    }

    /// Points currently marked dirty.
    pub fn dirty(&self) -> &BTreeSet<PointKey> {
        &self.dirty
    }

    /// Takes and clears the dirty set; the propagator's entry point.
    pub fn take_dirty(&mut self) -> BTreeSet<PointKey> {
        std::mem::take(&mut self.dirty)
    }

    /// Marks a point (and thus its dependents, via closure expansion at
    /// propagation time) as needing re-inference.
    pub fn mark_dirty(&mut self, point: PointKey) {
        if self.points.contains_key(point) {
            self.dirty.insert(point);
        }
    }

    pub fn mark_all_dirty(&mut self) {
        let keys: Vec<PointKey> = self.points.keys().collect();
        self.dirty.extend(keys);
    }

    // ---- points ----

    pub fn add_point(&mut self, point: WorldPoint) -> PointKey {
        let key = self.points.insert(point);
        self.point_constraints.insert(key, BTreeSet::new());
        self.point_lines.insert(key, BTreeSet::new());
        self.dirty.insert(key);
        key
    }

    /// Sets or clears the locked value of one axis.
    ///
    /// Any change to geometry invalidates the point's optimized position and
    /// marks it dirty for re-inference.
    pub fn set_locked(
        &mut self,
        key: PointKey,
        axis: Axis,
        value: Option<f64>,
    ) -> Result<(), GraphError> {
        let point = self.points.get_mut(key).ok_or(GraphError::UnknownPoint(key))?;
        point.locked[axis.index()] = value;
        point.clear_optimized();
        self.dirty.insert(key);
        Ok(())
    }

    /// Removes a point, cascading removal of every constraint, line, plane
    /// and observation that references it.
    pub fn remove_point(&mut self, key: PointKey) -> Result<WorldPoint, GraphError> {
        if !self.points.contains_key(key) {
            return Err(GraphError::UnknownPoint(key));
        }

        for ckey in self.constraints_on(key).collect::<Vec<_>>() {
            self.remove_constraint(ckey).ok();
        }

        // Lines with this endpoint die; lines merely listing it as collinear
        // keep their endpoints and drop the member.
        for lkey in self.lines_on(key).collect::<Vec<_>>() {
            let line = &self.lines[lkey];
            if line.a == key || line.b == key {
                self.remove_line(lkey).ok();
            } else {
                for p in self.lines[lkey].points().collect::<Vec<_>>() {
                    self.dirty.insert(p);
                }
                let line = &mut self.lines[lkey];
                line.collinear.retain(|&p| p != key);
                self.point_lines[key].remove(&lkey);
            }
        }

        for pkey in self.planes.keys().collect::<Vec<_>>() {
            if self
                .plane_points(pkey)
                .map(|pts| pts.contains(&key))
                .unwrap_or(false)
            {
                self.remove_plane(pkey).ok();
            }
        }

        for view in self.views.values_mut() {
            view.observations.retain(|o| o.point != key);
        }

        self.point_constraints.remove(key);
        self.point_lines.remove(key);
        self.dirty.remove(&key);
        Ok(self.points.remove(key).expect("presence checked above"))
    }

    // ---- lines ----

    pub fn add_line(&mut self, line: Line) -> Result<LineKey, GraphError> {
        if line.a == line.b {
            return Err(GraphError::DegenerateLine);
        }
        for p in line.points() {
            if !self.points.contains_key(p) {
                return Err(GraphError::UnknownPoint(p));
            }
        }
        let participants: Vec<PointKey> = line.points().collect();
        let key = self.lines.insert(line);
        self.line_order.push(key);
        for p in participants {
            self.point_lines[p].insert(key);
            self.dirty.insert(p);
        }
        Ok(key)
    }

    pub fn remove_line(&mut self, key: LineKey) -> Result<Line, GraphError> {
        if !self.lines.contains_key(key) {
            return Err(GraphError::UnknownLine(key));
        }

        for ckey in self.constraint_order.clone() {
            if self.constraints[ckey].references_line(key) {
                self.remove_constraint(ckey).ok();
            }
        }
        for pkey in self.planes.keys().collect::<Vec<_>>() {
            let uses = match self.planes[pkey].definition {
                PlaneDefinition::TwoLines(la, lb) => la == key || lb == key,
                PlaneDefinition::LinePoint(l, _) => l == key,
                PlaneDefinition::ThreePoints(..) => false,
            };
            if uses {
                self.remove_plane(pkey).ok();
            }
        }

        let line = self.lines.remove(key).expect("presence checked above");
        for p in line.points() {
            if let Some(set) = self.point_lines.get_mut(p) {
                set.remove(&key);
            }
            self.dirty.insert(p);
        }
        self.line_order.retain(|&k| k != key);
        Ok(line)
    }

    /// Declares an extra collinear member on a line.
    pub fn add_collinear_point(&mut self, line: LineKey, point: PointKey) -> Result<(), GraphError> {
        if !self.points.contains_key(point) {
            return Err(GraphError::UnknownPoint(point));
        }
        let l = self.lines.get_mut(line).ok_or(GraphError::UnknownLine(line))?;
        if !l.collinear.contains(&point) && l.a != point && l.b != point {
            l.collinear.push(point);
            self.point_lines[point].insert(line);
        }
        for p in self.lines[line].points().collect::<Vec<_>>() {
            self.dirty.insert(p);
        }
        Ok(())
    }

    // ---- planes ----

    pub fn add_plane(&mut self, plane: Plane) -> Result<PlaneKey, GraphError> {
        match plane.definition {
            PlaneDefinition::ThreePoints(a, b, c) => {
                for p in [a, b, c] {
                    if !self.points.contains_key(p) {
                        return Err(GraphError::UnknownPoint(p));
                    }
                }
                if a == b || a == c || b == c {
                    return Err(GraphError::DuplicateParticipants {
                        kind: ConstraintKind::Coplanar,
                    });
                }
            }
            PlaneDefinition::TwoLines(la, lb) => {
                for l in [la, lb] {
                    if !self.lines.contains_key(l) {
                        return Err(GraphError::UnknownLine(l));
                    }
                }
                if la == lb {
                    return Err(GraphError::DuplicateLines {
                        kind: ConstraintKind::Coplanar,
                    });
                }
            }
            PlaneDefinition::LinePoint(l, p) => {
                if !self.lines.contains_key(l) {
                    return Err(GraphError::UnknownLine(l));
                }
                if !self.points.contains_key(p) {
                    return Err(GraphError::UnknownPoint(p));
                }
            }
        }
        Ok(self.planes.insert(plane))
    }

    pub fn remove_plane(&mut self, key: PlaneKey) -> Result<Plane, GraphError> {
        self.planes.remove(key).ok_or(GraphError::UnknownPlane(key))
    }

    /// The world points a plane's definition resolves to, deduplicated in
    /// declaration order.
    pub fn plane_points(&self, key: PlaneKey) -> Result<Vec<PointKey>, GraphError> {
        let plane = self.planes.get(key).ok_or(GraphError::UnknownPlane(key))?;
        let raw: Vec<PointKey> = match plane.definition {
            PlaneDefinition::ThreePoints(a, b, c) => vec![a, b, c],
            PlaneDefinition::TwoLines(la, lb) => {
                let la = self.lines.get(la).ok_or(GraphError::UnknownLine(la))?;
                let lb = self.lines.get(lb).ok_or(GraphError::UnknownLine(lb))?;
                vec![la.a, la.b, lb.a, lb.b]
            }
            PlaneDefinition::LinePoint(l, p) => {
                let l = self.lines.get(l).ok_or(GraphError::UnknownLine(l))?;
                vec![l.a, l.b, p]
            }
        };
        let mut seen = BTreeSet::new();
        Ok(raw.into_iter().filter(|p| seen.insert(*p)).collect())
    }

    // ---- viewpoints ----

    pub fn add_view(&mut self, view: Viewpoint) -> ViewKey {
        self.views.insert(view)
    }

    pub fn remove_view(&mut self, key: ViewKey) -> Result<Viewpoint, GraphError> {
        if !self.views.contains_key(key) {
            return Err(GraphError::UnknownView(key));
        }
        for ckey in self.constraint_order.clone() {
            if self.constraints[ckey].view() == Some(key) {
                self.remove_constraint(ckey).ok();
            }
        }
        Ok(self.views.remove(key).expect("presence checked above"))
    }

    pub fn add_observation(
        &mut self,
        view: ViewKey,
        observation: Observation,
    ) -> Result<(), GraphError> {
        if !self.points.contains_key(observation.point) {
            return Err(GraphError::UnknownPoint(observation.point));
        }
        let v = self.views.get_mut(view).ok_or(GraphError::UnknownView(view))?;
        v.observations.push(observation);
        Ok(())
    }

    pub fn add_vanishing_line(
        &mut self,
        view: ViewKey,
        line: VanishingLine,
    ) -> Result<(), GraphError> {
        let v = self.views.get_mut(view).ok_or(GraphError::UnknownView(view))?;
        v.vanishing_lines.push(line);
        Ok(())
    }

    // ---- constraints ----

    /// Structural admissibility of a constraint against the current graph:
    /// every referenced entity exists, participants are distinct, and minimum
    /// participant counts hold.
    pub fn check_constraint(&self, constraint: &Constraint) -> Result<(), GraphError> {
        let kind = constraint.kind();
        for p in constraint.points() {
            if !self.points.contains_key(p) {
                return Err(GraphError::UnknownPoint(p));
            }
        }
        for l in constraint.lines() {
            if !self.lines.contains_key(l) {
                return Err(GraphError::UnknownLine(l));
            }
        }
        if let Some(v) = constraint.view() {
            if !self.views.contains_key(v) {
                return Err(GraphError::UnknownView(v));
            }
        }

        let distinct = |points: &[PointKey]| {
            points.iter().collect::<BTreeSet<_>>().len() == points.len()
        };
        match constraint {
            Constraint::FixedPoint { xyz, .. } => {
                if xyz.iter().all(|v| v.is_none()) {
                    return Err(GraphError::EmptyFixedPoint);
                }
                if xyz.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(GraphError::InvalidValue);
                }
            }
            Constraint::Distance { a, b, value } => {
                if a == b {
                    return Err(GraphError::DuplicateParticipants { kind });
                }
                if !value.is_finite() || *value < 0.0 {
                    return Err(GraphError::InvalidValue);
                }
            }
            Constraint::Angle {
                vertex, a, c, radians,
            } => {
                if !distinct(&[*vertex, *a, *c]) {
                    return Err(GraphError::DuplicateParticipants { kind });
                }
                if !radians.is_finite() {
                    return Err(GraphError::InvalidValue);
                }
            }
            Constraint::Collinear { points } => {
                if points.len() < 3 {
                    return Err(GraphError::NotEnoughPoints {
                        kind,
                        required: 3,
                        actual: points.len(),
                    });
                }
                if !distinct(points) {
                    return Err(GraphError::DuplicateParticipants { kind });
                }
            }
            Constraint::Coplanar { points } => {
                if points.len() < 4 {
                    return Err(GraphError::NotEnoughPoints {
                        kind,
                        required: 4,
                        actual: points.len(),
                    });
                }
                if !distinct(points) {
                    return Err(GraphError::DuplicateParticipants { kind });
                }
            }
            Constraint::ParallelLines { a, b } | Constraint::PerpendicularLines { a, b } => {
                if a == b {
                    return Err(GraphError::DuplicateLines { kind });
                }
            }
            Constraint::EqualDistances { pairs } => {
                if pairs.len() < 2 {
                    return Err(GraphError::NotEnoughPoints {
                        kind,
                        required: 2,
                        actual: pairs.len(),
                    });
                }
                if pairs.iter().any(|(a, b)| a == b) {
                    return Err(GraphError::DuplicateParticipants { kind });
                }
            }
            Constraint::EqualAngles { triplets } => {
                if triplets.len() < 2 {
                    return Err(GraphError::NotEnoughPoints {
                        kind,
                        required: 2,
                        actual: triplets.len(),
                    });
                }
                if triplets.iter().any(|(v, a, c)| !distinct(&[*v, *a, *c])) {
                    return Err(GraphError::DuplicateParticipants { kind });
                }
            }
            Constraint::Projection { u, v, sigma, .. } => {
                if !u.is_finite() || !v.is_finite() || !sigma.is_finite() || *sigma <= 0.0 {
                    return Err(GraphError::InvalidValue);
                }
            }
        }
        Ok(())
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<ConstraintKey, GraphError> {
        self.check_constraint(&constraint)?;
        let participants = constraint.points();
        let key = self.constraints.insert(constraint);
        self.constraint_order.push(key);
        for p in participants {
            self.point_constraints[p].insert(key);
            self.dirty.insert(p);
        }
        Ok(key)
    }

    pub fn remove_constraint(&mut self, key: ConstraintKey) -> Result<Constraint, GraphError> {
        let constraint = self
            .constraints
            .remove(key)
            .ok_or(GraphError::UnknownConstraint(key))?;
        for p in constraint.points() {
            if let Some(set) = self.point_constraints.get_mut(p) {
                set.remove(&key);
            }
            self.dirty.insert(p);
        }
        self.constraint_order.retain(|&k| k != key);
        Ok(constraint)
    }

    // ---- relation queries ----

    /// Constraints that reference a point, in declaration order.
    pub fn constraints_on(&self, point: PointKey) -> impl Iterator<Item = ConstraintKey> + '_ {
        let set = self.point_constraints.get(point);
        self.constraint_order
            .iter()
            .copied()
            .filter(move |k| set.map(|s| s.contains(k)).unwrap_or(false))
    }

    /// Lines that use a point as an endpoint or collinear member, in
    /// declaration order.
    pub fn lines_on(&self, point: PointKey) -> impl Iterator<Item = LineKey> + '_ {
        let set = self.point_lines.get(point);
        self.line_order
            .iter()
            .copied()
            .filter(move |k| set.map(|s| s.contains(k)).unwrap_or(false))
    }

    /// Lines declaring a point collinear without it being an endpoint. This
    /// replaces the stored back-reference set of the interactive system.
    pub fn collinear_lines_of(&self, point: PointKey) -> impl Iterator<Item = LineKey> + '_ {
        self.lines_on(point)
            .filter(move |&l| self.lines[l].collinear.contains(&point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConstraintStatus;

    fn graph_with_two_points() -> (SceneGraph, PointKey, PointKey) {
        let mut g = SceneGraph::new();
        let a = g.add_point(WorldPoint::locked_at(0.0, 0.0, 0.0));
        let b = g.add_point(WorldPoint::free());
        (g, a, b)
    }

    #[test]
    fn degenerate_line_is_rejected() {
        let (mut g, a, _) = graph_with_two_points();
        assert_eq!(g.add_line(Line::new(a, a)), Err(GraphError::DegenerateLine));
    }

    #[test]
    fn dangling_constraint_is_rejected() {
        let (mut g, a, b) = graph_with_two_points();
        g.remove_point(b).unwrap();
        let c = Constraint::Distance { a, b, value: 1.0 };
        assert_eq!(g.add_constraint(c), Err(GraphError::UnknownPoint(b)));
    }

    #[test]
    fn coplanar_requires_four_distinct_points() {
        let (mut g, a, b) = graph_with_two_points();
        let c = g.add_point(WorldPoint::free());
        let short = Constraint::Coplanar {
            points: vec![a, b, c],
        };
        assert!(matches!(
            g.add_constraint(short),
            Err(GraphError::NotEnoughPoints { required: 4, .. })
        ));
        let dup = Constraint::Coplanar {
            points: vec![a, b, c, a],
        };
        assert!(matches!(
            g.add_constraint(dup),
            Err(GraphError::DuplicateParticipants { .. })
        ));
    }

    #[test]
    fn removing_a_point_cascades() {
        let (mut g, a, b) = graph_with_two_points();
        let c = g.add_point(WorldPoint::free());
        let line = g.add_line(Line::new(a, b)).unwrap();
        g.add_collinear_point(line, c).unwrap();
        let d = g
            .add_constraint(Constraint::Distance { a, b, value: 2.0 })
            .unwrap();

        g.remove_point(b).unwrap();
        assert!(!g.lines.contains_key(line));
        assert!(!g.constraints.contains_key(d));
        // The collinear member survives the line it was attached to.
        assert!(g.points.contains_key(c));
        assert!(g.dirty().contains(&a));
    }

    #[test]
    fn mutation_marks_dirty_and_clears_optimized() {
        let (mut g, a, _) = graph_with_two_points();
        g.points[a].optimized = Some([1.0, 1.0, 1.0]);
        g.take_dirty();
        g.set_locked(a, Axis::Y, Some(5.0)).unwrap();
        assert!(g.dirty().contains(&a));
        assert_eq!(g.points[a].optimized, None);
        assert_eq!(g.points[a].status(), ConstraintStatus::Partial);
    }

    #[test]
    fn relation_indices_track_membership() {
        let (mut g, a, b) = graph_with_two_points();
        let c = g.add_point(WorldPoint::free());
        let line = g.add_line(Line::new(a, b)).unwrap();
        g.add_collinear_point(line, c).unwrap();
        let ckey = g
            .add_constraint(Constraint::Collinear {
                points: vec![a, b, c],
            })
            .unwrap();

        assert_eq!(g.constraints_on(c).collect::<Vec<_>>(), vec![ckey]);
        assert_eq!(g.lines_on(c).collect::<Vec<_>>(), vec![line]);
        assert_eq!(g.collinear_lines_of(c).collect::<Vec<_>>(), vec![line]);
        assert_eq!(g.collinear_lines_of(a).count(), 0);

        g.remove_constraint(ckey).unwrap();
        assert_eq!(g.constraints_on(c).count(), 0);
    }
}
