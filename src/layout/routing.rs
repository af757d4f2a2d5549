use log::debug;

use crate::config::LayoutConfig;

use super::emit::row_y;
use super::{
    ChildDrop, ConstrainedModel, Connection, PersonId, RoutedModel, Segment, SpouseLine,
    StaircaseKind, StaircaseViolation, Union,
};

// ── Connector geometry ──────────────────────────────────────────────
/// Fraction of vertical_gap between a parent row's card bottom and its bus.
const BUS_DROP_RATIO: f32 = 0.5;
/// Fraction of card_height at which spouse lines and couple stems leave the row.
const SPOUSE_LINE_RATIO: f32 = 0.5;

// ── Staircase detection ─────────────────────────────────────────────
/// Fraction of horizontal_gap a lone child's drop may drift from the stem,
/// and how far the stem may sit outside the children span.
const STAIRCASE_TOLERANCE_RATIO: f32 = 0.5;

struct RouteContext<'a> {
    constrained: &'a ConstrainedModel,
    config: &'a LayoutConfig,
}

impl RouteContext<'_> {
    fn card_center(&self, person: PersonId) -> f32 {
        self.constrained.person_x[person.index()] + self.config.card_width / 2.0
    }

    fn person_row_y(&self, person: PersonId) -> f32 {
        let generations = self.constrained.generations();
        row_y(
            generations.person_generation(person),
            generations.min_gen,
            self.config,
        )
    }

    fn union_row_y(&self, union: &Union) -> f32 {
        let generations = self.constrained.generations();
        row_y(
            generations.union_generation(union.id),
            generations.min_gen,
            self.config,
        )
    }

    /// Whether the union point sits on a line between two cards.
    fn joins_two_cards(&self, union: &Union) -> bool {
        let blocks = &self.constrained.measured.blocks;
        union.is_couple() || (union.is_satellite() && blocks.block_of(union.id).is_satellite())
    }

    fn parents(&self, union: &Union) -> Vec<String> {
        let model = self.constrained.model();
        let mut keys: Vec<String> = union.partners().map(|p| model.key(p).to_string()).collect();
        if self.joins_two_cards(union)
            && let Some(co_parent) = union.co_parent
        {
            keys.push(model.key(co_parent).to_string());
        }
        keys
    }
}

// ── Parent-to-children connectors ───────────────────────────────────

fn route_union(ctx: &RouteContext<'_>, union: &Union) -> Connection {
    let config = ctx.config;
    let model = ctx.constrained.model();
    let ux = ctx.constrained.union_x[union.id.index()];
    let y = ctx.union_row_y(union);
    let stem_top = if ctx.joins_two_cards(union) {
        y + config.card_height * SPOUSE_LINE_RATIO
    } else {
        y + config.card_height
    };
    let bus_y = y + config.card_height + config.vertical_gap * BUS_DROP_RATIO;

    let mut lo = ux;
    let mut hi = ux;
    let mut drops = Vec::with_capacity(union.children.len());
    for child in &union.children {
        let cx = ctx.card_center(*child);
        lo = lo.min(cx);
        hi = hi.max(cx);
        drops.push(ChildDrop {
            child: model.key(*child).to_string(),
            segment: Segment::new(cx, bus_y, cx, ctx.person_row_y(*child)),
        });
    }

    Connection {
        union: union.id,
        partnership: union.source.clone(),
        parents: ctx.parents(union),
        stem: Segment::new(ux, stem_top, ux, bus_y),
        bus: Segment::new(lo, bus_y, hi, bus_y),
        drops,
    }
}

/// Flags connectors that cannot be drawn as a clean comb.
fn staircase_of(connection: &Connection, tolerance: f32) -> Option<StaircaseViolation> {
    let ux = connection.stem.x1;
    let violation = |kind, offset| StaircaseViolation {
        union: connection.union,
        partnership: connection.partnership.clone(),
        kind,
        offset,
    };
    if let [only] = connection.drops.as_slice() {
        let offset = only.segment.x1 - ux;
        return (offset.abs() > tolerance)
            .then(|| violation(StaircaseKind::OffsetSingleChild, offset));
    }
    let lo = connection.drops.iter().map(|d| d.segment.x1).fold(f32::INFINITY, f32::min);
    let hi = connection
        .drops
        .iter()
        .map(|d| d.segment.x1)
        .fold(f32::NEG_INFINITY, f32::max);
    if ux < lo - tolerance {
        Some(violation(StaircaseKind::StemOutsideSpan, ux - lo))
    } else if ux > hi + tolerance {
        Some(violation(StaircaseKind::StemOutsideSpan, ux - hi))
    } else {
        None
    }
}

// ── Spouse lines ────────────────────────────────────────────────────

fn spouse_line(ctx: &RouteContext<'_>, union: &Union) -> Option<SpouseLine> {
    let other = match (union.partner_b, union.co_parent) {
        (Some(b), _) => b,
        (None, Some(x)) if ctx.joins_two_cards(union) => x,
        _ => return None,
    };
    let model = ctx.constrained.model();
    let person_x = &ctx.constrained.person_x;
    let (left, right) = if person_x[union.partner_a.index()] <= person_x[other.index()] {
        (union.partner_a, other)
    } else {
        (other, union.partner_a)
    };
    Some(SpouseLine {
        union: union.id,
        partnership: union.source.clone(),
        from: model.key(left).to_string(),
        to: model.key(right).to_string(),
        status: union.status,
        x1: person_x[left.index()] + ctx.config.card_width,
        x2: person_x[right.index()],
        y: ctx.union_row_y(union) + ctx.config.card_height * SPOUSE_LINE_RATIO,
    })
}

/// Builds stem/bus/drop connectors and spouse lines in union order.
///
/// Routing never moves anything; staircase artifacts are reported so the
/// validator can surface them.
pub fn route_edges(constrained: &ConstrainedModel, config: &LayoutConfig) -> RoutedModel {
    let ctx = RouteContext {
        constrained,
        config,
    };
    let tolerance = config.horizontal_gap * STAIRCASE_TOLERANCE_RATIO;
    let mut connections = Vec::new();
    let mut spouse_lines = Vec::new();
    let mut staircases = Vec::new();
    for union in &constrained.model().unions {
        if let Some(line) = spouse_line(&ctx, union) {
            spouse_lines.push(line);
        }
        if union.children.is_empty() {
            continue;
        }
        let connection = route_union(&ctx, union);
        if let Some(staircase) = staircase_of(&connection, tolerance) {
            staircases.push(staircase);
        }
        connections.push(connection);
    }
    debug!(
        connections = connections.len(),
        spouse_lines = spouse_lines.len(),
        staircases = staircases.len();
        "Edges routed"
    );
    RoutedModel {
        constrained: constrained.clone(),
        connections,
        spouse_lines,
        staircases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SelectionOptions, SolverConfig};
    use crate::ir::{PartnershipStatus, StromData};
    use crate::layout::test_support::*;
    use crate::layout::{
        assign_generations, build_model, measure_subtrees, place_blocks, select_subgraph,
        solve_constraints,
    };
    use float_cmp::approx_eq;

    fn constrained_for(data: &StromData, focus: &str) -> ConstrainedModel {
        let config = LayoutConfig::default();
        let selection = select_subgraph(data, focus, &SelectionOptions::default());
        let generational = assign_generations(&build_model(data, &selection));
        let placed = place_blocks(&measure_subtrees(&generational, &config), &config);
        solve_constraints(&placed, &config, &SolverConfig::default())
    }

    #[test]
    fn couple_connector_has_stem_bus_and_drops() {
        let constrained = constrained_for(&nuclear_family(), "dad");
        let routed = route_edges(&constrained, &LayoutConfig::default());
        assert_eq!(routed.connections.len(), 1);
        let connection = &routed.connections[0];
        assert_eq!(connection.partnership, "u_parents");
        assert_eq!(connection.parents, vec!["dad", "mom"]);
        // Rows start at padding 20; couples leave at half card height.
        assert!(approx_eq!(f32, connection.stem.y1, 55.0));
        assert!(approx_eq!(f32, connection.stem.y2, 120.0));
        assert!(approx_eq!(f32, connection.bus.y1, 120.0));
        assert_eq!(connection.drops.len(), 2);
        for drop in &connection.drops {
            assert!(approx_eq!(f32, drop.segment.y2, 150.0));
            let x = drop.segment.x1;
            assert!(x >= connection.bus.min_x() && x <= connection.bus.max_x());
        }
        assert!(routed.staircases.is_empty());
    }

    #[test]
    fn single_parent_stem_starts_at_card_bottom() {
        let mut data = StromData::new();
        add_people(&mut data, &["solo", "kid"]);
        couple(&mut data, "u_solo", "solo", None, &["kid"]);
        let constrained = constrained_for(&data, "solo");
        let routed = route_edges(&constrained, &LayoutConfig::default());
        let connection = &routed.connections[0];
        assert!(approx_eq!(f32, connection.stem.y1, 90.0));
        assert!(approx_eq!(f32, connection.stem.x1, connection.drops[0].segment.x1));
        assert!(routed.spouse_lines.is_empty());
        assert!(routed.staircases.is_empty());
    }

    #[test]
    fn spouse_lines_join_inner_edges() {
        let mut data = nuclear_family();
        if let Some(p) = data.partnerships.get_mut("u_parents") {
            p.status = PartnershipStatus::Divorced;
        }
        let constrained = constrained_for(&data, "dad");
        let routed = route_edges(&constrained, &LayoutConfig::default());
        let line = &routed.spouse_lines[0];
        assert_eq!((line.from.as_str(), line.to.as_str()), ("dad", "mom"));
        assert!(approx_eq!(f32, line.x2 - line.x1, 12.0));
        assert!(approx_eq!(f32, line.y, 55.0));
        assert_eq!(line.status, PartnershipStatus::Divorced);
    }

    #[test]
    fn satellite_gets_its_own_spouse_line() {
        let constrained = constrained_for(&remarriage(), "x");
        let routed = route_edges(&constrained, &LayoutConfig::default());
        let pairs: Vec<(&str, &str)> = routed
            .spouse_lines
            .iter()
            .map(|l| (l.from.as_str(), l.to.as_str()))
            .collect();
        assert_eq!(pairs, vec![("x", "s1"), ("s2", "x")]);
        let satellite = routed
            .connections
            .iter()
            .find(|c| c.partnership == "u_second")
            .unwrap();
        assert_eq!(satellite.parents, vec!["s2", "x"]);
        assert!(routed.staircases.is_empty());
    }

    #[test]
    fn offset_lone_child_is_a_staircase() {
        let mut constrained = constrained_for(&nuclear_family(), "dad");
        let model = constrained.model().clone();
        let kid2 = model.lookup("kid2").unwrap();
        let union = model.union_of(model.lookup("dad").unwrap());
        constrained.measured.generational.model.unions[union.index()]
            .children
            .retain(|c| *c != kid2);
        let routed = route_edges(&constrained, &LayoutConfig::default());
        assert_eq!(routed.staircases.len(), 1);
        assert_eq!(routed.staircases[0].kind, StaircaseKind::OffsetSingleChild);
        assert!(routed.staircases[0].offset < 0.0);
    }
}
