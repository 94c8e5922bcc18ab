//! # Page Break Decisions
//!
//! Given the space left on a page and the heights of a block's splittable
//! units (lines or table rows), decide whether the block is placed whole,
//! split after some unit, or moved to the next page.

/// Heights that agree to within this many points are treated as equal, so
/// a block that fits exactly is never deferred by rounding noise.
pub const FIT_EPSILON: f64 = 1e-6;

/// Does `height` fit into `remaining`? Exact fits count.
pub fn fits(height: f64, remaining: f64) -> bool {
    height <= remaining + FIT_EPSILON
}

/// What to do with a block at the current cursor position.
#[derive(Debug, Clone, PartialEq)]
pub enum BreakDecision {
    /// Place every remaining unit on the current page.
    Place,
    /// Move the whole remainder to the next page.
    MoveToNextPage,
    /// Place the first `units_on_current_page` units here, continue on the next page.
    Split { units_on_current_page: usize },
}

/// Decide how a block with the given unit heights meets the page bottom.
///
/// A split keeps as many units as fit. A lone unit is never split.
pub fn decide_break(remaining_height: f64, unit_heights: &[f64]) -> BreakDecision {
    let total: f64 = unit_heights.iter().sum();
    if fits(total, remaining_height) {
        return BreakDecision::Place;
    }

    if unit_heights.len() < 2 {
        return BreakDecision::MoveToNextPage;
    }

    let mut running = 0.0;
    let mut fit_count = 0;
    for &h in unit_heights {
        if !fits(running + h, remaining_height) {
            break;
        }
        running += h;
        fit_count += 1;
    }

    if fit_count == 0 {
        return BreakDecision::MoveToNextPage;
    }

    BreakDecision::Split {
        units_on_current_page: fit_count,
    }
}

/// Pull a split back so it doesn't strand the opening of a run at the
/// bottom of a page.
///
/// `runs[i]` names the run (paragraph or list item) unit `i` belongs to;
/// runs are contiguous. The fragment being placed starts at unit `start`
/// and the proposed split is before unit `split`. If the run cut by the
/// split began inside this fragment with fewer than `min_units` units, the
/// split moves back to that run's first unit. Returns the new split, which
/// equals `start` when nothing may stay on the page.
pub fn avoid_orphans(runs: &[usize], start: usize, split: usize, min_units: usize) -> usize {
    if split == 0 || split >= runs.len() {
        return split;
    }
    let run = runs[split - 1];
    if runs[split] != run {
        return split;
    }
    let run_start = runs[..split]
        .iter()
        .position(|r| *r == run)
        .unwrap_or(0);
    if run_start < start || split - run_start >= min_units {
        split
    } else {
        run_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_fits() {
        let decision = decide_break(90.0, &[20.0, 30.0, 40.0]);
        assert_eq!(decision, BreakDecision::Place);
    }

    #[test]
    fn exact_fit_with_rounding_noise_is_placed() {
        let units = [0.1; 10];
        assert_eq!(decide_break(1.0, &units), BreakDecision::Place);
    }

    #[test]
    fn single_unit_never_splits() {
        assert_eq!(decide_break(10.0, &[20.0]), BreakDecision::MoveToNextPage);
    }

    #[test]
    fn split_at_last_unit_that_fits() {
        let decision = decide_break(55.0, &[20.0, 30.0, 40.0]);
        assert_eq!(
            decision,
            BreakDecision::Split {
                units_on_current_page: 2,
            }
        );
    }

    #[test]
    fn nothing_fits() {
        assert_eq!(
            decide_break(5.0, &[20.0, 20.0]),
            BreakDecision::MoveToNextPage
        );
    }

    #[test]
    fn single_run_orphan_moves_everything() {
        // One paragraph, only its first line would stay.
        assert_eq!(avoid_orphans(&[0, 0, 0], 0, 1, 2), 0);
        assert_eq!(avoid_orphans(&[0, 0, 0], 0, 2, 2), 2);
    }

    #[test]
    fn orphan_pulled_back_to_run_boundary() {
        // Item 0 is complete; item 1 would leave one line behind.
        assert_eq!(avoid_orphans(&[0, 1, 1, 1], 0, 2, 2), 1);
    }

    #[test]
    fn split_on_run_boundary_is_kept() {
        assert_eq!(avoid_orphans(&[0, 0, 1, 1], 0, 2, 2), 2);
    }

    #[test]
    fn continued_run_is_not_an_orphan() {
        // The run started on an earlier page; this fragment begins at unit 2.
        assert_eq!(avoid_orphans(&[0, 0, 0, 0], 2, 3, 2), 3);
    }
}
