//! The MSGS collection: an antichain of reached soft-goal subsets, partitioned by
//! cardinality, plus the reachable-subset pruning rule that consults it.

use crate::eval::Estimate;
use crate::state::{Fact, State};
use mugs_collections::{minimal_hitting_sets, GoalSubset};

/// Maintains the inclusion-antichain of soft-goal subsets reached (jointly with all hard goals)
/// so far, and dualizes it into the Minimal Unsolvable Goal Subsets on demand.
///
/// `W` is an opaque witness recorded alongside the best subset seen (typically a `StateId` from
/// the driver's state registry); the collection itself never needs to interpret it.
pub struct MsgsCollection<W> {
    hard_goals: Vec<Fact>,
    soft_goals: Vec<Fact>,
    width: u8,
    /// `buckets[k]` holds every recorded subset of cardinality `k`, ascending.
    buckets: Vec<Vec<GoalSubset>>,
    size: usize,
    initialized: bool,
    /// Highest-cardinality subset tracked so far (ties broken by insertion order: a later subset
    /// of equal cardinality replaces the previous best).
    best: Option<(GoalSubset, W)>,
    /// Set the first time `track` observes a state satisfying every hard goal. Distinguishes "no
    /// soft goals are reachable" from "hard goals themselves are never reachable", which makes
    /// MUGS extraction vacuous (see `get_mugs`).
    hard_ever_satisfied: bool,
    /// The subset most recently accepted by `add`, for callers (e.g. anytime output) that need
    /// the contents of what `track`/`prune` just reported as newly added.
    last_added: Option<GoalSubset>,
    pruned_states: u64,
    states_since_last_addition: u64,
}

impl<W> MsgsCollection<W> {
    /// `initialize(task)`: reads the goal partition, inserts the empty subset, starts counters.
    pub fn new(hard_goals: Vec<Fact>, soft_goals: Vec<Fact>) -> Self {
        let width = soft_goals.len() as u8;
        assert!(width <= GoalSubset::MAX_WIDTH, "soft-goal count exceeds the 64-bit cap");
        let mut buckets = vec![Vec::new(); width as usize + 1];
        buckets[0].push(GoalSubset::empty(width));
        MsgsCollection {
            hard_goals,
            soft_goals,
            width,
            buckets,
            size: 1,
            initialized: true,
            best: None,
            hard_ever_satisfied: false,
            last_added: None,
            pruned_states: 0,
            states_since_last_addition: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn pruned_states(&self) -> u64 {
        self.pruned_states
    }

    pub fn states_since_last_addition(&self) -> u64 {
        self.states_since_last_addition
    }

    pub fn last_added(&self) -> Option<GoalSubset> {
        self.last_added
    }

    pub fn best(&self) -> Option<&(GoalSubset, W)> {
        self.best.as_ref()
    }

    /// Whether some processed state has ever satisfied every hard goal (see [`Self::get_mugs`]).
    pub fn hard_ever_satisfied(&self) -> bool {
        self.hard_ever_satisfied
    }

    /// Overrides the hard-ever-satisfied flag directly, for callers that merge in a solvability
    /// verdict computed elsewhere (the iterated driver transfers a sub-search's verdict onto the
    /// accumulating per-relaxed-task collection, which otherwise only ever sees `add`, never
    /// `track`).
    pub fn set_hard_ever_satisfied(&mut self, value: bool) {
        self.hard_ever_satisfied = self.hard_ever_satisfied || value;
    }

    /// Iterates every recorded subset, ascending by cardinality.
    pub fn iter(&self) -> impl Iterator<Item = &GoalSubset> {
        self.buckets.iter().flatten()
    }

    /// `contains_superset(subset)`: linear scan over buckets of equal-or-greater cardinality,
    /// short-circuiting on the first superset found.
    pub fn contains_superset(&self, subset: &GoalSubset) -> bool {
        let card = subset.card() as usize;
        self.buckets[card..].iter().any(|bucket| bucket.iter().any(|s| s.is_superset_of(subset)))
    }

    /// `add(subset)`: insert into the appropriate cardinality bucket, then minimize non-maximal
    /// elements. Idempotent: re-adding an already-covered subset is a no-op and fires no callback.
    pub fn add(&mut self, subset: GoalSubset) -> bool {
        self.add_and_minimize(subset, |_| {})
    }

    /// Same as [`Self::add`], but every element removed from a smaller-cardinality bucket because
    /// it became a strict subset of `subset` is reported to `on_removed`.
    pub fn add_and_minimize(&mut self, subset: GoalSubset, mut on_removed: impl FnMut(GoalSubset)) -> bool {
        let card = subset.card() as usize;
        // If an existing subset of equal-or-greater cardinality already dominates (or duplicates)
        // this one, there is nothing to do: antichain already covers it.
        if self.buckets[card..].iter().any(|bucket| bucket.iter().any(|s| s.is_superset_of(&subset))) {
            return false;
        }
        for bucket in &mut self.buckets[..card] {
            let before = bucket.len();
            bucket.retain(|&existing| {
                let dominated = subset.is_strict_superset_of(&existing);
                if dominated {
                    on_removed(existing);
                }
                !dominated
            });
            self.size -= before - bucket.len();
        }
        self.buckets[card].push(subset);
        self.size += 1;
        self.last_added = Some(subset);
        self.states_since_last_addition = 0;
        true
    }

    fn satisfied(state: &State, goals: &[Fact]) -> GoalSubset {
        let mut subset = GoalSubset::empty(goals.len() as u8);
        for (i, &f) in goals.iter().enumerate() {
            if state.entails(f) {
                subset.insert(i as u8);
            }
        }
        subset
    }

    pub fn satisfied_hard(&self, state: &State) -> GoalSubset {
        Self::satisfied(state, &self.hard_goals)
    }

    pub fn satisfied_soft(&self, state: &State) -> GoalSubset {
        Self::satisfied(state, &self.soft_goals)
    }

    fn update_best(&mut self, subset: GoalSubset, witness: W) {
        let replace = match &self.best {
            None => true,
            Some((prev, _)) => subset.card() >= prev.card(),
        };
        if replace {
            self.best = Some((subset, witness));
        }
    }

    /// `track(state)`: if every hard goal is satisfied and no recorded subset already dominates
    /// the satisfied soft goals, records them as a new MSGS and returns `true`.
    pub fn track(&mut self, state: &State, witness: W) -> bool {
        self.states_since_last_addition += 1;
        let sh = self.satisfied_hard(state);
        if !sh.is_full() {
            return false;
        }
        self.hard_ever_satisfied = true;
        let ss = self.satisfied_soft(state);
        if self.contains_superset(&ss) {
            return false;
        }
        self.add(ss);
        self.update_best(ss, witness);
        true
    }

    /// `prune(state, per_fact_cost, remaining_budget)`: `true` iff the state can be safely
    /// skipped. `remaining_budget = None` stands for an unbounded (`B = ∞`) search.
    pub fn prune(
        &mut self,
        state: &State,
        witness: W,
        per_fact_cost: impl Fn(Fact) -> Estimate,
        remaining_budget: Option<u32>,
    ) -> bool {
        let reachable = |fact: Fact| match per_fact_cost(fact) {
            None => false,
            Some(cost) => match remaining_budget {
                None => true,
                Some(budget) => cost < budget,
            },
        };

        if !self.hard_goals.iter().all(|&f| reachable(f)) {
            self.pruned_states += 1;
            return true;
        }

        let mut reachable_soft = GoalSubset::empty(self.width);
        for (i, &f) in self.soft_goals.iter().enumerate() {
            if reachable(f) {
                reachable_soft.insert(i as u8);
            }
        }
        if self.contains_superset(&reachable_soft) {
            self.pruned_states += 1;
            return true;
        }

        self.track(state, witness);
        false
    }

    /// `get_mugs()`: dualizes the recorded MSGS family into the Minimal Unsolvable Goal Subsets.
    ///
    /// Returns an empty list if the hard goals were never once satisfied by any processed state:
    /// in that degenerate case the problem is unsolvable even with every soft goal dropped, and
    /// MUGS reporting (which presumes the hard-goal-only subset is the trivially solvable base
    /// case) is vacuous.
    pub fn get_mugs(&self) -> Vec<GoalSubset> {
        if !self.hard_ever_satisfied {
            return Vec::new();
        }
        let complements: Vec<GoalSubset> = self.iter().map(|s| s.complement()).collect();
        minimal_hitting_sets(&complements, self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{VarId, Variable, World};

    fn two_soft_goals() -> (World, Fact, Fact) {
        let world = World::new(vec![
            Variable {
                name: "g1".into(),
                domain: vec!["no".into(), "yes".into()],
            },
            Variable {
                name: "g2".into(),
                domain: vec!["no".into(), "yes".into()],
            },
        ]);
        let g1 = Fact::new(VarId::from(0), 1);
        let g2 = Fact::new(VarId::from(1), 1);
        (world, g1, g2)
    }

    #[test]
    fn idempotent_add() {
        let mut msgs: MsgsCollection<()> = MsgsCollection::new(vec![], vec![Fact::new(VarId::from(0), 1)]);
        let s = GoalSubset::singleton(0, 1);
        assert!(msgs.add(s));
        assert!(!msgs.add(s), "re-adding an already-recorded subset must be a no-op");
        assert_eq!(msgs.len(), 1); // {} was dominated and dropped, leaving only {0}
    }

    #[test]
    fn add_discards_strict_subset_of_existing() {
        let mut msgs: MsgsCollection<()> = MsgsCollection::new(
            vec![],
            vec![Fact::new(VarId::from(0), 1), Fact::new(VarId::from(1), 1)],
        );
        let full = GoalSubset::from_bits(0b11, 2);
        assert!(msgs.add(full));
        let singleton = GoalSubset::singleton(0, 2);
        assert!(!msgs.add(singleton), "a strict subset of an existing element must be discarded");
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn add_removes_dominated_smaller_elements() {
        let mut msgs: MsgsCollection<()> = MsgsCollection::new(
            vec![],
            vec![Fact::new(VarId::from(0), 1), Fact::new(VarId::from(1), 1)],
        );
        let singleton = GoalSubset::singleton(0, 2);
        assert!(msgs.add(singleton));
        let mut removed = Vec::new();
        let full = GoalSubset::from_bits(0b11, 2);
        assert!(msgs.add_and_minimize(full, |s| removed.push(s)));
        assert_eq!(removed, vec![singleton]);
        assert_eq!(msgs.len(), 1); // only the full set remains (the initial `{}` was dominated too)
    }

    #[test]
    fn track_builds_antichain_for_independent_soft_goals() {
        let (world, g1, g2) = two_soft_goals();
        let mut msgs: MsgsCollection<u32> = MsgsCollection::new(vec![], vec![g1, g2]);

        let mut s1 = world.make_initial_state();
        s1.set(g1);
        assert!(msgs.track(&s1, 1));

        let mut s2 = world.make_initial_state();
        s2.set(g2);
        assert!(msgs.track(&s2, 2));

        // no element is a strict superset of another
        let subsets: Vec<GoalSubset> = msgs.iter().copied().collect();
        for a in &subsets {
            for b in &subsets {
                if a != b {
                    assert!(!a.is_strict_superset_of(b));
                }
            }
        }
        assert!(msgs.contains_superset(&GoalSubset::singleton(0, 2)));
        assert!(msgs.contains_superset(&GoalSubset::singleton(1, 2)));
        assert!(!msgs.contains_superset(&GoalSubset::from_bits(0b11, 2)));
    }

    #[test]
    fn mugs_vacuous_when_hard_goals_never_satisfied() {
        let world = World::new(vec![Variable {
            name: "h".into(),
            domain: vec!["no".into(), "yes".into()],
        }]);
        let hard = Fact::new(VarId::from(0), 1);
        let soft = Fact::new(VarId::from(0), 1); // placeholder, never reached since hard is never satisfied
        let mut msgs: MsgsCollection<()> = MsgsCollection::new(vec![hard], vec![soft]);
        // no track() call ever succeeds: `hard_ever_satisfied` stays false
        let _ = msgs.prune(
            &world.make_initial_state(),
            (),
            |_| None, // nothing reachable
            Some(10),
        );
        assert_eq!(msgs.get_mugs(), Vec::new());
    }

    #[test]
    fn mugs_dualizes_msgs_family() {
        let (world, g1, g2) = two_soft_goals();
        let mut msgs: MsgsCollection<()> = MsgsCollection::new(vec![], vec![g1, g2]);
        let mut s1 = world.make_initial_state();
        s1.set(g1);
        assert!(msgs.track(&s1, ()));
        let mut s2 = world.make_initial_state();
        s2.set(g2);
        assert!(msgs.track(&s2, ()));
        let mugs = msgs.get_mugs();
        assert_eq!(mugs.len(), 1);
        assert_eq!(mugs[0], GoalSubset::from_bits(0b11, 2));
    }

    #[test]
    fn prune_true_when_hard_goal_unreachable() {
        let world = World::new(vec![Variable {
            name: "h".into(),
            domain: vec!["no".into(), "yes".into()],
        }]);
        let hard = Fact::new(VarId::from(0), 1);
        let mut msgs: MsgsCollection<()> = MsgsCollection::new(vec![hard], vec![]);
        let pruned = msgs.prune(&world.make_initial_state(), (), |_| None, Some(5));
        assert!(pruned);
        assert_eq!(msgs.pruned_states(), 1);
    }
}
