//! Tree construction from a betting configuration.
//!
//! Expansion follows the abstraction rules: bet and raise amounts come
//! from the configured pot fractions, all-in is appended once when
//! enabled, per-street caps gate aggression, and a closed-form node
//! estimate rejects oversized configurations before anything allocates.

use crate::cards::Street;
use crate::error::SolverError;

use super::{to_centi, Action, Chips, GameTree, NodeId, TerminalKind, TreeNode};

/// Default ceiling on total tree nodes.
pub const DEFAULT_NODE_CEILING: u64 = 1_000_000;

/// User-configurable betting abstraction.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BettingConfig {
    /// Bet and raise sizes as fractions of the current pot, in order.
    pub bet_sizes: Vec<f64>,
    /// Cap on bets plus raises per street, indexed preflop..river.
    pub max_bets_per_street: [u8; 4],
    /// Whether all-in is appended to the generated amounts.
    pub allow_all_in: bool,
    /// Minimum raise as a fraction of the current pot; smaller raise
    /// candidates are elided.
    pub min_raise_size: f64,
    /// Effective starting stack behind, in chips.
    pub starting_stack: f64,
    /// Pot at tree entry, in chips.
    pub pot_size: f64,
    /// Reject configurations whose node estimate exceeds this.
    #[serde(default = "default_ceiling")]
    pub node_ceiling: u64,
}

fn default_ceiling() -> u64 {
    DEFAULT_NODE_CEILING
}

impl Default for BettingConfig {
    fn default() -> Self {
        BettingConfig {
            bet_sizes: vec![0.5, 1.0],
            max_bets_per_street: [2, 2, 2, 2],
            allow_all_in: true,
            min_raise_size: 0.1,
            starting_stack: 100.0,
            pot_size: 1.5,
            node_ceiling: DEFAULT_NODE_CEILING,
        }
    }
}

impl BettingConfig {
    /// Validate the configuration without building anything.
    pub fn validate(&self) -> Result<(), SolverError> {
        if self.bet_sizes.is_empty() {
            return Err(SolverError::InvalidConfig("bet_sizes is empty".into()));
        }
        if self.bet_sizes.iter().any(|&s| !(s > 0.0) || !s.is_finite()) {
            return Err(SolverError::InvalidConfig(
                "bet_sizes must be positive finite fractions".into(),
            ));
        }
        if !(self.min_raise_size > 0.0) {
            return Err(SolverError::InvalidConfig("min_raise_size must be > 0".into()));
        }
        if !(self.starting_stack > 0.0) || !self.starting_stack.is_finite() {
            return Err(SolverError::InvalidConfig("starting_stack must be positive".into()));
        }
        if !(self.pot_size > 0.0) || !self.pot_size.is_finite() {
            return Err(SolverError::InvalidConfig("pot_size must be positive".into()));
        }
        if self.node_ceiling == 0 {
            return Err(SolverError::InvalidConfig("node_ceiling must be positive".into()));
        }
        Ok(())
    }

    /// Closed-form upper bound on tree size, multiplying per-street
    /// branching factors from the entry street down to the river.
    ///
    /// Per street: every facing-a-bet node offers one call that can close
    /// the street, every closure continues into the next street's subtree,
    /// and raise chains branch by the number of aggressive sizes up to the
    /// street's cap. Chip filtering only shrinks the real tree, so the
    /// bound is safe.
    pub fn estimate_nodes(&self, entry: Street) -> u64 {
        let aggressive = self.bet_sizes.len() as u64 + self.allow_all_in as u64;
        let mut streets: Vec<Street> = Vec::new();
        let mut s = Some(entry);
        while let Some(street) = s {
            streets.push(street);
            s = street.next();
        }

        // Nested product, innermost street first.
        let mut total: u64 = 0;
        for &street in streets.iter().rev() {
            let cap = self.max_bets_per_street[street.index()] as u64;

            // Facing nodes spawned by one opening bet: a raise chain that
            // branches `aggressive` ways until the cap.
            let mut chain: u64 = 1;
            for _ in 1..cap.max(1) {
                chain = chain.saturating_mul(aggressive).saturating_add(1);
            }
            let opens = if cap >= 1 { aggressive } else { 0 };
            let facing = 2u64.saturating_mul(opens).saturating_mul(chain);

            let action_nodes = 2 + facing;
            let fold_terminals = facing;
            let closures = 1 + facing; // check-check plus one call per facing node

            let subtree = match street {
                Street::River => closures, // showdown terminals
                _ => closures.saturating_mul(total.saturating_add(1)), // chance node + next street
            };
            total = action_nodes
                .saturating_add(fold_terminals)
                .saturating_add(subtree);
        }
        total
    }
}

/// Mutable betting state threaded through construction.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Current street.
    pub street: Street,
    /// Total chips each player committed inside the tree, centi-chips.
    pub committed: [Chips; 2],
    /// Remaining stack behind for each player, centi-chips.
    pub remaining_stack: [Chips; 2],
    /// Player to act: 0 = OOP, 1 = IP.
    pub to_act: u8,
    /// Last player to bet or raise, if any.
    pub last_aggressor: Option<u8>,
    /// Bets plus raises made on the current street.
    pub bet_count_this_street: u8,
    /// Chips the actor must add to continue.
    pub current_bet_to_call: Chips,
    /// Actions taken so far, in order.
    pub action_history: Vec<Action>,
    /// Checks made on the current street while unopened.
    checks_this_street: u8,
}

impl GameState {
    /// Initial state at the entry street.
    pub fn new(street: Street, starting_stack: Chips) -> Self {
        GameState {
            street,
            committed: [0, 0],
            remaining_stack: [starting_stack, starting_stack],
            to_act: 0,
            last_aggressor: None,
            bet_count_this_street: 0,
            current_bet_to_call: 0,
            action_history: Vec::new(),
            checks_this_street: 0,
        }
    }

    /// Minimum of both remaining stacks.
    pub fn effective_stack(&self) -> Chips {
        self.remaining_stack[0].min(self.remaining_stack[1])
    }

    /// Pot relative to an entry pot.
    pub fn pot(&self, entry_pot: Chips) -> Chips {
        entry_pot + self.committed[0] + self.committed[1]
    }
}

struct Builder<'a> {
    config: &'a BettingConfig,
    nodes: Vec<TreeNode>,
    entry_pot: Chips,
}

/// Build the tree for the given entry street.
///
/// Fails with [`SolverError::TreeTooLarge`] when the closed-form estimate
/// (or the actual node count, as a backstop) exceeds the ceiling.
pub fn build(entry: Street, config: &BettingConfig) -> Result<GameTree, SolverError> {
    config.validate()?;

    let estimated = config.estimate_nodes(entry);
    if estimated > config.node_ceiling {
        return Err(SolverError::TreeTooLarge {
            estimated,
            ceiling: config.node_ceiling,
        });
    }

    let entry_pot = to_centi(config.pot_size);
    let stack = to_centi(config.starting_stack);
    if stack == 0 {
        return Err(SolverError::InvalidConfig(
            "starting_stack rounds to zero chips".into(),
        ));
    }

    let mut builder = Builder {
        config,
        nodes: Vec::new(),
        entry_pot,
    };
    let state = GameState::new(entry, stack);
    let root = builder.action_node(state)?;

    log::debug!(
        "tree built: {} nodes (estimate {}), entry {}",
        builder.nodes.len(),
        estimated,
        entry
    );

    Ok(GameTree {
        nodes: builder.nodes,
        root,
        entry_street: entry,
        pot_size: entry_pot,
        starting_stack: stack,
    })
}

impl<'a> Builder<'a> {
    fn push(&mut self, node: TreeNode) -> Result<NodeId, SolverError> {
        if self.nodes.len() as u64 >= self.config.node_ceiling {
            return Err(SolverError::TreeTooLarge {
                estimated: self.nodes.len() as u64 + 1,
                ceiling: self.config.node_ceiling,
            });
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        Ok(id)
    }

    /// Reserve an action node slot, expand its children, then fill it in.
    fn action_node(&mut self, state: GameState) -> Result<NodeId, SolverError> {
        let player = state.to_act;
        let street = state.street;
        let pot = state.pot(self.entry_pot);
        let to_call = state.current_bet_to_call;

        let id = self.push(TreeNode::Action {
            player,
            street,
            pot,
            to_call,
            edges: Vec::new(),
        })?;

        let actions = self.legal_actions(&state);
        if actions.is_empty() {
            return Err(SolverError::InternalInvariantViolated(format!(
                "no legal actions at node {:?} on {}",
                id, street
            )));
        }

        let mut edges = Vec::with_capacity(actions.len());
        for action in actions {
            let child = self.apply(&state, action)?;
            edges.push((action, child));
        }

        match &mut self.nodes[id.0 as usize] {
            TreeNode::Action { edges: slot, .. } => *slot = edges,
            _ => unreachable!("reserved slot is an action node"),
        }
        Ok(id)
    }

    /// Legal actions under the abstraction, in generation order.
    fn legal_actions(&self, state: &GameState) -> Vec<Action> {
        let p = state.to_act as usize;
        let stack = state.remaining_stack[p];
        let pot = state.pot(self.entry_pot);
        let to_call = state.current_bet_to_call;
        let cap = self.config.max_bets_per_street[state.street.index()];
        let under_cap = state.bet_count_this_street < cap;

        let mut actions = Vec::new();

        if to_call == 0 {
            actions.push(Action::Check);
            if under_cap && stack > 0 {
                let mut amounts: Vec<Chips> = Vec::new();
                for &frac in &self.config.bet_sizes {
                    let amt = (frac * pot as f64).round() as i64;
                    if amt > 0 && (amt as u64) < stack as u64 {
                        let amt = amt as Chips;
                        if !amounts.contains(&amt) {
                            amounts.push(amt);
                        }
                    }
                }
                actions.extend(amounts.into_iter().map(Action::Bet));
                if self.config.allow_all_in {
                    actions.push(Action::AllIn(stack));
                }
            }
        } else {
            actions.push(Action::Fold);
            actions.push(Action::Call);
            let behind = stack.saturating_sub(to_call);
            let opp_can_respond = state.remaining_stack[1 - p] > 0;
            if under_cap && behind > 0 && opp_can_respond {
                let floor = (self.config.min_raise_size * pot as f64).round() as i64;
                let mut amounts: Vec<Chips> = Vec::new();
                for &frac in &self.config.bet_sizes {
                    let amt = (frac * pot as f64).round() as i64;
                    if amt > 0 && amt >= floor && (amt as u64) < behind as u64 {
                        let amt = amt as Chips;
                        if !amounts.contains(&amt) {
                            amounts.push(amt);
                        }
                    }
                }
                actions.extend(amounts.into_iter().map(Action::Raise));
                if self.config.allow_all_in {
                    actions.push(Action::AllIn(stack));
                }
            }
        }

        actions
    }

    /// Apply an action and build the successor subtree.
    fn apply(&mut self, state: &GameState, action: Action) -> Result<NodeId, SolverError> {
        let p = state.to_act as usize;
        let mut next = state.clone();
        next.action_history.push(action);

        match action {
            Action::Fold => {
                let pot = state.pot(self.entry_pot);
                self.push(TreeNode::Terminal {
                    kind: TerminalKind::Fold {
                        winner: 1 - state.to_act,
                    },
                    pot,
                    committed: state.committed,
                })
            }
            Action::Check => {
                next.checks_this_street += 1;
                if next.checks_this_street >= 2 {
                    self.close_street(next)
                } else {
                    next.to_act = 1 - state.to_act;
                    self.action_node(next)
                }
            }
            Action::Call => {
                let pay = state.current_bet_to_call.min(state.remaining_stack[p]);
                next.committed[p] += pay;
                next.remaining_stack[p] -= pay;
                next.current_bet_to_call = 0;
                self.close_street(next)
            }
            Action::Bet(amt) => {
                next.committed[p] += amt;
                next.remaining_stack[p] -= amt;
                next.current_bet_to_call = amt;
                next.bet_count_this_street += 1;
                next.last_aggressor = Some(state.to_act);
                next.to_act = 1 - state.to_act;
                self.action_node(next)
            }
            Action::Raise(amt) => {
                let pay = state.current_bet_to_call + amt;
                next.committed[p] += pay;
                next.remaining_stack[p] -= pay;
                next.current_bet_to_call = amt;
                next.bet_count_this_street += 1;
                next.last_aggressor = Some(state.to_act);
                next.to_act = 1 - state.to_act;
                self.action_node(next)
            }
            Action::AllIn(stack) => {
                debug_assert_eq!(stack, state.remaining_stack[p]);
                let raise_over_call = stack.saturating_sub(state.current_bet_to_call);
                next.committed[p] += stack;
                next.remaining_stack[p] = 0;
                next.bet_count_this_street += 1;
                next.last_aggressor = Some(state.to_act);
                if raise_over_call > 0 && state.remaining_stack[1 - p] > 0 {
                    next.current_bet_to_call = raise_over_call;
                    next.to_act = 1 - state.to_act;
                    self.action_node(next)
                } else {
                    // Nothing left to respond with: settle immediately.
                    next.current_bet_to_call = 0;
                    self.close_street(next)
                }
            }
        }
    }

    /// Handle street closure: showdown on the river, otherwise a chance
    /// node into the next street. A called all-in fast-forwards the
    /// remaining streets as pure chance.
    fn close_street(&mut self, state: GameState) -> Result<NodeId, SolverError> {
        let someone_all_in = state.remaining_stack[0] == 0 || state.remaining_stack[1] == 0;

        if state.street == Street::River {
            return self.showdown(&state);
        }

        let next_street = state.street.next().expect("non-river street has a next");

        if someone_all_in {
            // Deal out the remaining streets with no further action.
            let mut streets = Vec::new();
            let mut s = Some(next_street);
            while let Some(street) = s {
                streets.push(street);
                s = street.next();
            }
            let terminal = self.showdown(&state)?;
            let mut child = terminal;
            for &street in streets.iter().rev() {
                child = self.push(TreeNode::Chance { street, child })?;
            }
            return Ok(child);
        }

        let mut next = state;
        next.street = next_street;
        next.to_act = 0;
        next.current_bet_to_call = 0;
        next.bet_count_this_street = 0;
        next.checks_this_street = 0;
        next.last_aggressor = None;

        let child = self.action_node(next)?;
        self.push(TreeNode::Chance {
            street: next_street,
            child,
        })
    }

    fn showdown(&mut self, state: &GameState) -> Result<NodeId, SolverError> {
        self.push(TreeNode::Terminal {
            kind: TerminalKind::Showdown,
            pot: state.pot(self.entry_pot),
            committed: state.committed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Combo;

    fn river_config(sizes: Vec<f64>, cap: u8, stack: f64, pot: f64) -> BettingConfig {
        BettingConfig {
            bet_sizes: sizes,
            max_bets_per_street: [cap; 4],
            allow_all_in: false,
            min_raise_size: 0.1,
            starting_stack: stack,
            pot_size: pot,
            node_ceiling: DEFAULT_NODE_CEILING,
        }
    }

    #[test]
    fn validation_rejects_bad_configs() {
        let mut config = BettingConfig::default();
        config.bet_sizes.clear();
        assert!(matches!(config.validate(), Err(SolverError::InvalidConfig(_))));

        let config = BettingConfig {
            pot_size: 0.0,
            ..BettingConfig::default()
        };
        assert!(matches!(config.validate(), Err(SolverError::InvalidConfig(_))));

        let config = BettingConfig {
            min_raise_size: 0.0,
            ..BettingConfig::default()
        };
        assert!(matches!(config.validate(), Err(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn oversized_config_is_rejected_before_build() {
        let config = BettingConfig {
            bet_sizes: vec![0.25, 0.33, 0.5, 0.66, 0.75, 1.0, 1.5, 2.0],
            max_bets_per_street: [4, 4, 4, 4],
            allow_all_in: true,
            min_raise_size: 0.01,
            starting_stack: 1000.0,
            pot_size: 1.0,
            node_ceiling: 1_000_000,
        };
        assert!(matches!(
            build(Street::Preflop, &config),
            Err(SolverError::TreeTooLarge { .. })
        ));
    }

    #[test]
    fn river_tree_shape_single_size_no_raises() {
        // One pot-size bet, cap 1: OOP check/bet; IP responds.
        let config = river_config(vec![1.0], 1, 100.0, 10.0);
        let tree = build(Street::River, &config).unwrap();

        let root = tree.root();
        let edges = tree.children(root);
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].0, Action::Check);
        assert_eq!(edges[1].0, Action::Bet(1000));

        // Check -> IP node with check (showdown) and bet
        let ip = edges[0].1;
        let ip_edges = tree.children(ip);
        assert_eq!(ip_edges[0].0, Action::Check);
        assert!(tree.is_terminal(ip_edges[0].1));

        // Bet -> facing node with fold/call only (cap reached)
        let facing = edges[1].1;
        let facing_edges = tree.children(facing);
        assert_eq!(facing_edges.len(), 2);
        assert_eq!(facing_edges[0].0, Action::Fold);
        assert_eq!(facing_edges[1].0, Action::Call);
    }

    #[test]
    fn chip_conservation_everywhere() {
        // Committed plus remaining stacks must stay at 2*stack at every
        // terminal (entry pot is dead money on top).
        let config = BettingConfig {
            bet_sizes: vec![0.5, 1.0],
            max_bets_per_street: [2, 2, 2, 2],
            allow_all_in: true,
            min_raise_size: 0.1,
            starting_stack: 20.0,
            pot_size: 3.0,
            node_ceiling: DEFAULT_NODE_CEILING,
        };
        let tree = build(Street::Turn, &config).unwrap();
        let stack = to_centi(config.starting_stack);
        let entry = to_centi(config.pot_size);

        for idx in 0..tree.len() {
            if let TreeNode::Terminal { pot, committed, .. } = tree.node(NodeId(idx as u32)) {
                assert_eq!(*pot, entry + committed[0] + committed[1]);
                assert!(committed[0] <= stack && committed[1] <= stack);
            }
        }
    }

    #[test]
    fn fold_payoff_credits_pot_to_non_folder() {
        let config = river_config(vec![1.0], 1, 100.0, 10.0);
        let tree = build(Street::River, &config).unwrap();

        // OOP bets 10, IP folds.
        let root = tree.root();
        let bet_child = tree.children(root)[1].1;
        let fold_terminal = tree.children(bet_child)[0].1;

        let combos = [Combo::parse("AhAs").unwrap(), Combo::parse("KhKs").unwrap()];
        let board = crate::cards::parse_board("2c 7d 9h Js Qd").unwrap();
        let payoff = tree.terminal_payoff(fold_terminal, combos, &board);

        // IP committed nothing, so the winner collects exactly the entry
        // pot and the folder loses nothing.
        assert_eq!(payoff[0], 10.0);
        assert_eq!(payoff[1], 0.0);

        // IP bets after a check, OOP folds: OOP loses nothing, IP wins pot.
        let check_child = tree.children(root)[0].1;
        let ip_bet = tree.children(check_child)[1].1;
        let oop_fold = tree.children(ip_bet)[0].1;
        let payoff = tree.terminal_payoff(oop_fold, combos, &board);
        assert_eq!(payoff[1], 10.0);
        assert_eq!(payoff[0], 0.0);
    }

    #[test]
    fn fold_after_call_and_raise_settles_committed_chips() {
        // Raises allowed: cap 2 lets bet then raise.
        let config = river_config(vec![1.0], 2, 100.0, 10.0);
        let tree = build(Street::River, &config).unwrap();

        // OOP bets 10, IP raises, OOP folds.
        let root = tree.root();
        let bet_child = tree.children(root)[1].1;
        let raise_edge = tree.children(bet_child)
            .iter()
            .find(|(a, _)| matches!(a, Action::Raise(_)))
            .copied()
            .unwrap();
        let (raise_action, raise_child) = raise_edge;
        let fold_terminal = tree.children(raise_child)[0].1;

        let combos = [Combo::parse("AhAs").unwrap(), Combo::parse("KhKs").unwrap()];
        let board = crate::cards::parse_board("2c 7d 9h Js Qd").unwrap();
        let payoff = tree.terminal_payoff(fold_terminal, combos, &board);

        // OOP committed its 10-chip bet and folds it away; IP wins the
        // entry pot plus that bet, with the uncalled raise returned.
        assert_eq!(payoff[0], -10.0);
        assert_eq!(payoff[1], 20.0);
        if let Action::Raise(amt) = raise_action {
            // Pot-size raise over the 10 bet in a 20 pot
            assert_eq!(amt, 2000);
        }
    }

    #[test]
    fn showdown_payoff_splits_on_tie() {
        let config = river_config(vec![1.0], 1, 100.0, 10.0);
        let tree = build(Street::River, &config).unwrap();

        // Check-check showdown.
        let root = tree.root();
        let check_child = tree.children(root)[0].1;
        let showdown = tree.children(check_child)[0].1;

        // Board plays for both.
        let board = crate::cards::parse_board("Ac Kc Qc Jc Tc").unwrap();
        let combos = [Combo::parse("2h3h").unwrap(), Combo::parse("4d5d").unwrap()];
        let payoff = tree.terminal_payoff(showdown, combos, &board);
        assert_eq!(payoff[0], 5.0);
        assert_eq!(payoff[1], 5.0);
    }

    #[test]
    fn called_all_in_fast_forwards_to_showdown() {
        let config = BettingConfig {
            bet_sizes: vec![1.0],
            max_bets_per_street: [1, 1, 1, 1],
            allow_all_in: true,
            min_raise_size: 0.1,
            starting_stack: 10.0,
            pot_size: 4.0,
            node_ceiling: DEFAULT_NODE_CEILING,
        };
        let tree = build(Street::Flop, &config).unwrap();

        // OOP jams the flop, IP calls: two chance nodes (turn, river) then
        // showdown with both stacks in.
        let root = tree.root();
        let allin_edge = tree
            .children(root)
            .iter()
            .find(|(a, _)| matches!(a, Action::AllIn(_)))
            .copied()
            .unwrap();
        let facing = allin_edge.1;
        let call_child = tree
            .children(facing)
            .iter()
            .find(|(a, _)| matches!(a, Action::Call))
            .copied()
            .unwrap()
            .1;

        assert!(tree.is_chance(call_child));
        let TreeNode::Chance { street, child } = tree.node(call_child) else {
            panic!("expected chance node");
        };
        assert_eq!(*street, Street::Turn);
        let TreeNode::Chance { street, child } = tree.node(*child) else {
            panic!("expected second chance node");
        };
        assert_eq!(*street, Street::River);
        assert!(tree.is_terminal(*child));
        let TreeNode::Terminal { kind, committed, .. } = tree.node(*child) else {
            unreachable!();
        };
        assert_eq!(*kind, TerminalKind::Showdown);
        assert_eq!(*committed, [1000, 1000]);
    }

    #[test]
    fn bet_amounts_round_fraction_of_pot() {
        let config = river_config(vec![0.33, 0.5], 1, 100.0, 7.0);
        let tree = build(Street::River, &config).unwrap();
        let edges = tree.children(tree.root());
        // 0.33 * 700 = 231, 0.5 * 700 = 350
        assert_eq!(edges[1].0, Action::Bet(231));
        assert_eq!(edges[2].0, Action::Bet(350));
    }

    #[test]
    fn duplicate_bet_sizes_collapse() {
        let config = river_config(vec![0.5, 0.5, 1.0], 1, 100.0, 10.0);
        let tree = build(Street::River, &config).unwrap();
        let edges = tree.children(tree.root());
        // check, 0.5 pot, 1.0 pot
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn estimate_dominates_actual_node_count() {
        for (entry, config) in [
            (Street::River, river_config(vec![0.5, 1.0], 2, 100.0, 10.0)),
            (Street::Turn, river_config(vec![1.0], 1, 50.0, 5.0)),
            (Street::Preflop, river_config(vec![1.0], 1, 100.0, 1.5)),
        ] {
            let estimate = config.estimate_nodes(entry);
            let tree = build(entry, &config).unwrap();
            assert!(
                estimate >= tree.len() as u64,
                "estimate {} below actual {} for entry {:?}",
                estimate,
                tree.len(),
                entry
            );
        }
    }
}
