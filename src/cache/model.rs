/// Cache Commit Ordering - Stateright Model
/// Verifies that with fetches completing in any order, the slot always ends
/// up holding the newest completed ticket and never moves backwards.
///
/// Run with: cargo test --release cache_model -- --nocapture

use stateright::*;

use super::should_commit;

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct CommitState {
    /// Tickets handed out so far (1..=issued)
    pub issued: u64,
    /// Bit i set once ticket i+1 has completed
    pub completed: u32,
    /// Ticket whose result is in the slot, 0 when empty
    pub committed: u64,
    /// Completions that arrived after a newer commit
    pub discarded: u8,
    /// Set if a commit ever lowered the committed ticket
    pub regressed: bool,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum CommitAction {
    Issue,
    Complete(u64),
}

#[derive(Clone)]
pub struct CommitChecker {
    pub max_requests: u64,
}

impl Default for CommitChecker {
    fn default() -> Self {
        Self { max_requests: 4 }
    }
}

impl CommitState {
    fn is_completed(&self, ticket: u64) -> bool {
        self.completed & (1 << (ticket - 1)) != 0
    }

    fn newest_completed(&self) -> u64 {
        (1..=self.issued)
            .rev()
            .find(|&t| self.is_completed(t))
            .unwrap_or(0)
    }
}

impl Model for CommitChecker {
    type State = CommitState;
    type Action = CommitAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![CommitState {
            issued: 0,
            completed: 0,
            committed: 0,
            discarded: 0,
            regressed: false,
        }]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        if state.issued < self.max_requests {
            actions.push(CommitAction::Issue);
        }
        for ticket in 1..=state.issued {
            if !state.is_completed(ticket) {
                actions.push(CommitAction::Complete(ticket));
            }
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut next = state.clone();
        match action {
            CommitAction::Issue => {
                next.issued += 1;
            }
            CommitAction::Complete(ticket) => {
                next.completed |= 1 << (ticket - 1);
                if should_commit(state.committed, ticket) {
                    if ticket < state.committed {
                        next.regressed = true;
                    }
                    next.committed = ticket;
                } else {
                    next.discarded += 1;
                }
            }
        }
        Some(next)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::always("never_regresses", |_, state: &CommitState| !state.regressed),
            Property::always("slot_holds_newest_completed", |_, state: &CommitState| {
                state.committed == state.newest_completed()
            }),
            Property::sometimes("stale_completion_discarded", |_, state: &CommitState| {
                state.discarded > 0
            }),
            Property::sometimes("all_completed", |model: &CommitChecker, state: &CommitState| {
                state.issued == model.max_requests
                    && state.completed == (1u32 << model.max_requests) - 1
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn cache_model_check_properties() {
        let checker = CommitChecker::default().checker().spawn_bfs().join();
        println!("States explored: {}", checker.unique_state_count());
        checker.assert_properties();
    }

    #[test]
    fn cache_model_out_of_order_path() {
        let model = CommitChecker::default();
        let mut state = model.init_states()[0].clone();

        state = model.next_state(&state, CommitAction::Issue).unwrap();
        state = model.next_state(&state, CommitAction::Issue).unwrap();
        assert_eq!(state.issued, 2);

        // Newer request finishes first
        state = model.next_state(&state, CommitAction::Complete(2)).unwrap();
        assert_eq!(state.committed, 2);

        // Older one arrives late and is dropped
        state = model.next_state(&state, CommitAction::Complete(1)).unwrap();
        assert_eq!(state.committed, 2);
        assert_eq!(state.discarded, 1);
    }

    #[test]
    fn cache_model_in_order_path() {
        let model = CommitChecker::default();
        let mut state = model.init_states()[0].clone();

        state = model.next_state(&state, CommitAction::Issue).unwrap();
        state = model.next_state(&state, CommitAction::Complete(1)).unwrap();
        state = model.next_state(&state, CommitAction::Issue).unwrap();
        state = model.next_state(&state, CommitAction::Complete(2)).unwrap();

        assert_eq!(state.committed, 2);
        assert_eq!(state.discarded, 0);
    }
}
