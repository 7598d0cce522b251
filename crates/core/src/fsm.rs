// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! A generic table-driven finite-state machine.
//!
//! Transitions are looked up in a table keyed by `(state, trigger)`. A trigger which
//! has no entry for the current state is rejected with [`InvalidStateTrigger`] and
//! leaves the state unchanged.

use std::{collections::HashMap, error::Error, fmt, hash::Hash};

/// Error representing an invalid trigger for the current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidStateTrigger {
    /// The current state as a string.
    pub current_state: String,
    /// The trigger as a string.
    pub trigger: String,
}

impl fmt::Display for InvalidStateTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid state transition: {} -> {}",
            self.current_state, self.trigger
        )
    }
}

impl Error for InvalidStateTrigger {}

/// Provides a generic finite state machine.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use tapefill_core::fsm::FiniteStateMachine;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum State {
///     Idle,
///     Running,
/// }
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Trigger {
///     Start,
/// }
///
/// let table = HashMap::from([((State::Idle, Trigger::Start), State::Running)]);
/// let mut fsm = FiniteStateMachine::new(State::Idle, table)?;
///
/// fsm.trigger(Trigger::Start)?;
/// assert_eq!(fsm.state(), State::Running);
/// assert!(fsm.trigger(Trigger::Start).is_err());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct FiniteStateMachine<S, T>
where
    S: Copy + Eq + Hash + fmt::Debug,
    T: Copy + Eq + Hash + fmt::Debug,
{
    state: S,
    state_transition_table: HashMap<(S, T), S>,
}

impl<S, T> fmt::Debug for FiniteStateMachine<S, T>
where
    S: Copy + Eq + Hash + fmt::Debug,
    T: Copy + Eq + Hash + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(FiniteStateMachine))
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, T> FiniteStateMachine<S, T>
where
    S: Copy + Eq + Hash + fmt::Debug,
    T: Copy + Eq + Hash + fmt::Debug,
{
    /// Creates a new finite state machine starting in `initial_state`.
    ///
    /// # Errors
    ///
    /// Returns an error if `state_transition_table` is empty.
    pub fn new(
        initial_state: S,
        state_transition_table: HashMap<(S, T), S>,
    ) -> anyhow::Result<Self> {
        if state_transition_table.is_empty() {
            anyhow::bail!("state_transition_table cannot be empty");
        }

        Ok(Self {
            state: initial_state,
            state_transition_table,
        })
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> S {
        self.state
    }

    /// Returns whether `trigger` is valid from the current state.
    #[must_use]
    pub fn can_trigger(&self, trigger: T) -> bool {
        self.state_transition_table
            .contains_key(&(self.state, trigger))
    }

    /// Applies `trigger` to the current state.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateTrigger`] if the combination of the current state and
    /// `trigger` is not in the transition table.
    pub fn trigger(&mut self, trigger: T) -> Result<S, InvalidStateTrigger> {
        match self.state_transition_table.get(&(self.state, trigger)) {
            Some(&next_state) => {
                self.state = next_state;
                Ok(next_state)
            }
            None => Err(InvalidStateTrigger {
                current_state: format!("{:?}", self.state),
                trigger: format!("{trigger:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestState {
        Initialized,
        Running,
        Stopped,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestTrigger {
        Start,
        Stop,
    }

    #[fixture]
    fn fsm() -> FiniteStateMachine<TestState, TestTrigger> {
        let table = HashMap::from([
            ((TestState::Initialized, TestTrigger::Start), TestState::Running),
            ((TestState::Running, TestTrigger::Stop), TestState::Stopped),
        ]);
        FiniteStateMachine::new(TestState::Initialized, table).unwrap()
    }

    #[rstest]
    fn test_initial_state(fsm: FiniteStateMachine<TestState, TestTrigger>) {
        assert_eq!(fsm.state(), TestState::Initialized);
    }

    #[rstest]
    fn test_valid_multiple_transitions(mut fsm: FiniteStateMachine<TestState, TestTrigger>) {
        assert_eq!(fsm.trigger(TestTrigger::Start), Ok(TestState::Running));
        assert_eq!(fsm.trigger(TestTrigger::Stop), Ok(TestState::Stopped));
    }

    #[rstest]
    fn test_invalid_transition_keeps_state(mut fsm: FiniteStateMachine<TestState, TestTrigger>) {
        let err = fsm.trigger(TestTrigger::Stop).unwrap_err();

        assert_eq!(err.to_string(), "Invalid state transition: Initialized -> Stop");
        assert_eq!(fsm.state(), TestState::Initialized);
        assert!(!fsm.can_trigger(TestTrigger::Stop));
    }

    #[rstest]
    fn test_empty_transition_table() {
        let table = HashMap::<(TestState, TestTrigger), TestState>::new();
        assert!(FiniteStateMachine::new(TestState::Initialized, table).is_err());
    }
}
