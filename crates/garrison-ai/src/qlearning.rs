//! Q-learning action selection with experience replay, behind a shared
//! backend trait so a linear function approximator and a tabular lookup can
//! be swapped without touching the selector.

use std::collections::{HashMap, VecDeque};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::action::{ACTION_COUNT, IDLE_ACTION_ID};
use crate::state::STATE_LEN;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend raised during {operation}: {detail}")]
    Raised { operation: &'static str, detail: String },
}

/// One recorded experience: the state the agent saw, the action it took,
/// the reward received, and the state that followed.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: [f32; STATE_LEN],
    pub action: u8,
    pub reward: f32,
    pub next_state: [f32; STATE_LEN],
    pub terminal: bool,
}

/// Anything that can score the 16 actions for a state and learn from a
/// minibatch of transitions.
pub trait QBackend {
    fn predict(&self, state: &[f32; STATE_LEN]) -> Result<[f32; ACTION_COUNT], BackendError>;
    fn update_one(&mut self, transition: &Transition, learning_rate: f32, gamma: f32) -> Result<(), BackendError>;
}

/// A single-layer linear approximator: `q(s) = W s + b`. Simple enough to
/// implement without pulling in an ML crate, while still satisfying
/// "parameterized action-value function" rather than a raw lookup table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearBackend {
    weights: [[f32; STATE_LEN]; ACTION_COUNT],
    bias: [f32; ACTION_COUNT],
}

impl Default for LinearBackend {
    fn default() -> Self {
        Self {
            weights: [[0.0; STATE_LEN]; ACTION_COUNT],
            bias: [0.0; ACTION_COUNT],
        }
    }
}

impl QBackend for LinearBackend {
    fn predict(&self, state: &[f32; STATE_LEN]) -> Result<[f32; ACTION_COUNT], BackendError> {
        let mut q = [0.0f32; ACTION_COUNT];
        for a in 0..ACTION_COUNT {
            let mut acc = self.bias[a];
            for s in 0..STATE_LEN {
                acc += self.weights[a][s] * state[s];
            }
            q[a] = acc;
        }
        Ok(q)
    }

    fn update_one(&mut self, t: &Transition, learning_rate: f32, gamma: f32) -> Result<(), BackendError> {
        let current = self.predict(&t.state)?;
        let next = self.predict(&t.next_state)?;
        let max_next = if t.terminal {
            0.0
        } else {
            next.iter().copied().fold(f32::NEG_INFINITY, f32::max)
        };
        let target = t.reward + gamma * max_next;
        let td_error = target - current[t.action as usize];
        let a = t.action as usize;
        for s in 0..STATE_LEN {
            self.weights[a][s] += learning_rate * td_error * t.state[s];
        }
        self.bias[a] += learning_rate * td_error;
        Ok(())
    }
}

/// Discretizes the continuous state into a hashable key and looks up
/// action values in a table, growing lazily. Accepted as a test/reference
/// backend alongside the linear approximator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabularBackend {
    buckets_per_dim: u32,
    table: HashMap<[i32; STATE_LEN], [f32; ACTION_COUNT]>,
}

impl TabularBackend {
    pub fn new(buckets_per_dim: u32) -> Self {
        Self {
            buckets_per_dim: buckets_per_dim.max(1),
            table: HashMap::new(),
        }
    }

    fn key(&self, state: &[f32; STATE_LEN]) -> [i32; STATE_LEN] {
        let mut key = [0i32; STATE_LEN];
        for (i, &s) in state.iter().enumerate() {
            let clamped = s.clamp(-1.0, 1.0);
            key[i] = ((clamped + 1.0) * 0.5 * self.buckets_per_dim as f32).floor() as i32;
        }
        key
    }
}

impl QBackend for TabularBackend {
    fn predict(&self, state: &[f32; STATE_LEN]) -> Result<[f32; ACTION_COUNT], BackendError> {
        Ok(*self.table.get(&self.key(state)).unwrap_or(&[0.0; ACTION_COUNT]))
    }

    fn update_one(&mut self, t: &Transition, learning_rate: f32, gamma: f32) -> Result<(), BackendError> {
        let next = self.predict(&t.next_state)?;
        let max_next = if t.terminal {
            0.0
        } else {
            next.iter().copied().fold(f32::NEG_INFINITY, f32::max)
        };
        let target = t.reward + gamma * max_next;
        let key = self.key(&t.state);
        let row = self.table.entry(key).or_insert([0.0; ACTION_COUNT]);
        let td_error = target - row[t.action as usize];
        row[t.action as usize] += learning_rate * td_error;
        Ok(())
    }
}

/// Either backend behind one type, so `Selector` doesn't need a trait
/// object (and the corpus has no `dyn`-clone crate to lean on).
#[derive(Debug, Clone)]
pub enum Backend {
    Linear(LinearBackend),
    Tabular(TabularBackend),
}

impl QBackend for Backend {
    fn predict(&self, state: &[f32; STATE_LEN]) -> Result<[f32; ACTION_COUNT], BackendError> {
        match self {
            Backend::Linear(b) => b.predict(state),
            Backend::Tabular(b) => b.predict(state),
        }
    }

    fn update_one(&mut self, t: &Transition, learning_rate: f32, gamma: f32) -> Result<(), BackendError> {
        match self {
            Backend::Linear(b) => b.update_one(t, learning_rate, gamma),
            Backend::Tabular(b) => b.update_one(t, learning_rate, gamma),
        }
    }
}

/// Fixed-capacity ring buffer of past transitions sampled for minibatch
/// updates.
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    capacity: usize,
    entries: VecDeque<Transition>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Samples `size` transitions with replacement; empty if the buffer is
    /// empty.
    pub fn sample(&self, size: usize, rng: &mut Pcg32) -> Vec<Transition> {
        if self.entries.is_empty() {
            return Vec::new();
        }
        (0..size)
            .map(|_| {
                let idx = rng.gen_range(0..self.entries.len());
                self.entries[idx].clone()
            })
            .collect()
    }
}

/// Required hyperparameters for the learning rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hyperparams {
    pub learning_rate: f32,
    pub discount: f32,
    pub exploration_rate: f32,
    pub exploration_decay: f32,
    pub exploration_min: f32,
    pub target_sync_interval: u32,
    pub minibatch_size: usize,
    pub replay_capacity: usize,
    pub max_reward_magnitude: f32,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            discount: 0.95,
            exploration_rate: 0.1,
            exploration_decay: 0.999,
            exploration_min: 0.01,
            target_sync_interval: 200,
            minibatch_size: 32,
            replay_capacity: 10_000,
            max_reward_magnitude: 100.0,
        }
    }
}

/// Ties a backend, replay buffer, and ε-greedy policy together. One
/// instance is shared across every entity using the same behavior profile;
/// the caller threads per-entity state externally.
pub struct Selector {
    backend: Backend,
    target: Backend,
    replay: ReplayBuffer,
    rng: Pcg32,
    params: Hyperparams,
    steps_since_sync: u32,
}

impl Selector {
    pub fn new(backend: Backend, params: Hyperparams, seed: u64) -> Self {
        let replay = ReplayBuffer::new(params.replay_capacity);
        Self {
            target: backend.clone(),
            backend,
            replay,
            rng: Pcg32::seed_from_u64(seed),
            params,
            steps_since_sync: 0,
        }
    }

    /// ε-greedy selection. Falls back to `Idle` (and logs) when the state
    /// vector contains a non-finite value; falls back to `previous_action`
    /// (and logs) if the backend itself raises.
    pub fn select(&mut self, state: &[f32; STATE_LEN], previous_action: u8) -> u8 {
        if state.iter().any(|x| !x.is_finite()) {
            warn!("non-finite state vector, falling back to Idle");
            return IDLE_ACTION_ID;
        }

        let q = match self.backend.predict(state) {
            Ok(q) => q,
            Err(err) => {
                warn!(%err, "backend raised during prediction, keeping previous action");
                return previous_action;
            }
        };

        if self.rng.gen::<f32>() < self.params.exploration_rate {
            return self.rng.gen_range(0..ACTION_COUNT as u8);
        }

        argmax_lowest_id(&q)
    }

    /// Stores a transition and, once enough experience has accumulated,
    /// samples a minibatch to update the backend. Syncs the target network
    /// from the online one every `target_sync_interval` updates.
    pub fn learn(&mut self, transition: Transition) {
        self.replay.push(transition);
        if self.replay.len() < self.params.minibatch_size {
            return;
        }
        let batch = self.replay.sample(self.params.minibatch_size, &mut self.rng);
        for t in &batch {
            if let Err(err) = self.backend.update_one(t, self.params.learning_rate, self.params.discount) {
                warn!(%err, "backend raised during minibatch update, skipping transition");
            }
        }
        self.params.exploration_rate = (self.params.exploration_rate * self.params.exploration_decay).max(self.params.exploration_min);

        self.steps_since_sync += 1;
        if self.steps_since_sync >= self.params.target_sync_interval {
            self.target = self.backend.clone();
            self.steps_since_sync = 0;
        }
    }

    pub fn exploration_rate(&self) -> f32 {
        self.params.exploration_rate
    }

    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }
}

fn argmax_lowest_id(q: &[f32; ACTION_COUNT]) -> u8 {
    let mut best_id = 0u8;
    let mut best_val = q[0];
    for (id, &val) in q.iter().enumerate().skip(1) {
        if val > best_val {
            best_val = val;
            best_id = id as u8;
        }
    }
    best_id
}

/// Clamps a raw reward to `[-max, +max]`, logging when clamping occurred.
pub fn clamp_reward(raw: f32, max_magnitude: f32) -> f32 {
    if raw.abs() > max_magnitude {
        warn!(raw, max_magnitude, "reward out of bounds, clamping");
    }
    raw.clamp(-max_magnitude, max_magnitude)
}
