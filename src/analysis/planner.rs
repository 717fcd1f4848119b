//! Token-budgeted batch planning
//!
//! Files arrive in corpus order with a token cost. The planner packs them
//! greedily into contiguous batches: a batch is flushed just before the file
//! that would push it over the ceiling. A single file above the ceiling
//! still gets a batch of its own. Nothing is reordered, split or dropped.

/// A contiguous run of corpus files sent as one analysis turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch<T> {
    /// 1-based position in the planner's output
    pub number: usize,
    pub files: Vec<T>,
    /// Summed token cost of `files`
    pub token_count: u64,
}

impl<T> Batch<T> {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Planner lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    /// Collecting files into the current batch
    Accumulating,
    /// Handing a full batch out; returns to accumulating with the overflowing file
    Flushing,
    /// Input exhausted and the trailing batch emitted
    Done,
}

/// Greedy, order-preserving batch packer
#[derive(Debug)]
pub struct BatchPlanner<T> {
    ceiling: u64,
    state: PlannerState,
    files: Vec<T>,
    token_count: u64,
    emitted: usize,
}

impl<T> BatchPlanner<T> {
    /// Creates a planner that keeps each multi-file batch within `ceiling` tokens
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling,
            state: PlannerState::Accumulating,
            files: Vec::new(),
            token_count: 0,
            emitted: 0,
        }
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    /// Number of batches handed out so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Files waiting in the current batch
    pub fn pending(&self) -> usize {
        self.files.len()
    }

    /// Adds the next file in corpus order
    ///
    /// # Returns
    ///
    /// * `Some(batch)` - The batch closed off by this file; the file itself
    ///   opens the next batch
    /// * `None` - The file joined the current batch
    ///
    /// A planner in the `Done` state starts a fresh pass.
    pub fn push(&mut self, file: T, tokens: u64) -> Option<Batch<T>> {
        if self.state == PlannerState::Done {
            self.emitted = 0;
            self.state = PlannerState::Accumulating;
        }

        let flushed = if !self.files.is_empty() && self.token_count + tokens > self.ceiling {
            self.state = PlannerState::Flushing;
            self.take_batch()
        } else {
            None
        };

        self.files.push(file);
        self.token_count += tokens;
        self.state = PlannerState::Accumulating;
        flushed
    }

    /// Ends the input and emits the trailing batch, if any
    pub fn finish(&mut self) -> Option<Batch<T>> {
        let batch = self.take_batch();
        self.state = PlannerState::Done;
        batch
    }

    fn take_batch(&mut self) -> Option<Batch<T>> {
        if self.files.is_empty() {
            return None;
        }
        self.emitted += 1;
        let batch = Batch {
            number: self.emitted,
            files: std::mem::take(&mut self.files),
            token_count: self.token_count,
        };
        self.token_count = 0;
        tracing::debug!(
            "Planned batch {} with {} files ({} tokens)",
            batch.number,
            batch.files.len(),
            batch.token_count
        );
        Some(batch)
    }
}

/// Plans a whole sequence at once
pub fn plan_batches<T>(ceiling: u64, files: impl IntoIterator<Item = (T, u64)>) -> Vec<Batch<T>> {
    let mut planner = BatchPlanner::new(ceiling);
    let mut batches = Vec::new();
    for (file, tokens) in files {
        if let Some(batch) = planner.push(file, tokens) {
            batches.push(batch);
        }
    }
    batches.extend(planner.finish());
    batches
}
