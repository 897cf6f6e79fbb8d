/// Runtime settings for a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Node slots reserved up front.
    pub capacity: usize,
    /// Drain or commit cycles allowed in a single flush before giving up.
    pub max_passes: usize,
    /// Record every hook call in memory, see [`Root::trace`](crate::Root::trace).
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_passes: 50,
            trace: false,
        }
    }
}

impl Config {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes.max(1);
        self
    }

    pub fn trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }
}
