use super::state::State;

/// Memory the driver borrows for its whole life. Place it in a `static`
/// (e.g. through `static_cell`) on targets without a heap.
pub struct Resources {
    pub(crate) state: State,
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

impl Resources {
    pub const fn new() -> Self {
        Self {
            state: State::new(),
        }
    }
}
