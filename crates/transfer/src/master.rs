use crate::error::{Result, TransferError};

/// Ordered set of master coordinators with a round-robin cursor
#[derive(Clone, Debug)]
pub struct MasterPool {
    masters: Vec<String>,
    cursor: usize,
}

impl MasterPool {
    /// Create a pool; the first address is selected initially
    pub fn new(masters: Vec<String>) -> Result<Self> {
        if masters.is_empty() {
            return Err(TransferError::NoMasters);
        }
        Ok(Self { masters, cursor: 0 })
    }

    /// Currently selected master
    pub fn select(&self) -> &str {
        &self.masters[self.cursor]
    }

    /// Advance to the next master, wrapping around, and return it
    pub fn rotate(&mut self) -> &str {
        self.cursor = (self.cursor + 1) % self.masters.len();
        log::info!("Switched master to {}", self.masters[self.cursor]);
        self.select()
    }
}
