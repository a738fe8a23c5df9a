//! Tuning knobs for encode and transfer.

/// Configuration for serialization and transfer behavior.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Chunk size for oversized plain lists, and the default slice size for
    /// detached lists that do not carry their own `@(N)` or descriptor size.
    pub chunk_size: usize,
    /// Concurrent transport operations during send probes and receive
    /// fetches.
    pub max_in_flight: usize,
    /// Documents per `save_objects` call during send.
    pub save_batch_size: usize,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        SerializeOptions {
            chunk_size: 1000,
            max_in_flight: 8,
            save_batch_size: 500,
        }
    }
}

impl SerializeOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_save_batch_size(mut self, save_batch_size: usize) -> Self {
        self.save_batch_size = save_batch_size.max(1);
        self
    }
}

/// How much of a stored graph `receive` materializes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReceiveMode {
    /// Fetch the whole reference closure and attach every target.
    #[default]
    Deep,
    /// Decode the root document only; references stay unresolved.
    Shallow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let options = SerializeOptions::default();
        assert_eq!(options.chunk_size, 1000);
        assert_eq!(options.max_in_flight, 8);
        assert_eq!(options.save_batch_size, 500);
    }

    #[test]
    fn builders_floor_at_one() {
        let options = SerializeOptions::default()
            .with_chunk_size(0)
            .with_max_in_flight(0)
            .with_save_batch_size(0);
        assert_eq!(options.chunk_size, 1);
        assert_eq!(options.max_in_flight, 1);
        assert_eq!(options.save_batch_size, 1);
    }
}
