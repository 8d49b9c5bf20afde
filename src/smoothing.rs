//! Moving-average smoothing for tracked joint angles.

/// Samples averaged per signal.
pub const WINDOW: usize = 7;

/// Running mean over the last [`WINDOW`] samples.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    data: [f64; WINDOW],
    /// Next slot to write.
    write_index: usize,
    len: usize,
}

impl MovingAverage {
    pub fn new() -> Self {
        Self {
            data: [0.0; WINDOW],
            write_index: 0,
            len: 0,
        }
    }

    /// Add a sample and return the mean of the samples currently held.
    pub fn push(&mut self, value: f64) -> f64 {
        self.data[self.write_index] = value;
        self.write_index = (self.write_index + 1) % WINDOW;
        self.len = (self.len + 1).min(WINDOW);
        self.mean()
    }

    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        // Until the buffer wraps, the samples are the first `len` slots.
        self.data[..self.len].iter().sum::<f64>() / self.len as f64
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new()
    }
}

/// Independent smoothers for shoulder, elbow and wrist servo angles.
#[derive(Debug, Clone, Default)]
pub struct AngleSmoother {
    channels: [MovingAverage; 3],
}

impl AngleSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn smooth(&mut self, values: [f64; 3]) -> [f64; 3] {
        let mut out = [0.0; 3];
        for ((slot, channel), value) in out.iter_mut().zip(self.channels.iter_mut()).zip(values) {
            *slot = channel.push(value);
        }
        out
    }
}
