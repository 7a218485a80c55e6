//! One multiply-accumulate cell of the systolic array.

/// A single Processing Element at grid position `(row, col)`.
///
/// Accumulates in `f64` regardless of the matrix element type, narrowed
/// only at evacuation time.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessingElement {
    a_input: f64,
    b_input: f64,
    a_output: f64,
    b_output: f64,
    c_accumulator: f64,
}

impl ProcessingElement {
    /// Creates a PE with all registers zeroed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches a new `A` operand for this cycle's multiply.
    pub fn set_a_input(&mut self, value: f64) {
        self.a_input = value;
    }

    /// Latches a new `B` operand for this cycle's multiply.
    pub fn set_b_input(&mut self, value: f64) {
        self.b_input = value;
    }

    /// `A` value propagated to the right neighbor after `cycle()`.
    #[must_use]
    pub fn a_output(&self) -> f64 {
        self.a_output
    }

    /// `B` value propagated to the lower neighbor after `cycle()`.
    #[must_use]
    pub fn b_output(&self) -> f64 {
        self.b_output
    }

    /// Current accumulator value.
    #[must_use]
    pub fn accumulator(&self) -> f64 {
        self.c_accumulator
    }

    /// Advances the PE by one cycle: accumulates `a_input * b_input`,
    /// propagates both inputs to the outputs, then clears the inputs.
    pub fn cycle(&mut self) {
        self.c_accumulator += self.a_input * self.b_input;
        self.a_output = self.a_input;
        self.b_output = self.b_input;
        self.a_input = 0.0;
        self.b_input = 0.0;
    }

    /// Resets every register to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_propagates() {
        let mut pe = ProcessingElement::new();
        pe.set_a_input(2.0);
        pe.set_b_input(3.0);
        pe.cycle();
        assert_eq!(pe.accumulator(), 6.0);
        assert_eq!(pe.a_output(), 2.0);
        assert_eq!(pe.b_output(), 3.0);

        pe.set_a_input(4.0);
        pe.set_b_input(5.0);
        pe.cycle();
        assert_eq!(pe.accumulator(), 6.0 + 20.0);
    }

    #[test]
    fn clears_inputs_each_cycle() {
        let mut pe = ProcessingElement::new();
        pe.set_a_input(1.0);
        pe.set_b_input(1.0);
        pe.cycle();
        pe.cycle();
        assert_eq!(pe.accumulator(), 1.0);
    }
}
