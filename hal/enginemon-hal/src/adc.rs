//! ADC abstractions

/// Errors from an ADC conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcError {
    /// Conversion did not complete
    Timeout,
    /// Peripheral reported a conversion fault
    Conversion,
}

/// ADC channel reader
pub trait AdcReader {
    /// Full-scale raw value (4095 for a 12-bit converter)
    fn max_value(&self) -> u16;

    /// Take one raw sample
    fn read(&mut self) -> Result<u16, AdcError>;
}
