//! Error types returned by the driver.
//!
//! The TM1638 protocol is open-loop: the chip never acknowledges anything, so a missing or
//! miswired chip looks exactly like a working one from this side of the bus.  The only errors this
//! crate can report are therefore failures of the underlying pins, arguments that would address
//! something the chip doesn't have, and contention on the shared bus when using
//! [`crate::Tm1638::try_lock`].

use core::fmt;

/// Errors that can occur when talking to the TM1638.
///
/// Generic over the error type of the bus driver (ultimately the error type of the GPIO pins), so
/// callers can still match on the underlying hardware error.
///
/// All of the `Invalid*` variants are detected before anything is sent to the chip, so an
/// operation that fails with one of them has not touched the bus at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus driver (GPIO pins) reported an error
    Bus(E),

    /// Digit ids run from 0 to 7
    InvalidDigit(u8),

    /// Only a single hex nibble (0 to 15) can be rendered with the built-in segment table
    InvalidHexValue(u8),

    /// LED numbers run from 1 to 8
    InvalidLed(u8),

    /// Brightness levels run from 0 to 7; see [`crate::Brightness`]
    InvalidBrightness(u8),

    /// Another task currently owns the bus.  Only returned by [`crate::Tm1638::try_lock`]; every
    /// other operation waits for the bus instead.
    Busy,
}

impl<E> From<InvalidBrightness> for Error<E> {
    fn from(value: InvalidBrightness) -> Self {
        Self::InvalidBrightness(value.0)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "Bus error: {e:?}"),
            Self::InvalidDigit(digit) => write!(f, "Invalid digit {digit} (expected 0-7)"),
            Self::InvalidHexValue(value) => {
                write!(f, "Invalid hex value {value} (expected 0-15)")
            }
            Self::InvalidLed(led) => write!(f, "Invalid LED {led} (expected 1-8)"),
            Self::InvalidBrightness(level) => {
                write!(f, "Invalid brightness level {level} (expected 0-7)")
            }
            Self::Busy => write!(f, "Bus is in use by another task"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}

/// A number that doesn't correspond to any of the eight brightness levels the chip supports.
///
/// Returned by `Brightness::try_from(u8)`; converts into [`Error::InvalidBrightness`] with `?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidBrightness(pub u8);

impl fmt::Display for InvalidBrightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid brightness level {} (expected 0-7)", self.0)
    }
}

impl core::error::Error for InvalidBrightness {}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::string::ToString;

    #[test]
    fn invalid_brightness_converts() {
        let err: Error<Infallible> = InvalidBrightness(9).into();
        assert_eq!(err, Error::InvalidBrightness(9));
    }

    #[test]
    fn display_messages() {
        let err: Error<Infallible> = Error::InvalidDigit(8);
        assert_eq!(err.to_string(), "Invalid digit 8 (expected 0-7)");

        let err: Error<&str> = Error::Bus("stuck pin");
        assert_eq!(err.to_string(), "Bus error: \"stuck pin\"");
    }
}
