//! Display state and register addressing.
//!
//! The TM1638 has 16 display registers.  On the common 8 digit / 8 LED boards the even registers
//! hold the segments of a digit and the odd registers the LED next to it.  The digits are wired in
//! reverse, so digit 0 lives in the highest even register:
//!
//! ```text
//! register  0    1    2    3   ...  12   13   14   15
//!           d7   L1   d6   L2  ...  d1   L7   d0   L8
//! ```

use crate::error::{Error, InvalidBrightness};
use crate::protocol::REGISTER_COUNT;

/// Number of 7-segment digits on the board
pub const DIGIT_COUNT: u8 = 8;

/// Number of discrete LEDs on the board
pub const LED_COUNT: u8 = 8;

/// Segment patterns for the hex digits 0 to F.  Bit 0 is segment `a`, bit 6 segment `g`; the
/// decimal point (bit 7) is never set here, use [`crate::Tm1638::display_dig`] for that.
pub const DIGIT_SEGMENTS: [u8; 16] = [
    0b0011_1111, // 0
    0b0000_0110, // 1
    0b0101_1011, // 2
    0b0100_1111, // 3
    0b0110_0110, // 4
    0b0110_1101, // 5
    0b0111_1101, // 6
    0b0000_0111, // 7
    0b0111_1111, // 8
    0b0110_1111, // 9
    0b0111_0111, // A
    0b0111_1100, // b
    0b0011_1001, // C
    0b0101_1110, // d
    0b0111_1001, // E
    0b0111_0001, // F
];

/// The eight pulse widths the chip can drive the display with, dimmest first.
///
/// The discriminant is what goes in the low three bits of the display control command, so the
/// levels are numbered 0 to 7 even though the duty cycles aren't evenly spaced.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, strum::VariantArray, strum::FromRepr,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Brightness {
    /// 1/16 duty cycle
    #[default]
    Pulse1_16 = 0,
    /// 2/16 duty cycle
    Pulse2_16 = 1,
    /// 4/16 duty cycle
    Pulse4_16 = 2,
    /// 10/16 duty cycle
    Pulse10_16 = 3,
    /// 11/16 duty cycle
    Pulse11_16 = 4,
    /// 12/16 duty cycle
    Pulse12_16 = 5,
    /// 13/16 duty cycle
    Pulse13_16 = 6,
    /// 14/16 duty cycle
    Pulse14_16 = 7,
}

impl Brightness {
    /// The value of the low three bits of the display control command
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Duty cycle numerator, in sixteenths
    pub fn duty_sixteenths(self) -> u8 {
        match self {
            Self::Pulse1_16 => 1,
            Self::Pulse2_16 => 2,
            Self::Pulse4_16 => 4,
            Self::Pulse10_16 => 10,
            Self::Pulse11_16 => 11,
            Self::Pulse12_16 => 12,
            Self::Pulse13_16 => 13,
            Self::Pulse14_16 => 14,
        }
    }
}

impl TryFrom<u8> for Brightness {
    type Error = InvalidBrightness;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::from_repr(level).ok_or(InvalidBrightness(level))
    }
}

/// What the display control command says: whether the display is lit, and how brightly.
///
/// The chip has no way to read this back, so the driver keeps its own copy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayState {
    pub brightness: Brightness,
    pub is_on: bool,
}

/// Register offset holding the segments of digit `digit` (0 is the right-most digit)
pub(crate) fn digit_register<E>(digit: u8) -> Result<u8, Error<E>> {
    if digit >= DIGIT_COUNT {
        return Err(Error::InvalidDigit(digit));
    }

    Ok(14 - digit * 2)
}

/// Register offset holding LED `led` (numbered from 1)
pub(crate) fn led_register<E>(led: u8) -> Result<u8, Error<E>> {
    if !(1..=LED_COUNT).contains(&led) {
        return Err(Error::InvalidLed(led));
    }

    Ok(led * 2 - 1)
}

/// Segment pattern for a hex digit
pub(crate) fn hex_segments<E>(value: u8) -> Result<u8, Error<E>> {
    DIGIT_SEGMENTS
        .get(value as usize)
        .copied()
        .ok_or(Error::InvalidHexValue(value))
}

/// Register offsets of all of the digits, lowest register first
pub(crate) fn digit_registers() -> impl Iterator<Item = u8> {
    (0..REGISTER_COUNT as u8).step_by(2)
}
