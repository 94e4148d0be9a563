/// The number of bytes used to represent the state of the keys on the board
pub const KEY_BYTES: usize = 4;

/// The raw response to a key-scan command, as returned by [`crate::Tm1638::read_scan`].
///
/// According to the datasheet (section 8), the controller scans a 3x8 key matrix and reports it
/// in four bytes, two rows per byte.  Most boards only wire up 8 push buttons though, which is
/// what [`Buttons`] represents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyScan(pub [u8; KEY_BYTES]);

impl KeyScan {
    /// Quickly check if *any* keys are pressed
    pub fn any_pressed(&self) -> bool {
        self.0.iter().any(|byte| *byte != 0)
    }

    /// Fold the four scan bytes into one button mask.
    ///
    /// Byte `i` is shifted left by `i` before being OR-ed in, which is how the 8-button boards
    /// this driver was written for present their buttons.  Only four bytes contribute, so a board
    /// that reports its buttons in the high nibbles will show overlapping bits; verify against
    /// your hardware before relying on S5 to S8.
    pub fn buttons(&self) -> Buttons {
        let mut mask = 0u8;
        for (i, byte) in self.0.iter().enumerate() {
            mask |= byte << i;
        }

        Buttons(mask)
    }
}

impl AsRef<[u8]> for KeyScan {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

/// The eight push buttons, as labelled on the board
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::VariantArray, strum::FromRepr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Button {
    S1 = 0,
    S2 = 1,
    S3 = 2,
    S4 = 3,
    S5 = 4,
    S6 = 5,
    S7 = 6,
    S8 = 7,
}

impl Button {
    /// Bit of [`Buttons`] for this button
    pub fn bit(self) -> u8 {
        self as u8
    }
}

/// State of the eight buttons, one bit per button: bit 0 is [`Button::S1`].
///
/// Iterating yields every pressed button, lowest first.  Feeding [`Self::bits`] straight into
/// [`crate::Tm1638::write_leds`] lights the LED above each pressed button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buttons(pub u8);

impl Buttons {
    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn any_pressed(&self) -> bool {
        self.0 != 0
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.0 & (1 << button.bit()) != 0
    }
}

impl From<Buttons> for u8 {
    fn from(value: Buttons) -> Self {
        value.0
    }
}

/// As buttons are yielded from the iterator, they are cleared from the mask
impl Iterator for Buttons {
    type Item = Button;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            return None;
        }

        let bit = self.0.trailing_zeros() as u8;
        self.0 &= !(1 << bit);

        Button::from_repr(bit)
    }
}
