//! The TM1638 instruction set, and the sequences of strobe windows that make up each kind of
//! transfer.
//!
//! See section 5 of the datasheet for the instruction encodings and section 9 for the transfer
//! sequences.

use crate::bus::BusDriver;
use crate::display::{Brightness, DisplayState};
use crate::keys::KEY_BYTES;

/// Data command: write to display registers, address increments after each byte
pub(crate) const COMMAND_WRITE_AUTO: u8 = 0b0100_0000;
/// Data command: write to display registers, address stays fixed
pub(crate) const COMMAND_WRITE_FIXED: u8 = 0b0100_0100;
/// Data command: read key-scan data
pub(crate) const COMMAND_READ_KEYS: u8 = 0b0100_0010;
/// Display control command with the display off; brightness goes in the low 3 bits
pub(crate) const DISPLAY_OFF: u8 = 0b1000_0000;
/// Display control command with the display on
pub(crate) const DISPLAY_ON: u8 = 0b1000_1000;
/// Address command for the first display register; the register offset goes in the low 4 bits
pub(crate) const ADDRESS_BASE: u8 = 0b1100_0000;
/// Number of display registers
pub(crate) const REGISTER_COUNT: usize = 16;

/// Addressing mode set by a data command
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Addressing {
    /// Each data byte goes to the next register
    Incremental,
    /// Each data byte goes to the addressed register
    Fixed,
}

/// Represents possible write-only commands sent to the TM1638 as Rust enums for greater
/// readability.
pub(crate) enum WriteCommand<'a> {
    /// Turn the display on or off, and set its brightness.  Turning it off doesn't lose the
    /// register contents; they show up again when it is turned back on.
    DisplayControl { on: bool, brightness: Brightness },

    /// Select the addressing mode for subsequent data writes
    SetAddressing(Addressing),

    /// Set the register address and write one or more bytes starting there.
    /// Only write more than one byte in incremental addressing mode.
    WriteData {
        /// Register offset, 0 to 15
        offset: u8,
        data: &'a [u8],
    },
}

impl<'a> WriteCommand<'a> {
    /// Convert this command into the appropriate byte sequence to send to the controller.
    ///
    /// Return value is a tuple consisting of the following:
    ///
    /// - Command byte to send to controller
    /// - (Optional) slice of data bytes to send along with command byte
    ///
    /// The command byte and data bytes (if any) are sent together, during a single interval in
    /// which the strobe pin is pulled low.
    fn encode<'me>(&'me self) -> (u8, Option<&'me [u8]>)
    where
        'a: 'me,
    {
        match self {
            WriteCommand::DisplayControl { on, brightness } => {
                // Section 5.3: bit 3 is on/off, the lowest three bits the pulse width
                let base = if *on { DISPLAY_ON } else { DISPLAY_OFF };
                (base | brightness.bits(), None)
            }
            WriteCommand::SetAddressing(Addressing::Incremental) => (COMMAND_WRITE_AUTO, None),
            WriteCommand::SetAddressing(Addressing::Fixed) => (COMMAND_WRITE_FIXED, None),
            WriteCommand::WriteData { offset, data } => {
                #[cfg(feature = "defmt")]
                defmt::debug_assert!((*offset as usize) + data.len() <= REGISTER_COUNT);
                (ADDRESS_BASE | (offset & 0b0000_1111), Some(data))
            }
        }
    }
}

/// Represents possible read commands sent to the TM1638 which read data from the controller
pub(crate) enum ReadCommand {
    /// Request the controller to send four bytes of key scanning data reflecting current state of
    /// keys
    ReadKeys,
}

impl ReadCommand {
    /// Command byte, and the number of bytes to read back in the same strobe window
    fn encode(&self) -> (u8, usize) {
        match self {
            ReadCommand::ReadKeys => (COMMAND_READ_KEYS, KEY_BYTES),
        }
    }
}

/// Issues whole TM1638 transfers over a [`BusDriver`].
///
/// Every display write is preceded by a display control command carrying the current
/// [`DisplayState`], then the data command that selects the addressing mode, each in its own
/// strobe window, as in the datasheet's transfer diagrams.
pub(crate) struct Protocol<D> {
    driver: D,
}

impl<D: BusDriver> Protocol<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Send the display control command for `state`
    pub async fn display_control(&mut self, state: DisplayState) -> Result<(), D::Error> {
        self.apply_write_command(WriteCommand::DisplayControl {
            on: state.is_on,
            brightness: state.brightness,
        })
        .await
    }

    /// Write one byte to the register at `offset`
    pub async fn write_single(
        &mut self,
        state: DisplayState,
        offset: u8,
        value: u8,
    ) -> Result<(), D::Error> {
        self.write_many(state, [(offset, value)]).await
    }

    /// Write a byte to each of several registers, each with its own address, in fixed
    /// addressing mode
    pub async fn write_many(
        &mut self,
        state: DisplayState,
        writes: impl IntoIterator<Item = (u8, u8)>,
    ) -> Result<(), D::Error> {
        self.display_control(state).await?;
        self.apply_write_command(WriteCommand::SetAddressing(Addressing::Fixed))
            .await?;

        for (offset, value) in writes {
            self.apply_write_command(WriteCommand::WriteData {
                offset,
                data: core::slice::from_ref(&value),
            })
            .await?;
        }

        Ok(())
    }

    /// Write `values` to consecutive registers starting at `offset`, all in one strobe window
    pub async fn write_burst(
        &mut self,
        state: DisplayState,
        offset: u8,
        values: &[u8],
    ) -> Result<(), D::Error> {
        self.display_control(state).await?;
        self.apply_write_command(WriteCommand::SetAddressing(Addressing::Incremental))
            .await?;

        self.apply_write_command(WriteCommand::WriteData {
            offset,
            data: values,
        })
        .await
    }

    /// Read the four key-scan bytes
    pub async fn read_scan(&mut self) -> Result<[u8; KEY_BYTES], D::Error> {
        let mut buffer = [0u8; KEY_BYTES];

        self.apply_read_command(ReadCommand::ReadKeys, &mut buffer)
            .await?;

        #[cfg(feature = "defmt")]
        defmt::trace!("keys = {:?}", buffer);

        Ok(buffer)
    }

    pub async fn delay_ms(&mut self, ms: u32) {
        self.driver.delay_ms(ms).await
    }

    /// Apply the command to the controller
    async fn apply_write_command(&mut self, command: WriteCommand<'_>) -> Result<(), D::Error> {
        let (command_byte, data_bytes) = command.encode();

        #[cfg(feature = "defmt")]
        defmt::trace!("command byte = {=u8:x}", command_byte);

        match data_bytes {
            Some(data_bytes) => {
                self.driver
                    .send_command_write_data(command_byte, data_bytes)
                    .await
            }
            None => self.driver.send_command(command_byte).await,
        }
    }

    async fn apply_read_command(
        &mut self,
        command: ReadCommand,
        read_buffer: &mut [u8],
    ) -> Result<(), D::Error> {
        let (command_byte, read_bytes) = command.encode();

        #[cfg(feature = "defmt")]
        defmt::trace!("command byte = {=u8:x}", command_byte);

        #[cfg(feature = "defmt")]
        defmt::debug_assert!(read_bytes <= read_buffer.len());

        // Limit the read buffer to just the range needed to store these results
        let read_buffer = &mut read_buffer[..read_bytes];

        self.driver
            .send_command_read_data(command_byte, read_buffer)
            .await
    }
}
