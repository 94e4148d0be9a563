//! Exclusive access to one TM1638.
//!
//! A [`Device`] is only ever reached through the mutex in [`crate::Tm1638`], either implicitly by
//! the operations on `Tm1638` or explicitly with [`crate::Tm1638::lock`].  Holding `&mut Device`
//! therefore means owning the bus.

use crate::bus::BusDriver;
use crate::display::{self, Brightness, DisplayState};
use crate::error::Error;
use crate::keys::{Button, Buttons, KeyScan};
use crate::protocol::{Protocol, REGISTER_COUNT};

/// Number of on/off cycles run by [`Device::self_test`]
const SELF_TEST_CYCLES: usize = 5;

/// How long each self-test pattern stays up
const SELF_TEST_HOLD_MS: u32 = 1000;

/// The TM1638 operations, without any locking.  See [`crate::Tm1638`] for documentation of each
/// operation.
pub struct Device<D> {
    protocol: Protocol<D>,
    state: DisplayState,
}

impl<D: BusDriver> Device<D> {
    pub(crate) fn new(driver: D) -> Self {
        Self {
            protocol: Protocol::new(driver),
            state: DisplayState::default(),
        }
    }

    pub(crate) fn into_driver(self) -> D {
        self.protocol.into_driver()
    }

    pub fn brightness(&self) -> Brightness {
        self.state.brightness
    }

    pub fn is_on(&self) -> bool {
        self.state.is_on
    }

    pub fn display_state(&self) -> DisplayState {
        self.state
    }

    /// Read the raw key-scan bytes
    pub async fn read_scan(&mut self) -> Result<KeyScan, Error<D::Error>> {
        let scan = self.protocol.read_scan().await.map_err(Error::Bus)?;
        Ok(KeyScan(scan))
    }

    pub async fn get_buttons(&mut self) -> Result<Buttons, Error<D::Error>> {
        Ok(self.read_scan().await?.buttons())
    }

    pub async fn get_button(&mut self, button: Button) -> Result<bool, Error<D::Error>> {
        Ok(self.get_buttons().await?.is_pressed(button))
    }

    pub async fn write_led(&mut self, led: u8, state: bool) -> Result<(), Error<D::Error>> {
        let register = display::led_register(led)?;

        self.protocol
            .write_single(self.state, register, state as u8)
            .await
            .map_err(Error::Bus)
    }

    pub async fn write_leds(&mut self, mask: u8) -> Result<(), Error<D::Error>> {
        let writes = (1..=display::LED_COUNT).map(|led| {
            let register = led * 2 - 1;
            (register, (mask >> (led - 1)) & 0x01)
        });

        self.protocol
            .write_many(self.state, writes)
            .await
            .map_err(Error::Bus)
    }

    pub async fn display_val(&mut self, digit: u8, value: u8) -> Result<(), Error<D::Error>> {
        let register = display::digit_register(digit)?;
        let segments = display::hex_segments(value)?;

        self.protocol
            .write_single(self.state, register, segments)
            .await
            .map_err(Error::Bus)
    }

    pub async fn display_dig(&mut self, digit: u8, segments: u8) -> Result<(), Error<D::Error>> {
        let register = display::digit_register(digit)?;

        self.protocol
            .write_single(self.state, register, segments)
            .await
            .map_err(Error::Bus)
    }

    pub async fn display_clear(&mut self) -> Result<(), Error<D::Error>> {
        let writes = display::digit_registers().map(|register| (register, 0x00));

        self.protocol
            .write_many(self.state, writes)
            .await
            .map_err(Error::Bus)
    }

    pub async fn display_turn_on(&mut self) -> Result<(), Error<D::Error>> {
        self.update_state(DisplayState {
            is_on: true,
            ..self.state
        })
        .await
    }

    pub async fn display_turn_off(&mut self) -> Result<(), Error<D::Error>> {
        self.update_state(DisplayState {
            is_on: false,
            ..self.state
        })
        .await
    }

    pub async fn display_set_brightness(&mut self, level: u8) -> Result<(), Error<D::Error>> {
        let brightness = Brightness::try_from(level)?;

        self.update_state(DisplayState {
            brightness,
            ..self.state
        })
        .await
    }

    pub async fn reset(&mut self) -> Result<(), Error<D::Error>> {
        self.write_all_registers(0x00).await
    }

    pub async fn self_test(&mut self) -> Result<(), Error<D::Error>> {
        let mut pattern = 0x00u8;

        for _ in 0..SELF_TEST_CYCLES {
            #[cfg(feature = "defmt")]
            defmt::debug!("self test pattern {=u8:x}", pattern);

            self.write_all_registers(pattern).await?;
            self.protocol.delay_ms(SELF_TEST_HOLD_MS).await;

            pattern = !pattern;
        }

        Ok(())
    }

    /// Burst `value` into all 16 registers with the display on
    async fn write_all_registers(&mut self, value: u8) -> Result<(), Error<D::Error>> {
        let state = DisplayState {
            is_on: true,
            ..self.state
        };

        self.protocol
            .write_burst(state, 0, &[value; REGISTER_COUNT])
            .await
            .map_err(Error::Bus)?;
        self.state = state;

        Ok(())
    }

    /// Send the display control command for `state`, and remember it once the chip has it
    async fn update_state(&mut self, state: DisplayState) -> Result<(), Error<D::Error>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("display state {:?}", state);

        self.protocol
            .display_control(state)
            .await
            .map_err(Error::Bus)?;
        self.state = state;

        Ok(())
    }
}
