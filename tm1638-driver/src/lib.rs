//! Async driver for the TM1638 LED driver and key-scan controller, as found on the common boards
//! with eight 7-segment digits, eight LEDs and eight push buttons.
//!
//! The chip talks over a three-wire bus (CLK, STB and a bidirectional DIO) which this crate bit
//! bangs over any [`Pins`] implementation, paced by any [`Timer`].  A single [`Tm1638`] can be
//! shared by several async tasks; each operation takes the bus for its whole transfer, so the
//! strobe windows of two tasks never interleave.
//!
//! The protocol is open-loop.  The chip never acknowledges anything, so nothing here can tell a
//! working board from a disconnected one.
#![cfg_attr(not(test), no_std)]

mod bus;
mod device;
mod display;
mod error;
mod keys;
#[cfg(test)]
mod mock;
mod pins;
mod protocol;

use core::marker::PhantomData;

use embassy_sync::blocking_mutex::raw::{NoopRawMutex, RawMutex};
use embassy_sync::mutex::{Mutex, MutexGuard};

pub use bus::{BitBangingBusDriver, BitOrder, BusDriver, Timer};
#[cfg(feature = "embassy-time")]
pub use bus::EmbassyTimeTimer;
pub use device::Device;
pub use display::{Brightness, DisplayState, DIGIT_COUNT, DIGIT_SEGMENTS, LED_COUNT};
pub use error::{Error, InvalidBrightness};
pub use keys::{Button, Buttons, KeyScan, KEY_BYTES};
#[cfg(feature = "embassy-rp")]
pub use pins::EmbassyRpPins;
pub use pins::{DioDirection, HalPins, Pins};

pub struct Tm1638Builder;

impl Tm1638Builder {
    /// Use an arbitrary [`BusDriver`] implementation; nothing more needs to be specified!
    pub fn with_bus_driver<D: BusDriver>(self, driver: D) -> Tm1638Builder3<D> {
        Tm1638Builder3 { driver }
    }

    /// Use an arbitrary [`Timer`] implementation with this bus driver.
    pub fn with_timer<T: Timer>(self) -> Tm1638Builder1<T> {
        Tm1638Builder1 {
            _timer: PhantomData,
        }
    }

    #[cfg(feature = "embassy-time")]
    /// Use the [`Timer`] implementation built using `embassy-time`
    pub fn with_embassy_timer(self) -> Tm1638Builder1<EmbassyTimeTimer> {
        self.with_timer::<EmbassyTimeTimer>()
    }
}

pub struct Tm1638Builder1<T: Timer> {
    _timer: PhantomData<T>,
}

impl<T: Timer> Tm1638Builder1<T> {
    /// Use the bit-banging driver, with an arbitrary implementation of [`Pins`] specific to your
    /// target platform
    pub fn with_bit_banging_driver<P: Pins>(self, pins: P) -> Tm1638Builder2<P, T> {
        Tm1638Builder2 {
            _timer: self._timer,
            pins,
        }
    }

    /// Use a bit-banging driver talking to the specified Embassy RP HAL pins
    #[cfg(feature = "embassy-rp")]
    pub fn with_embassy_rp_pins<
        'a,
        ClockPin: embassy_rp::gpio::Pin,
        DioPin: embassy_rp::gpio::Pin,
        StrobePin: embassy_rp::gpio::Pin,
    >(
        self,
        clock: ClockPin,
        dio: DioPin,
        strobe: StrobePin,
    ) -> Tm1638Builder2<EmbassyRpPins<'a, ClockPin, DioPin, StrobePin>, T> {
        self.with_bit_banging_driver(EmbassyRpPins::new(clock, dio, strobe))
    }
}

pub struct Tm1638Builder2<P: Pins, T: Timer> {
    pins: P,
    _timer: PhantomData<T>,
}

impl<P: Pins, T: Timer> Tm1638Builder2<P, T> {
    /// Construct the [`Tm1638`] instance using the bit-banging driver.  This drives all three
    /// lines high, which is the idle state of the bus.
    ///
    /// This is fallible if the underling I/O implementation is.
    pub fn build<M: RawMutex>(self) -> Result<Tm1638<M, BitBangingBusDriver<P, T>>, P::Error> {
        let driver = BitBangingBusDriver::new(self.pins)?;
        Ok(Tm1638::new(driver))
    }
}

pub struct Tm1638Builder3<D: BusDriver> {
    driver: D,
}

impl<D: BusDriver> Tm1638Builder3<D> {
    /// Construct the [`Tm1638`] instance using the selected driver.
    pub fn build<M: RawMutex>(self) -> Tm1638<M, D> {
        Tm1638::new(self.driver)
    }
}

/// Driver for TM1638 display and switch controllers.
///
/// The implementation is generalized over the implementation of the underling bus protocol driver,
/// behind the [`BusDriver`] trait, and over the kind of mutex that guards it.  Use
/// `CriticalSectionRawMutex` to share one instance between tasks (or interrupt priorities), or
/// `NoopRawMutex` when everything runs in one executor.
///
/// Every operation takes `&self`, locks the bus for as long as its transfer takes, and waits if
/// another task has it.  To run several operations back to back with nothing in between, hold the
/// guard returned by [`Self::lock`] and call them on the [`Device`] it derefs to.
///
/// The most straightforward way to instantiate this driver is using [`Self::builder`] which
/// returns a builder type with which you can get easy access to the built-in implementations.
///
/// For example, to use the `embassy-time` timer implementation and the `embassy-rp` HAL for
/// RP2040:
///
/// ```
/// # #[cfg(all(feature = "embassy-time", feature = "embassy-rp"))]
/// # {
/// use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
///
/// let p = embassy_rp::init(Default::default());
/// let tm1638: tm1638_driver::Tm1638<CriticalSectionRawMutex, _> = tm1638_driver::Tm1638::builder()
///     .with_embassy_timer()
///     .with_embassy_rp_pins(p.PIN_6, p.PIN_7, p.PIN_8)
///     .build()
///     .unwrap();
/// # }
/// ```
pub struct Tm1638<M: RawMutex, D> {
    device: Mutex<M, Device<D>>,
}

impl Tm1638<NoopRawMutex, ()> {
    /// Return a builder pattern implementation to ease some of the type parameter complexity
    /// around creating the bus driver and timer.
    ///
    /// This is not required; you can always instantiate the driver without a builder, but you
    /// might have to type more angle brackets to do so.
    pub fn builder() -> Tm1638Builder {
        Tm1638Builder
    }
}

impl<M: RawMutex, D: BusDriver> Tm1638<M, D> {
    /// Wrap a bus driver that is already in its idle state.  The display is assumed to be off at
    /// the lowest brightness, which is how the chip powers up; nothing is sent to it.
    pub fn new(driver: D) -> Self {
        Self {
            device: Mutex::new(Device::new(driver)),
        }
    }

    /// Give back the bus driver
    pub fn into_driver(self) -> D {
        self.device.into_inner().into_driver()
    }

    /// Take the bus, waiting for whoever has it now to finish
    pub async fn lock(&self) -> MutexGuard<'_, M, Device<D>> {
        self.device.lock().await
    }

    /// Take the bus if nobody else has it, without waiting
    pub fn try_lock(&self) -> Result<MutexGuard<'_, M, Device<D>>, Error<D::Error>> {
        self.device.try_lock().map_err(|_| Error::Busy)
    }

    /// Raw key-scan data, as the chip reports it
    pub async fn read_scan(&self) -> Result<KeyScan, Error<D::Error>> {
        self.lock().await.read_scan().await
    }

    /// Which of the eight buttons are pressed right now.
    ///
    /// Only reads the keys; the display is not touched.
    pub async fn get_buttons(&self) -> Result<Buttons, Error<D::Error>> {
        self.lock().await.get_buttons().await
    }

    /// Whether one button is pressed right now
    pub async fn get_button(&self, button: Button) -> Result<bool, Error<D::Error>> {
        self.lock().await.get_button(button).await
    }

    /// Turn LED `led` (1 to 8) on or off
    pub async fn write_led(&self, led: u8, state: bool) -> Result<(), Error<D::Error>> {
        self.lock().await.write_led(led, state).await
    }

    /// Set all eight LEDs at once: bit 0 of `mask` is LED 1, bit 7 LED 8
    pub async fn write_leds(&self, mask: u8) -> Result<(), Error<D::Error>> {
        self.lock().await.write_leds(mask).await
    }

    /// Show the hex digit `value` (0 to 15) on digit `digit` (0 to 7, 0 being the right-most)
    pub async fn display_val(&self, digit: u8, value: u8) -> Result<(), Error<D::Error>> {
        self.lock().await.display_val(digit, value).await
    }

    /// Light the segments in `segments` on digit `digit`.  Bit 0 is segment `a`, bit 6 segment
    /// `g` and bit 7 the decimal point.
    pub async fn display_dig(&self, digit: u8, segments: u8) -> Result<(), Error<D::Error>> {
        self.lock().await.display_dig(digit, segments).await
    }

    /// Blank all eight digits.  LEDs are left alone.
    pub async fn display_clear(&self) -> Result<(), Error<D::Error>> {
        self.lock().await.display_clear().await
    }

    /// Light the display at the current brightness, showing whatever the registers hold
    pub async fn display_turn_on(&self) -> Result<(), Error<D::Error>> {
        self.lock().await.display_turn_on().await
    }

    /// Blank the display without losing what it shows; turning it back on restores it at the same
    /// brightness.
    pub async fn display_turn_off(&self) -> Result<(), Error<D::Error>> {
        self.lock().await.display_turn_off().await
    }

    /// Set the brightness level, 0 (dimmest) to 7.  Takes effect immediately if the display is on,
    /// and is remembered if it's off.
    pub async fn display_set_brightness(&self, level: u8) -> Result<(), Error<D::Error>> {
        self.lock().await.display_set_brightness(level).await
    }

    /// Clear all 16 display registers, digits and LEDs alike, in a single transfer.  Also turns the
    /// display on.
    pub async fn reset(&self) -> Result<(), Error<D::Error>> {
        self.lock().await.reset().await
    }

    /// Flash every segment and LED on and off five times, a second per step.  Turns the display on
    /// first, at the current brightness, and leaves it on and blank.
    ///
    /// Holds the bus for the whole five seconds.
    pub async fn self_test(&self) -> Result<(), Error<D::Error>> {
        self.lock().await.self_test().await
    }

    /// The last brightness sent to the chip
    pub async fn brightness(&self) -> Brightness {
        self.lock().await.brightness()
    }

    /// Whether the display was last turned on or off.  The chip can't be asked.
    pub async fn is_on(&self) -> bool {
        self.lock().await.is_on()
    }
}
