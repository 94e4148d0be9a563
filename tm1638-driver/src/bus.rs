//! Module describing the [`BusDriver`] trait, the [`Timer`] it is paced by, and the bit-banging
//! implementation that drives the bus over three [`Pins`].

// This module defines traits w/ async methods.  That triggers a warning due to the very...limited
// support for this in the current Rust version.  However this pertains only to the use of futures
// returned by async methods in multi-threaded executors.  As this crate is meant for use on
// embedded microcontrollers without any concept of threads, this does not concern us at all
#![allow(async_fn_in_trait)]

use core::marker::PhantomData;

use crate::pins::{DioDirection, Pins};

/// This trait represents some low-level implementation of the TM1638 bus interface.
///
/// The TM1638 uses a three-wire bus similar to SPI, but not so similar that we can just use an SPI
/// implementation instead.  This trait exposes a byte-level interface where each call is exactly
/// one strobe window: STB is pulled low, the bytes are transferred LSB first, STB is released, and
/// the implementation waits for the chip to settle before returning.
///
/// [`BitBangingBusDriver`] implements it on top of any [`Pins`] and [`Timer`].
pub trait BusDriver {
    type Error;

    /// Send a single command, with no payload, and no response expected
    async fn send_command(&mut self, b: u8) -> Result<(), Self::Error>;

    /// Send a command with a data payload, but no response expected.
    async fn send_command_write_data(&mut self, b: u8, data: &[u8]) -> Result<(), Self::Error>;

    /// Send a command which is expected to generate a response.
    ///
    /// The expected size of the response (in bytes) is determined by the size of the `data` slice.
    /// This operation will return once enough bytes are received to fill `data`.
    async fn send_command_read_data(&mut self, b: u8, data: &mut [u8]) -> Result<(), Self::Error>;

    /// Pause for a human-visible amount of time without giving up the bus
    async fn delay_ms(&mut self, ms: u32);
}

/// Abstraction on platform-specific timers to provide a generic way to pause the bus driver
/// execution in order to implement the TM1638 bus protocol correctly.
///
/// The timer situation on embedded Rust is still quite unstable, with competing timer
/// implementations, including `embasssy_time`, `embedded-time`, `fugit`, and probably others.  To
/// avoid picking a side, this very simple timer trait needs to be implemented in terms of whatever
/// your preferred timer implementation is.  Tests implement it with no delay at all.
pub trait Timer {
    /// Wait for the clock interval to ensure an outgoing value on the DIO pin is read.
    /// This should be at least 1us.  It can be more, but obviously that impacts the speed with
    /// which we can communicate with the board.
    async fn wait_clock_tick();

    /// Wait for the tWAIT interval defined in section 12 of the datasheet, Timing Characteristics,
    /// between sending the key-scan command and clocking in the response.  By default it is
    /// implemented in terms of `wait_clock_tick`
    async fn wait_twait() {
        Self::wait_clock_tick().await
    }

    /// Wait after releasing STB (and between key-scan bytes) before the next transfer.  Must not
    /// be zero on real hardware; by default it is implemented in terms of `wait_clock_tick`
    async fn wait_settle() {
        Self::wait_clock_tick().await
    }

    /// Wait for `ms` milliseconds.  Only used by the display self-test.
    async fn wait_ms(ms: u32);
}

#[cfg(feature = "embassy-time")]
mod embassy_time_timer {
    use embassy_time::{Duration, Timer as EmbassyTimer};

    /// Use a 1uS clock tick to ensure the TM1638 picks up the value
    const CLOCK_TICK: Duration = Duration::from_micros(1);

    /// The interval to wait after sending the button read command, before reading data
    /// Corresponds to tWAIT in section 12 of the datasheet, under Timing Characteristics.
    const TWAIT: Duration = Duration::from_micros(1);

    /// Pause after each strobe window
    const SETTLE: Duration = Duration::from_micros(5);

    pub struct EmbassyTimeTimer;

    impl super::Timer for EmbassyTimeTimer {
        async fn wait_clock_tick() {
            EmbassyTimer::after(CLOCK_TICK).await
        }

        async fn wait_twait() {
            EmbassyTimer::after(TWAIT).await
        }

        async fn wait_settle() {
            EmbassyTimer::after(SETTLE).await
        }

        async fn wait_ms(ms: u32) {
            EmbassyTimer::after_millis(ms as u64).await
        }
    }
}

#[cfg(feature = "embassy-time")]
pub use embassy_time_timer::EmbassyTimeTimer;

/// Order in which the bits of a byte travel over DIO.  The TM1638 is LSB first.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

impl BitOrder {
    /// Index of the bit that travels in slot `slot` (0 to 7)
    fn bit_index(self, slot: u8) -> u8 {
        match self {
            Self::LsbFirst => slot,
            Self::MsbFirst => 7 - slot,
        }
    }
}

/// Implementation of [`BusDriver`] that toggles the three [`Pins`] directly.
///
/// Works with any [`Timer`] implementation, although the implementation activated by the
/// `embassy-time` feature is the most obvious choice.
pub struct BitBangingBusDriver<P: Pins, T: Timer> {
    pins: P,
    _timer: PhantomData<T>,
}

impl<P: Pins, T: Timer> BitBangingBusDriver<P, T> {
    /// Take ownership of the pins and put the bus in its idle state: all three lines are outputs
    /// and high.
    pub fn new(mut pins: P) -> Result<Self, P::Error> {
        pins.set_dio_direction(DioDirection::Output)?;
        pins.set_strobe(true)?;
        pins.set_clock(true)?;
        pins.set_dio(true)?;

        Ok(Self {
            pins,
            _timer: PhantomData,
        })
    }

    /// Give the pins back
    pub fn release(self) -> P {
        self.pins
    }

    /// Shift the byte value out on the DIO pin, waiting an appropriate period of time between
    /// clock edges to ensure the TM1638 can keep up.
    pub async fn shift_out(&mut self, order: BitOrder, b: u8) -> Result<(), P::Error> {
        shift_out::<P, T>(&mut self.pins, order, b).await
    }
}

/// The chip reads DIO on the rising edge of CLK, so CLK is pulled low before DIO changes and goes
/// high once the bit has had a tick to settle.  CLK ends high, which is its idle level.
async fn shift_out<P: Pins, T: Timer>(pins: &mut P, order: BitOrder, b: u8) -> Result<(), P::Error> {
    for slot in 0..8 {
        let value = (b & (1 << order.bit_index(slot))) != 0;

        pins.set_clock(false)?;
        pins.set_dio(value)?;
        T::wait_clock_tick().await;

        pins.set_clock(true)?;
        T::wait_clock_tick().await;
    }

    Ok(())
}

/// The part of [`BusDriver::send_command_write_data`] that happens with STB low
async fn write_window<P: Pins, T: Timer>(pins: &mut P, b: u8, data: &[u8]) -> Result<(), P::Error> {
    shift_out::<P, T>(pins, BitOrder::LsbFirst, b).await?;
    for b in data {
        #[cfg(feature = "defmt")]
        defmt::trace!("data byte = {=u8:x}", b);
        shift_out::<P, T>(pins, BitOrder::LsbFirst, *b).await?;
    }

    Ok(())
}

/// The part of [`BusDriver::send_command_read_data`] that happens with STB low
async fn read_window<P: Pins, T: Timer>(
    pins: &mut P,
    b: u8,
    data: &mut [u8],
) -> Result<(), P::Error> {
    shift_out::<P, T>(pins, BitOrder::LsbFirst, b).await?;

    // We will be reading from DIO.  If anything below fails, dropping `dio` puts the pin back
    // to output before the window is closed.
    let mut dio = ListeningDio::listen(pins)?;

    // Wait Twait interval before reading response
    T::wait_twait().await;

    #[cfg(feature = "defmt")]
    defmt::trace!("Expecting {0} bytes from controller", data.len());

    for byte in data.iter_mut() {
        *byte = dio.shift_in::<T>(BitOrder::LsbFirst).await?;
        T::wait_settle().await;
    }

    // Done reading from DIO, put it back to output
    dio.restore()
}

impl<P: Pins, T: Timer> BusDriver for BitBangingBusDriver<P, T> {
    type Error = P::Error;

    /// Send a single byte that represents a command, so strobe will be pulled low
    /// before the command's bits are sent, and then pulled high again after.
    async fn send_command(&mut self, b: u8) -> Result<(), Self::Error> {
        self.send_command_write_data(b, &[]).await
    }

    /// Send a single byte that represents a command followed by zero or more data bytes, so strobe
    /// will be pulled low before the command's bits are sent, and not pulled high again
    /// until after the data bytes are sent.
    async fn send_command_write_data(&mut self, b: u8, data: &[u8]) -> Result<(), Self::Error> {
        let mut window = StrobeWindow::open(&mut self.pins)?;
        let transfer = write_window::<P, T>(window.pins(), b, data).await;
        let released = window.close();
        T::wait_settle().await;

        transfer.and(released)
    }

    /// Send a single byte that represents a command and which expects a response back from the
    /// controller, so strobe will be pulled low before the command's bits are sent, and then
    /// pulled high again after all bytes are read.
    async fn send_command_read_data(
        &mut self,
        b: u8,
        data: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut window = StrobeWindow::open(&mut self.pins)?;
        let transfer = read_window::<P, T>(window.pins(), b, data).await;
        let released = window.close();
        T::wait_settle().await;

        transfer.and(released)
    }

    async fn delay_ms(&mut self, ms: u32) {
        T::wait_ms(ms).await
    }
}

/// STB held low for one transfer.
///
/// STB is released even when the transfer failed, so the next transaction starts from idle.  If
/// the future doing the transfer is dropped halfway, dropping the window releases STB and idles
/// CLK, and the chip throws away the partial byte instead of carrying it into the next caller's
/// window.
struct StrobeWindow<'a, P: Pins> {
    pins: &'a mut P,
    open: bool,
}

impl<'a, P: Pins> StrobeWindow<'a, P> {
    fn open(pins: &'a mut P) -> Result<Self, P::Error> {
        pins.set_strobe(false)?;

        Ok(Self { pins, open: true })
    }

    fn pins(&mut self) -> &mut P {
        &mut *self.pins
    }

    /// Release STB
    fn close(mut self) -> Result<(), P::Error> {
        self.open = false;
        self.pins.set_strobe(true)
    }
}

impl<'a, P: Pins> Drop for StrobeWindow<'a, P> {
    fn drop(&mut self) {
        if self.open {
            // STB goes first so the chip doesn't take the CLK edge as another bit
            let _ = self.pins.set_strobe(true);
            let _ = self.pins.set_clock(true);
        }
    }
}

/// The DIO pin while it is switched to input.
///
/// Reading is only possible through this guard, and the guard puts DIO back to output when it
/// goes away, so there is no path out of a read that leaves the chip and the MCU both driving
/// the line.  Call [`Self::restore`] on the normal path to find out whether that worked.
struct ListeningDio<'a, P: Pins> {
    pins: &'a mut P,
    restored: bool,
}

impl<'a, P: Pins> ListeningDio<'a, P> {
    fn listen(pins: &'a mut P) -> Result<Self, P::Error> {
        pins.set_dio_direction(DioDirection::Input)?;

        Ok(Self {
            pins,
            restored: false,
        })
    }

    /// Shift a byte value in from the DIO pin, using the CLK pin to drive the controller to send
    /// data.
    ///
    /// The chip changes DIO after the falling edge of CLK, so the bit is sampled once CLK has been
    /// low for a tick, just before the rising edge.
    async fn shift_in<T: Timer>(&mut self, order: BitOrder) -> Result<u8, P::Error> {
        let mut value = 0;

        for slot in 0..8 {
            self.pins.set_clock(false)?;
            T::wait_clock_tick().await;

            if self.pins.read_dio()? {
                value |= 1 << order.bit_index(slot);
            }

            self.pins.set_clock(true)?;
            T::wait_clock_tick().await;
        }

        Ok(value)
    }

    /// Switch DIO back to output
    fn restore(mut self) -> Result<(), P::Error> {
        let result = self.pins.set_dio_direction(DioDirection::Output);
        self.restored = result.is_ok();
        result
    }
}

impl<'a, P: Pins> Drop for ListeningDio<'a, P> {
    fn drop(&mut self) {
        if !self.restored {
            // Nowhere to report a failure from here; the caller is already returning an error
            let _ = self.pins.set_dio_direction(DioDirection::Output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{self, MockError, MockPins, NoDelay, YieldingTimer};
    use embassy_futures::block_on;
    use embassy_futures::select::{select, Either};

    fn driver() -> (
        BitBangingBusDriver<MockPins, NoDelay>,
        std::rc::Rc<core::cell::RefCell<crate::mock::BusLog>>,
    ) {
        let pins = MockPins::new();
        let log = pins.log();
        (BitBangingBusDriver::new(pins).unwrap(), log)
    }

    #[test]
    fn new_idles_all_lines_high() {
        let (_driver, log) = driver();
        let log = log.borrow();

        assert!(log.clock && log.strobe && log.dio);
        assert_eq!(log.direction, DioDirection::Output);
        assert!(log.windows.is_empty());
    }

    #[test]
    fn command_is_one_window_lsb_first() {
        let (mut driver, log) = driver();

        block_on(driver.send_command(0x8a)).unwrap();
        block_on(driver.send_command_write_data(0xc3, &[0x01, 0xf0])).unwrap();

        let log = log.borrow();
        assert_eq!(log.windows.len(), 2);
        assert_eq!(log.windows[0].out, [0x8a]);
        assert_eq!(log.windows[1].out, [0xc3, 0x01, 0xf0]);
        assert!(log.violations.is_empty(), "{:?}", log.violations);
        assert!(log.strobe && log.clock);
    }

    #[test]
    fn msb_first_reverses_bits_on_the_wire() {
        let (mut driver, log) = driver();

        block_on(async {
            driver.pins.set_strobe(false).unwrap();
            driver.shift_out(BitOrder::MsbFirst, 0b0000_0011).await.unwrap();
            driver.pins.set_strobe(true).unwrap();
        });

        // The mock decodes LSB first, like the chip
        assert_eq!(log.borrow().windows[0].out, [0b1100_0000]);
    }

    #[test]
    fn read_window_shifts_in_response_and_restores_dio() {
        let (mut driver, log) = driver();
        log.borrow_mut().queue_scan([0x01, 0x20, 0x00, 0x84]);

        let mut data = [0u8; 4];
        block_on(driver.send_command_read_data(0x42, &mut data)).unwrap();

        assert_eq!(data, [0x01, 0x20, 0x00, 0x84]);

        let log = log.borrow();
        assert_eq!(log.windows.len(), 1);
        assert_eq!(log.windows[0].out, [0x42]);
        assert_eq!(log.windows[0].input, [0x01, 0x20, 0x00, 0x84]);
        assert_eq!(log.direction, DioDirection::Output);
        assert!(log.violations.is_empty(), "{:?}", log.violations);
    }

    #[test]
    fn failed_read_still_restores_dio_and_strobe() {
        let (mut driver, log) = driver();
        log.borrow_mut().fail_reads = true;

        let mut data = [0u8; 4];
        let result = block_on(driver.send_command_read_data(0x42, &mut data));

        assert_eq!(result, Err(MockError));

        let log = log.borrow();
        assert_eq!(log.direction, DioDirection::Output);
        assert!(log.strobe);
        assert!(log.violations.is_empty(), "{:?}", log.violations);
    }

    #[test]
    fn dropped_write_releases_strobe() {
        let pins = MockPins::new();
        let log = pins.log();
        let mut driver: BitBangingBusDriver<MockPins, YieldingTimer> =
            BitBangingBusDriver::new(pins).unwrap();

        // Gives up partway through the first data byte
        let outcome = block_on(select(
            driver.send_command_write_data(0xc0, &[0x12, 0x34, 0x56]),
            mock::yield_times(20),
        ));
        assert!(matches!(outcome, Either::Second(())));
        {
            let log = log.borrow();
            assert!(log.strobe && log.clock);
            assert_eq!(log.windows.len(), 1);
            assert_eq!(log.windows[0].out, [0xc0]);
        }

        block_on(driver.send_command_write_data(0xce, &[0x06])).unwrap();

        let log = log.borrow();
        assert_eq!(log.windows.len(), 2);
        assert_eq!(log.windows[1].out, [0xce, 0x06]);
        assert!(!log.violations.contains(&"STB pulled low inside another window"));
    }

    #[test]
    fn dropped_read_restores_dio_before_strobe() {
        let pins = MockPins::new();
        let log = pins.log();
        let mut driver: BitBangingBusDriver<MockPins, YieldingTimer> =
            BitBangingBusDriver::new(pins).unwrap();
        log.borrow_mut().queue_scan([0xff; 4]);

        // Command byte is 16 yields, so this lands in the first response byte
        let mut data = [0u8; 4];
        let outcome = block_on(select(
            driver.send_command_read_data(0x42, &mut data),
            mock::yield_times(24),
        ));
        assert!(matches!(outcome, Either::Second(())));

        let log = log.borrow();
        assert!(log.strobe);
        assert_eq!(log.direction, DioDirection::Output);
        assert!(!log.violations.contains(&"STB released while DIO is an input"));
    }

    #[test]
    fn bit_index_orders() {
        assert_eq!(BitOrder::LsbFirst.bit_index(0), 0);
        assert_eq!(BitOrder::LsbFirst.bit_index(7), 7);
        assert_eq!(BitOrder::MsbFirst.bit_index(0), 7);
        assert_eq!(BitOrder::MsbFirst.bit_index(7), 0);
    }
}
