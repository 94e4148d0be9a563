//! The three GPIO lines of the TM1638 bus, and implementations for the HALs supported by this
//! crate.

/// Direction of the bidirectional DIO line.
///
/// The line is [`DioDirection::Output`] almost all the time.  It only flips to
/// [`DioDirection::Input`] while the chip clocks out key-scan data, inside a single strobe window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DioDirection {
    /// The MCU drives DIO
    Output,
    /// The chip drives DIO and the MCU samples it
    Input,
}

/// The pins connected to the TM1638: clock (CLK), strobe (STB) and data (DIO).
///
/// This is the lowest level the driver needs; everything above it is written in terms of these
/// five operations.  Implement it for your HAL if neither of the built-in implementations fits.
///
/// Sadly, due to [this issue](https://github.com/rust-embedded/embedded-hal/issues/397), there is
/// no embedded-hal trait for a pin that can switch direction at runtime, so that part is left to
/// the implementation.  [`HalPins`] works around it with an open-drain DIO pin.
pub trait Pins {
    type Error;

    /// Drive the CLK line
    fn set_clock(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Drive the STB line.  Low means a transaction is in progress.
    fn set_strobe(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Drive the DIO line.  Only meaningful while DIO is an output.
    fn set_dio(&mut self, high: bool) -> Result<(), Self::Error>;

    /// Sample the DIO line.  Only meaningful while DIO is an input.
    fn read_dio(&mut self) -> Result<bool, Self::Error>;

    /// Switch DIO between driving and listening
    fn set_dio_direction(&mut self, direction: DioDirection) -> Result<(), Self::Error>;
}

/// [`Pins`] implemented with the `embedded-hal` 1.0 digital traits.
///
/// CLK and STB are plain push-pull outputs.  DIO must be an open-drain pin with a pull-up (most
/// TM1638 boards have one) that can be read back while it is released: listening is done by
/// setting it high, which lets the chip pull the line low for `0` bits.
///
/// All three pins have to share one error type, which is the case for every HAL I've seen.
pub struct HalPins<Clk, Dio, Stb> {
    clock: Clk,
    dio: Dio,
    strobe: Stb,
    dio_direction: DioDirection,
}

impl<Clk, Dio, Stb> HalPins<Clk, Dio, Stb> {
    pub fn new(clock: Clk, dio: Dio, strobe: Stb) -> Self {
        Self {
            clock,
            dio,
            strobe,
            dio_direction: DioDirection::Output,
        }
    }

    /// Give the pins back
    pub fn release(self) -> (Clk, Dio, Stb) {
        (self.clock, self.dio, self.strobe)
    }
}

impl<Clk, Dio, Stb, E> Pins for HalPins<Clk, Dio, Stb>
where
    Clk: embedded_hal_1::digital::OutputPin<Error = E>,
    Dio: embedded_hal_1::digital::OutputPin<Error = E> + embedded_hal_1::digital::InputPin,
    Stb: embedded_hal_1::digital::OutputPin<Error = E>,
{
    type Error = E;

    fn set_clock(&mut self, high: bool) -> Result<(), Self::Error> {
        self.clock.set_state(high.into())
    }

    fn set_strobe(&mut self, high: bool) -> Result<(), Self::Error> {
        self.strobe.set_state(high.into())
    }

    fn set_dio(&mut self, high: bool) -> Result<(), Self::Error> {
        #[cfg(feature = "defmt")]
        defmt::debug_assert!(self.dio_direction == DioDirection::Output);
        self.dio.set_state(high.into())
    }

    fn read_dio(&mut self) -> Result<bool, Self::Error> {
        self.dio.is_high()
    }

    fn set_dio_direction(&mut self, direction: DioDirection) -> Result<(), Self::Error> {
        // An open-drain pin is released by driving it high; going back to output needs nothing
        // since the next bit written overrides it anyway
        if direction == DioDirection::Input {
            self.dio.set_high()?;
        }
        self.dio_direction = direction;

        Ok(())
    }
}

#[cfg(feature = "embassy-rp")]
mod embassy_rp_pins {
    use core::convert::Infallible;
    use embassy_rp::gpio;

    use super::DioDirection;

    /// Implementation of [`super::Pins`] that uses the Embassy RP HAL for the RP2040
    /// microcontroller.
    ///
    /// DIO is a `Flex` pin so it can switch between output and input at runtime.
    pub struct EmbassyRpPins<'a, ClockPin: gpio::Pin, DioPin: gpio::Pin, StrobePin: gpio::Pin> {
        clock: gpio::Output<'a, ClockPin>,
        dio: gpio::Flex<'a, DioPin>,
        strobe: gpio::Output<'a, StrobePin>,
    }

    impl<'a, ClockPin: gpio::Pin, DioPin: gpio::Pin, StrobePin: gpio::Pin>
        EmbassyRpPins<'a, ClockPin, DioPin, StrobePin>
    {
        pub fn new(clock: ClockPin, dio: DioPin, strobe: StrobePin) -> Self {
            let mut dio = gpio::Flex::new(dio);
            dio.set_as_output();

            Self {
                clock: gpio::Output::new(clock, gpio::Level::High),
                dio,
                strobe: gpio::Output::new(strobe, gpio::Level::High),
            }
        }
    }

    impl<'a, ClockPin: gpio::Pin, DioPin: gpio::Pin, StrobePin: gpio::Pin> super::Pins
        for EmbassyRpPins<'a, ClockPin, DioPin, StrobePin>
    {
        type Error = Infallible;

        fn set_clock(&mut self, high: bool) -> Result<(), Self::Error> {
            self.clock.set_level(high.into());
            Ok(())
        }

        fn set_strobe(&mut self, high: bool) -> Result<(), Self::Error> {
            self.strobe.set_level(high.into());
            Ok(())
        }

        fn set_dio(&mut self, high: bool) -> Result<(), Self::Error> {
            self.dio.set_level(high.into());
            Ok(())
        }

        fn read_dio(&mut self) -> Result<bool, Self::Error> {
            Ok(self.dio.is_high())
        }

        fn set_dio_direction(&mut self, direction: DioDirection) -> Result<(), Self::Error> {
            match direction {
                DioDirection::Output => self.dio.set_as_output(),
                DioDirection::Input => self.dio.set_as_input(),
            }

            Ok(())
        }
    }
}

#[cfg(feature = "embassy-rp")]
pub use embassy_rp_pins::EmbassyRpPins;
