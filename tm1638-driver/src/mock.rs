//! Test doubles: pins that behave like a TM1638 sitting on the other end of the bus, and timers
//! that don't actually wait.
//!
//! [`MockPins`] decodes the line activity into strobe windows the same way the chip would (DIO
//! sampled on the rising edge of CLK, LSB first) and records anything the chip would consider a
//! protocol violation.

use core::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use crate::bus::Timer;
use crate::pins::{DioDirection, Pins};
use crate::protocol::{ADDRESS_BASE, COMMAND_READ_KEYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MockError;

/// Everything that happened between one STB falling edge and the next rising edge
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Window {
    /// Bytes clocked in by the chip
    pub out: Vec<u8>,
    /// Bytes the chip clocked out in response to a key-scan command
    pub input: Vec<u8>,
}

impl Window {
    /// `Some((address, value))` if this window is an address byte followed by one data byte
    pub fn single_write(&self) -> Option<(u8, u8)> {
        match self.out.as_slice() {
            [address, value] if address & 0xf0 == ADDRESS_BASE => Some((*address, *value)),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct BusLog {
    pub windows: Vec<Window>,
    pub violations: Vec<&'static str>,
    pub fail_reads: bool,

    pub clock: bool,
    pub strobe: bool,
    pub dio: bool,
    pub direction: DioDirection,

    current: Option<Window>,
    out_bits: (u8, u8),
    in_bits: (u8, u8),
    response: VecDeque<u8>,
    scans: VecDeque<[u8; 4]>,
}

impl BusLog {
    fn new() -> Self {
        Self {
            windows: Vec::new(),
            violations: Vec::new(),
            fail_reads: false,
            // Pins come up low, the driver is expected to idle them high
            clock: false,
            strobe: false,
            dio: false,
            direction: DioDirection::Input,
            current: None,
            out_bits: (0, 0),
            in_bits: (0, 0),
            response: VecDeque::new(),
            scans: VecDeque::new(),
        }
    }

    /// The response to the next key-scan command.  Without one queued the chip reports no keys.
    pub fn queue_scan(&mut self, scan: [u8; 4]) {
        self.scans.push_back(scan);
    }

    /// All `(address, value)` pairs written one at a time, in order
    pub fn single_writes(&self) -> Vec<(u8, u8)> {
        self.windows.iter().filter_map(Window::single_write).collect()
    }

    /// Windows consisting of one command byte and nothing else
    pub fn commands(&self) -> Vec<u8> {
        self.windows
            .iter()
            .filter(|w| w.out.len() == 1 && w.input.is_empty())
            .map(|w| w.out[0])
            .collect()
    }

    /// Display control commands (`0b10xx_xxxx`) in order
    pub fn display_controls(&self) -> Vec<u8> {
        self.commands()
            .into_iter()
            .filter(|c| c & 0xc0 == 0x80)
            .collect()
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }

    fn rising_clock_edge(&mut self) {
        if self.strobe {
            // Clock activity outside a window is ignored by the chip
            return;
        }

        match self.direction {
            DioDirection::Output => {
                let (value, count) = &mut self.out_bits;
                if self.dio {
                    *value |= 1 << *count;
                }
                *count += 1;

                if *count == 8 {
                    let byte = *value;
                    self.out_bits = (0, 0);
                    if let Some(window) = self.current.as_mut() {
                        window.out.push(byte);
                    }
                }
            }
            DioDirection::Input => {
                let bit = self.next_response_bit();
                let (value, count) = &mut self.in_bits;
                if bit {
                    *value |= 1 << *count;
                }
                *count += 1;

                if *count == 8 {
                    let byte = *value;
                    self.in_bits = (0, 0);
                    self.response.pop_front();
                    if let Some(window) = self.current.as_mut() {
                        window.input.push(byte);
                    }
                }
            }
        }
    }

    /// The bit the chip is presenting on DIO right now
    fn next_response_bit(&self) -> bool {
        let byte = self.response.front().copied().unwrap_or(0);
        byte & (1 << self.in_bits.1) != 0
    }
}

/// Instrumented [`Pins`].  Clones share the same [`BusLog`].
#[derive(Clone)]
pub(crate) struct MockPins(Rc<RefCell<BusLog>>);

impl MockPins {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(BusLog::new())))
    }

    pub fn log(&self) -> Rc<RefCell<BusLog>> {
        self.0.clone()
    }
}

impl Pins for MockPins {
    type Error = MockError;

    fn set_clock(&mut self, high: bool) -> Result<(), Self::Error> {
        let mut log = self.0.borrow_mut();
        let rising = high && !log.clock;
        log.clock = high;
        if rising {
            log.rising_clock_edge();
        }

        Ok(())
    }

    fn set_strobe(&mut self, high: bool) -> Result<(), Self::Error> {
        let mut log = self.0.borrow_mut();

        if high {
            if log.direction == DioDirection::Input && log.current.is_some() {
                log.violations.push("STB released while DIO is an input");
            }
            if log.out_bits.1 != 0 || log.in_bits.1 != 0 {
                log.violations.push("STB released in the middle of a byte");
                log.out_bits = (0, 0);
                log.in_bits = (0, 0);
            }
            if let Some(window) = log.current.take() {
                log.windows.push(window);
            }
        } else {
            if log.current.is_some() {
                log.violations.push("STB pulled low inside another window");
            }
            log.current = Some(Window::default());
        }
        log.strobe = high;

        Ok(())
    }

    fn set_dio(&mut self, high: bool) -> Result<(), Self::Error> {
        let mut log = self.0.borrow_mut();
        if log.direction == DioDirection::Input {
            log.violations.push("DIO driven while it is an input");
        }
        log.dio = high;

        Ok(())
    }

    fn read_dio(&mut self) -> Result<bool, Self::Error> {
        let mut log = self.0.borrow_mut();
        if log.fail_reads {
            return Err(MockError);
        }
        if log.direction == DioDirection::Output {
            log.violations.push("DIO read while it is an output");
        }

        Ok(log.next_response_bit())
    }

    fn set_dio_direction(&mut self, direction: DioDirection) -> Result<(), Self::Error> {
        let mut log = self.0.borrow_mut();

        if direction == DioDirection::Input && log.direction == DioDirection::Output {
            let is_scan = log
                .current
                .as_ref()
                .is_some_and(|w| w.out.first() == Some(&COMMAND_READ_KEYS));
            if !is_scan {
                log.violations.push("DIO switched to input outside a key scan");
            }
            let scan = log.scans.pop_front().unwrap_or([0; 4]);
            log.response = scan.into_iter().collect();
            log.in_bits = (0, 0);
        }
        log.direction = direction;

        Ok(())
    }
}

std::thread_local! {
    static WAITED_MS: Cell<u32> = const { Cell::new(0) };
}

/// Milliseconds "waited" through [`Timer::wait_ms`] on this thread since the last call
pub(crate) fn take_waited_ms() -> u32 {
    WAITED_MS.with(|w| w.replace(0))
}

/// Timer that never waits
pub(crate) struct NoDelay;

impl Timer for NoDelay {
    async fn wait_clock_tick() {}

    async fn wait_ms(ms: u32) {
        WAITED_MS.with(|w| w.set(w.get() + ms));
    }
}

/// Timer that hands control back to the executor on every wait, so concurrent futures get a
/// chance to run in the middle of a transaction
pub(crate) struct YieldingTimer;

impl Timer for YieldingTimer {
    async fn wait_clock_tick() {
        embassy_futures::yield_now().await
    }

    async fn wait_ms(ms: u32) {
        WAITED_MS.with(|w| w.set(w.get() + ms));
        embassy_futures::yield_now().await
    }
}

/// Hand control back to the executor `count` times, then finish.  Racing an operation against
/// this with `select` drops the operation partway through.
pub(crate) async fn yield_times(count: usize) {
    for _ in 0..count {
        embassy_futures::yield_now().await
    }
}
