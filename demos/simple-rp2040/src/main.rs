//! Example of using the TM1638 on an RP2040 board like the Pi Pico.
//!
//! One task counts up on all eight digits while another lights the LED above each button that
//! has been pressed.  Both share the same driver.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::peripherals::{PIN_6, PIN_7, PIN_8};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Timer;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use tm1638_driver::{BitBangingBusDriver, EmbassyRpPins, EmbassyTimeTimer, Tm1638};

type Board = Tm1638<
    CriticalSectionRawMutex,
    BitBangingBusDriver<EmbassyRpPins<'static, PIN_6, PIN_7, PIN_8>, EmbassyTimeTimer>,
>;

/// How often the digits count up
const DIGITS_PERIOD_MS: u64 = 375;

/// How often the buttons are polled
const BUTTONS_PERIOD_MS: u64 = 200;

/// How long the LEDs stay lit once every button has been pressed
const ALL_PRESSED_HOLD_MS: u64 = 2000;

#[embassy_executor::task]
async fn digits_task(tm1638: &'static Board) {
    // Digit 7 (left-most) starts at 0, digit 0 at 7
    let mut values: [u8; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

    info!("digits task start");

    loop {
        for (i, value) in values.iter_mut().enumerate() {
            tm1638.display_val(7 - i as u8, *value).await.unwrap();
            *value = (*value + 1) & 0x0f;
        }

        Timer::after_millis(DIGITS_PERIOD_MS).await;
    }
}

#[embassy_executor::task]
async fn buttons_task(tm1638: &'static Board) {
    let mut seen = 0u8;

    info!("buttons task start");

    loop {
        let buttons = tm1638.get_buttons().await.unwrap();

        if buttons.any_pressed() {
            info!("buttons pressed {=u8:02x}", buttons.bits());

            seen |= buttons.bits();
            tm1638.write_leds(seen).await.unwrap();

            if seen == 0xff {
                info!("all buttons have been pressed");
                Timer::after_millis(ALL_PRESSED_HOLD_MS).await;

                seen = 0;
                tm1638.write_leds(seen).await.unwrap();
            }

            // Wait for everything to be let go so a held button only counts once
            while tm1638.get_buttons().await.unwrap().any_pressed() {
                Timer::after_millis(BUTTONS_PERIOD_MS).await;
            }
        }

        Timer::after_millis(BUTTONS_PERIOD_MS).await;
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Default::default());

    // Instantiate the TM1638 interface using a bit-banging implementation of the TM1638 bus
    // interface implemented using the `embassy-rp` HAL and the `embassy-time` timer.
    static TM1638: StaticCell<Board> = StaticCell::new();
    let tm1638: &'static Board = TM1638.init(
        Tm1638::builder()
            .with_embassy_timer()
            .with_embassy_rp_pins(p.PIN_6, p.PIN_7, p.PIN_8)
            .build()
            .unwrap(),
    );

    tm1638.reset().await.unwrap();
    tm1638.self_test().await.unwrap();
    tm1638.display_turn_on().await.unwrap();
    tm1638.display_set_brightness(0).await.unwrap();

    debug!("Hello!  Press one of the buttons on the board!");

    unwrap!(spawner.spawn(digits_task(tm1638)));
    unwrap!(spawner.spawn(buttons_task(tm1638)));
}
