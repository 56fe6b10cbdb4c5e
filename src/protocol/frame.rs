//! Outbound frame construction.
//!
//! Address and function frames are two bytes: a header byte and a code
//! byte. The header carries the dim amount in bits 3..7, bit 2 is always
//! set, bit 1 selects function vs address. The clock frame is the 7-byte
//! reply to a power-fail poll.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::codes::{Function, House, Unit, CLOCK_HEADER, HEADER_ADDRESS, HEADER_FUNCTION, MAX_DIMS};

/// Length of the clock-set frame, header included.
pub const CLOCK_FRAME_LEN: usize = 7;

/// Wrapping byte sum the interface echoes after each host-written frame.
#[inline]
pub fn checksum(frame: &[u8]) -> u8 {
    frame.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

/// Build an address-selection frame for one unit.
pub fn address_frame(house: House, unit: Unit) -> [u8; 2] {
    [HEADER_ADDRESS, house.code() << 4 | unit.code()]
}

/// Build a function-selection frame.
///
/// `dims` is clamped to [`MAX_DIMS`]; it is only meaningful for the
/// dim/bright functions and zero elsewhere.
pub fn function_frame(house: House, function: Function, dims: u8) -> [u8; 2] {
    let dims = dims.min(MAX_DIMS);
    [
        HEADER_FUNCTION | dims << 3,
        house.code() << 4 | function.code(),
    ]
}

/// Build the clock-set frame for a power-fail reply.
///
/// Layout after the header byte: seconds, minute of the current two-hour
/// block (0..=119), half-hour count, low eight bits of the year day, the
/// ninth year-day bit packed above the weekday mask, and the monitored
/// house code in the top nibble of the final byte. The low nibble of the
/// final byte carries the timer-purge/battery-clear flags, all zero here.
pub fn clock_frame(now: &NaiveDateTime, monitored: House) -> [u8; CLOCK_FRAME_LEN] {
    let seconds = now.second() as u8;
    let minutes = (now.minute() + 60 * (now.hour() % 2)) as u8;
    let half_hours = (now.hour() / 2) as u8;
    let year_day = now.ordinal();
    let weekday_bit = 1u8 << now.weekday().num_days_from_sunday();
    [
        CLOCK_HEADER,
        seconds,
        minutes,
        half_hours,
        (year_day & 0xFF) as u8,
        ((year_day >> 8) as u8) << 7 | weekday_bit,
        monitored.code() << 4,
    ]
}

/// Build the 2-byte big-endian programming address for an eeprom poll.
pub fn eeprom_address_frame(address: u16) -> [u8; 2] {
    address.to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn unit(n: u8) -> Unit {
        Unit::new(n).unwrap()
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x04, 0x66]), 0x6A);
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
    }

    #[test]
    fn test_address_frame_a1() {
        // House A = 0x6, unit 1 = 0x6.
        assert_eq!(address_frame(House::A, unit(1)), [0x04, 0x66]);
    }

    #[test]
    fn test_function_frame_on() {
        assert_eq!(function_frame(House::A, Function::On, 0), [0x06, 0x62]);
    }

    #[test]
    fn test_function_frame_dim_amount() {
        let frame = function_frame(House::C, Function::Dim, 11);
        assert_eq!(frame[0], 0x06 | 11 << 3);
        assert_eq!(frame[1], 0x24);
    }

    #[test]
    fn test_function_frame_clamps_dims() {
        let frame = function_frame(House::A, Function::Bright, 200);
        assert_eq!(frame[0] >> 3, MAX_DIMS);
    }

    #[test]
    fn test_clock_frame_layout() {
        // Tuesday 2024-03-05 13:42:07, day-of-year 65.
        let now = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(13, 42, 7)
            .unwrap();
        let frame = clock_frame(&now, House::A);
        assert_eq!(frame[0], CLOCK_HEADER);
        assert_eq!(frame[1], 7);
        assert_eq!(frame[2], 102); // 42 + 60, odd hour
        assert_eq!(frame[3], 6); // 13 / 2
        assert_eq!(frame[4], 65);
        assert_eq!(frame[5], 1 << 2); // Tuesday, year-day bit 8 clear
        assert_eq!(frame[6], House::A.code() << 4);
    }

    #[test]
    fn test_clock_frame_high_year_day() {
        // 2023-12-31 is day 365; bit 8 is still clear. A leap-year day 366
        // sets it.
        let day_366 = NaiveDate::from_ymd_opt(2024, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let frame = clock_frame(&day_366, House::A);
        assert_eq!(frame[4], (366u16 & 0xFF) as u8);
        assert_eq!(frame[5] & 0x80, 0x80);
    }

    #[test]
    fn test_eeprom_address_big_endian() {
        assert_eq!(eeprom_address_frame(0x01FF), [0x01, 0xFF]);
        assert_eq!(eeprom_address_frame(0), [0, 0]);
    }
}
