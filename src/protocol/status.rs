//! Inbound payload decoding.
//!
//! Two data-bearing replies exist: the 14-byte status buffer answering a
//! status request, and the length-prefixed event buffer answering a
//! data-ready poll. Both arrive fragmented on a serial line; the owning
//! transaction accumulates bytes and hands a complete payload here.
//! Malformed payloads are unrecoverable, there is no resynchronization
//! point inside a reply.

use crate::codes::{Function, House, Unit, MAX_POLL_BUFFER, STATUS_REPLY_LEN};
use crate::error::{PowerwireError, Result};
use crate::event::{ControllerStatus, UnitStatus};

/// Decode the interface's 14-byte status buffer.
///
/// Layout: battery timer (2 bytes), seconds, minute of the two-hour block,
/// half-hour count, year day with its ninth bit packed above the weekday
/// mask, monitored house / firmware revision, then three unit bitmaps
/// (addressed, on/off, dim). Multi-byte fields are big endian.
pub fn decode_status_reply(buf: &[u8]) -> Result<ControllerStatus> {
    if buf.len() < STATUS_REPLY_LEN {
        return Err(PowerwireError::Protocol(format!(
            "status reply too short: {} of {STATUS_REPLY_LEN} bytes",
            buf.len()
        )));
    }

    let block_minutes = buf[3];
    let monitored_house = House::from_code(buf[7] >> 4)
        .ok_or_else(|| PowerwireError::Protocol("bad house nibble in status".into()))?;

    Ok(ControllerStatus {
        battery_timer: u16::from_be_bytes([buf[0], buf[1]]),
        seconds: buf[2],
        minutes: block_minutes % 60,
        // Wide arithmetic: a garbage half-hour byte must not wrap.
        hours: ((buf[4] as u16) * 2 + (block_minutes / 60) as u16) as u8,
        year_day: buf[5] as u16 | ((buf[6] >> 7) as u16) << 8,
        weekday_mask: buf[6] & 0x7F,
        monitored_house,
        firmware_revision: buf[7] & 0x0F,
        addressed: u16::from_be_bytes([buf[8], buf[9]]),
        on_mask: u16::from_be_bytes([buf[10], buf[11]]),
        dim_mask: u16::from_be_bytes([buf[12], buf[13]]),
    })
}

/// Decode a complete event buffer (mask byte plus data bytes) into
/// unit-status events.
///
/// Bit i of the mask marks data byte i as a function byte; clear means an
/// address byte. Address bytes accumulate the unit set for their house;
/// each function byte yields one event carrying the set accumulated so
/// far. Dim and bright consume the following data byte as the raw dim
/// amount, regardless of that byte's mask bit.
pub fn decode_poll_buffer(data: &[u8]) -> Result<Vec<UnitStatus>> {
    if data.is_empty() {
        return Err(PowerwireError::Protocol("empty event buffer".into()));
    }
    if data.len() > MAX_POLL_BUFFER as usize {
        return Err(PowerwireError::Protocol(format!(
            "event buffer too long: {} bytes",
            data.len()
        )));
    }

    let mask = data[0];
    let items = &data[1..];
    let mut events = Vec::new();
    let mut house: Option<House> = None;
    let mut units: Vec<Unit> = Vec::new();

    let mut i = 0;
    while i < items.len() {
        let byte = items[i];
        let is_function = mask >> i & 1 == 1;
        i += 1;

        let h = House::from_code(byte >> 4)
            .ok_or_else(|| PowerwireError::Protocol("bad house nibble in event".into()))?;

        if is_function {
            let function = Function::from_code(byte & 0x0F)
                .ok_or_else(|| PowerwireError::Protocol("bad function nibble".into()))?;
            let dims = if function.has_dim_amount() {
                if i >= items.len() {
                    return Err(PowerwireError::Protocol(
                        "dim event missing amount byte".into(),
                    ));
                }
                let amount = items[i];
                i += 1;
                Some(amount)
            } else {
                None
            };
            events.push(UnitStatus {
                house: h,
                function,
                dims,
                units: units.clone(),
            });
        } else {
            let unit = Unit::from_code(byte & 0x0F)
                .ok_or_else(|| PowerwireError::Protocol("bad unit nibble".into()))?;
            // Addressing a different house starts a fresh unit set.
            if house != Some(h) {
                units.clear();
                house = Some(h);
            }
            if !units.contains(&unit) {
                units.push(unit);
            }
        }
    }

    Ok(events)
}
