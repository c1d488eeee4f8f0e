use crate::flight::{Flight, SeatClass};
use std::collections::HashSet;

/// Candidate identifiers examined before allocation gives up.
pub const DEFAULT_PROBE_LIMIT: u32 = 500;

/// Assign `count` seat identifiers of `class`, scanning `{prefix}1, {prefix}2, ...`
/// in ascending order and skipping anything in `taken`.
///
/// At most `probe_limit` candidates are examined. Pure: the caller persists the result.
pub fn allocate_seats(
    count: u32,
    taken: &[String],
    class: SeatClass,
    probe_limit: u32,
) -> Result<Vec<String>, InventoryError> {
    let taken: HashSet<&str> = taken.iter().map(String::as_str).collect();
    let mut seats = Vec::with_capacity(count as usize);

    for number in 1..=probe_limit {
        if seats.len() as u32 == count {
            break;
        }
        let seat_id = format!("{}{}", class.prefix(), number);
        if !taken.contains(seat_id.as_str()) {
            seats.push(seat_id);
        }
    }

    if (seats.len() as u32) < count {
        return Err(InventoryError::AllocationExhausted {
            seat_class: class,
            requested: count,
            probe_limit,
        });
    }

    Ok(seats)
}

impl Flight {
    /// Take `count` seats of `class`: checks availability, allocates identifiers,
    /// decrements the pool and records the seats. Leaves `self` untouched on error.
    pub fn reserve(&mut self, class: SeatClass, count: u32, probe_limit: u32) -> Result<Vec<String>, InventoryError> {
        let available = self.seats.get(class).available;
        if available < count {
            return Err(InventoryError::InsufficientInventory {
                seat_class: class,
                requested: count,
                available,
            });
        }

        let seats = allocate_seats(count, &self.booked_seats, class, probe_limit)?;

        self.seats.get_mut(class).available -= count;
        self.booked_seats.extend(seats.iter().cloned());

        Ok(seats)
    }

    /// Return a cancelled booking's seats to the pool. Removes exactly `seats`
    /// from the ledger (set difference) and never lifts `available` above `total`.
    pub fn release(&mut self, class: SeatClass, count: u32, seats: &[String]) {
        let pool = self.seats.get_mut(class);
        pool.available = pool.available.saturating_add(count).min(pool.total);

        let released: HashSet<&str> = seats.iter().map(String::as_str).collect();
        self.booked_seats.retain(|seat| !released.contains(seat.as_str()));
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InventoryError {
    #[error("Not enough available seats in {seat_class} class: requested {requested}, available {available}")]
    InsufficientInventory {
        seat_class: SeatClass,
        requested: u32,
        available: u32,
    },

    #[error("Could not allocate {requested} unique {seat_class} seats within {probe_limit} candidates")]
    AllocationExhausted {
        seat_class: SeatClass,
        requested: u32,
        probe_limit: u32,
    },
}
