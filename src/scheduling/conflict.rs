//! Marks generated slots unavailable against already-booked appointments,
//! then widens each conflict by the consultant's buffer policy.

use crate::db::models::Appointment;

use super::slots::TimeSlot;

/// Mark conflicting slots unavailable in place. Slot intervals and ordering
/// are never changed, only the `available` flags.
///
/// After direct overlaps are marked, `ceil(buffer_minutes / slot_minutes)`
/// slots on each side of every direct conflict are marked as well. The
/// propagation is index-based over the slot array, which assumes contiguous
/// uniform slots; where break exclusion left a gap the buffer visually
/// "skips" across it. The slot length is taken from the slots themselves.
///
/// Callers pass only appointments that actually occupy the calendar
/// (status `scheduled`); the repository query filters them.
pub fn resolve_conflicts(slots: &mut [TimeSlot], booked: &[Appointment], buffer_minutes: u32) {
    if slots.is_empty() {
        return;
    }

    let mut direct = vec![false; slots.len()];
    for (index, slot) in slots.iter_mut().enumerate() {
        if booked.iter().any(|appointment| overlaps(slot, appointment)) {
            slot.available = false;
            direct[index] = true;
        }
    }

    if buffer_minutes == 0 {
        return;
    }

    let slot_minutes = (slots[0].end - slots[0].start).num_minutes().max(1) as u32;
    let spread = buffer_minutes.div_ceil(slot_minutes) as usize;

    // Buffer zones grow out of the direct conflicts only; buffered slots do
    // not cascade further.
    for index in 0..direct.len() {
        if !direct[index] {
            continue;
        }
        let from = index.saturating_sub(spread);
        let to = (index + spread).min(slots.len() - 1);
        for slot in &mut slots[from..=to] {
            slot.available = false;
        }
    }
}

fn overlaps(slot: &TimeSlot, appointment: &Appointment) -> bool {
    let slot_start_inside =
        slot.start >= appointment.start_time && slot.start < appointment.end_time;
    let slot_end_inside = slot.end > appointment.start_time && slot.end <= appointment.end_time;
    // A booked interval strictly inside a longer slot crosses neither slot
    // endpoint; without this arm it would go undetected.
    let slot_contains_appointment =
        slot.start <= appointment.start_time && slot.end >= appointment.end_time;

    slot_start_inside || slot_end_inside || slot_contains_appointment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Appointment, AppointmentStatus};
    use crate::scheduling::availability::test_support::profile_9_to_5;
    use crate::scheduling::slots::generate_slots;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use uuid::Uuid;

    fn utc(h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, h, min, 0).unwrap()
    }

    fn booked(start: DateTime<Utc>, end: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            consultant_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            consultation_type_id: Uuid::new_v4(),
            status: AppointmentStatus::Scheduled,
            start_time: start,
            end_time: end,
            notes: None,
            recurring_pattern_id: None,
            is_recurring: false,
            created_at: start,
            updated_at: start,
        }
    }

    fn day_slots() -> Vec<TimeSlot> {
        let profile = profile_9_to_5(|_| {});
        generate_slots(&profile, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(), 30).unwrap()
    }

    fn unavailable_starts(slots: &[TimeSlot]) -> Vec<DateTime<Utc>> {
        slots
            .iter()
            .filter(|slot| !slot.available)
            .map(|slot| slot.start)
            .collect()
    }

    #[test]
    fn exact_overlap_marks_only_that_slot() {
        let mut slots = day_slots();
        resolve_conflicts(&mut slots, &[booked(utc(9, 30), utc(10, 0))], 0);

        assert_eq!(unavailable_starts(&slots), vec![utc(9, 30)]);
    }

    #[test]
    fn partial_overlap_marks_both_touched_slots() {
        let mut slots = day_slots();
        resolve_conflicts(&mut slots, &[booked(utc(9, 45), utc(10, 15))], 0);

        assert_eq!(unavailable_starts(&slots), vec![utc(9, 30), utc(10, 0)]);
    }

    #[test]
    fn appointment_contained_in_a_longer_slot_is_detected() {
        // One 60-minute slot fully containing a 20-minute booking.
        let mut slots = vec![TimeSlot {
            start: utc(9, 0),
            end: utc(10, 0),
            available: true,
        }];
        resolve_conflicts(&mut slots, &[booked(utc(9, 20), utc(9, 40))], 0);

        assert!(!slots[0].available);
    }

    #[test]
    fn buffer_marks_adjacent_slots_on_both_sides() {
        let mut slots = day_slots();
        resolve_conflicts(&mut slots, &[booked(utc(12, 0), utc(12, 30))], 30);

        assert_eq!(
            unavailable_starts(&slots),
            vec![utc(11, 30), utc(12, 0), utc(12, 30)]
        );
    }

    #[test]
    fn buffer_rounds_up_to_whole_slots() {
        let mut slots = day_slots();
        // 45 minutes of buffer over 30-minute slots widens by two slots.
        resolve_conflicts(&mut slots, &[booked(utc(12, 0), utc(12, 30))], 45);

        assert_eq!(
            unavailable_starts(&slots),
            vec![utc(11, 0), utc(11, 30), utc(12, 0), utc(12, 30), utc(13, 0)]
        );
    }

    #[test]
    fn buffer_clamps_at_array_edges() {
        let mut slots = day_slots();
        resolve_conflicts(&mut slots, &[booked(utc(9, 0), utc(9, 30))], 30);

        assert_eq!(unavailable_starts(&slots), vec![utc(9, 0), utc(9, 30)]);
    }

    #[test]
    fn buffered_slots_do_not_cascade() {
        let mut slots = day_slots();
        resolve_conflicts(&mut slots, &[booked(utc(12, 0), utc(12, 30))], 30);

        // 11:00 and 13:00 border buffered (not conflicted) slots and stay open.
        assert!(slots.iter().any(|s| s.start == utc(11, 0) && s.available));
        assert!(slots.iter().any(|s| s.start == utc(13, 0) && s.available));
    }

    #[test]
    fn resolution_preserves_slot_order_and_intervals() {
        let mut slots = day_slots();
        let before: Vec<_> = slots.iter().map(|s| (s.start, s.end)).collect();
        resolve_conflicts(&mut slots, &[booked(utc(10, 0), utc(11, 0))], 30);
        let after: Vec<_> = slots.iter().map(|s| (s.start, s.end)).collect();

        assert_eq!(before, after);
    }

    #[test]
    fn snapshot_resolution_is_advisory_not_a_reservation() {
        // Two callers resolving against the same snapshot both see the slot
        // free; nothing here reserves it. The write path must re-check
        // transactionally (the appointments table carries an exclusion
        // constraint for exactly this race).
        let mut first = day_slots();
        let mut second = day_slots();
        resolve_conflicts(&mut first, &[], 0);
        resolve_conflicts(&mut second, &[], 0);

        assert!(first.iter().all(|slot| slot.available));
        assert_eq!(first, second);
    }
}
