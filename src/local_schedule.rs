use crate::{
    backend::{BookingLedger, SlotStore, TemplateStore},
    error::SchedulingError,
    types::{collapse_times, Booking, SlotStatus, SlotTime, Template, TimeSlot},
};
use chrono::NaiveDate;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Schedule {
    slots: HashMap<NaiveDate, Vec<TimeSlot>>,
    templates: HashMap<String, Template>,
    bookings: Vec<Booking>,
}

/// Non-persistent backend. A single lock guards slots, templates and bookings,
/// so every operation is atomic against every other one.
#[derive(Debug, Clone, Default)]
pub struct LocalSchedule {
    schedule: Arc<Mutex<Schedule>>,
}

impl SlotStore for LocalSchedule {
    fn save_slots(&self, date: NaiveDate, times: &[SlotTime]) -> Result<(), SchedulingError> {
        let mut guard = self.schedule.lock()?;
        let schedule = &mut *guard;
        let times = collapse_times(times.iter().copied());
        let current = schedule
            .slots
            .get(&date)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let dropped_booked: Vec<SlotTime> = current
            .iter()
            .filter(|slot| slot.status == SlotStatus::Booked && !times.contains(&slot.time))
            .map(|slot| slot.time)
            .collect();
        if !dropped_booked.is_empty() {
            return Err(SchedulingError::SlotInUse {
                date,
                times: dropped_booked,
            });
        }

        let mut slots: Vec<TimeSlot> = current
            .iter()
            .filter(|slot| slot.status == SlotStatus::Booked)
            .cloned()
            .collect();
        for time in times {
            if !slots.iter().any(|slot| slot.time == time) {
                slots.push(TimeSlot::open(date, time));
            }
        }

        debug!(%date, slots = slots.len(), "Replaced slots");
        if slots.is_empty() {
            schedule.slots.remove(&date);
        } else {
            schedule.slots.insert(date, slots);
        }
        Ok(())
    }

    fn merge_slots(
        &self,
        date: NaiveDate,
        times: &[SlotTime],
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let mut schedule = self.schedule.lock()?;
        let day = schedule.slots.entry(date).or_default();
        for time in times {
            if !day.iter().any(|slot| slot.time == *time) {
                day.push(TimeSlot::open(date, *time));
            }
        }
        let merged = day.clone();
        if merged.is_empty() {
            schedule.slots.remove(&date);
        }
        Ok(merged)
    }

    fn slots(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, SchedulingError> {
        let schedule = self.schedule.lock()?;
        Ok(schedule.slots.get(&date).cloned().unwrap_or_default())
    }

    fn delete_slots(
        &self,
        date: NaiveDate,
        times: &[SlotTime],
        cascade: bool,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let mut guard = self.schedule.lock()?;
        let schedule = &mut *guard;
        let Some(day) = schedule.slots.get_mut(&date) else {
            return Ok(vec![]);
        };

        let booked: Vec<SlotTime> = day
            .iter()
            .filter(|slot| slot.status == SlotStatus::Booked && times.contains(&slot.time))
            .map(|slot| slot.time)
            .collect();
        if !booked.is_empty() && !cascade {
            return Err(SchedulingError::SlotInUse {
                date,
                times: booked,
            });
        }

        day.retain(|slot| !times.contains(&slot.time));
        if day.is_empty() {
            schedule.slots.remove(&date);
        }

        let (removed, kept): (Vec<Booking>, Vec<Booking>) = std::mem::take(&mut schedule.bookings)
            .into_iter()
            .partition(|booking| booking.date == date && booked.contains(&booking.time));
        schedule.bookings = kept;
        Ok(removed)
    }
}

impl TemplateStore for LocalSchedule {
    fn create_template(&self, template: Template) -> Result<(), SchedulingError> {
        let mut schedule = self.schedule.lock()?;
        if schedule.templates.contains_key(&template.name) {
            return Err(SchedulingError::DuplicateTemplate {
                name: template.name,
            });
        }
        schedule.templates.insert(template.name.clone(), template);
        Ok(())
    }

    fn templates(&self) -> Result<Vec<Template>, SchedulingError> {
        let schedule = self.schedule.lock()?;
        Ok(schedule.templates.values().cloned().collect())
    }

    fn template(&self, name: &str) -> Result<Option<Template>, SchedulingError> {
        let schedule = self.schedule.lock()?;
        Ok(schedule.templates.get(name).cloned())
    }

    fn delete_template(&self, name: &str) -> Result<(), SchedulingError> {
        self.schedule.lock()?.templates.remove(name);
        Ok(())
    }
}

impl BookingLedger for LocalSchedule {
    fn create_booking(&self, booking: Booking) -> Result<Booking, SchedulingError> {
        let mut guard = self.schedule.lock()?;
        let schedule = &mut *guard;

        let slot = schedule
            .slots
            .get_mut(&booking.date)
            .and_then(|day| day.iter_mut().find(|slot| slot.time == booking.time))
            .filter(|slot| slot.status == SlotStatus::Open)
            .ok_or(SchedulingError::SlotUnavailable {
                date: booking.date,
                time: booking.time,
            })?;
        slot.status = SlotStatus::Booked;

        schedule.bookings.push(booking.clone());
        Ok(booking)
    }

    fn bookings(&self) -> Result<Vec<Booking>, SchedulingError> {
        Ok(self.schedule.lock()?.bookings.clone())
    }

    fn delete_booking(&self, id: Uuid) -> Result<Booking, SchedulingError> {
        let mut guard = self.schedule.lock()?;
        let schedule = &mut *guard;

        let index = schedule
            .bookings
            .iter()
            .position(|booking| booking.id == id)
            .ok_or_else(|| SchedulingError::not_found("booking", id))?;
        let booking = schedule.bookings.remove(index);

        if let Some(slot) = schedule
            .slots
            .get_mut(&booking.date)
            .and_then(|day| day.iter_mut().find(|slot| slot.time == booking.time))
        {
            slot.status = SlotStatus::Open;
        }
        Ok(booking)
    }
}
