use crate::error::SchedulingError;
use crate::types::{Booking, SlotTime, Template, TimeSlot};
use chrono::NaiveDate;
use uuid::Uuid;

/// Storage of bookable (date, time) slots.
///
/// Every method is atomic with respect to the other operations touching the
/// same date, on all implementations.
pub trait SlotStore: Clone + Send + Sync + 'static {
    /// Replaces the slot set of `date`. Booked slots kept in `times` stay booked;
    /// dropping a booked slot fails with `SlotInUse` and changes nothing.
    fn save_slots(&self, date: NaiveDate, times: &[SlotTime]) -> Result<(), SchedulingError>;

    /// Adds the missing `times` to `date`, leaving existing slots untouched.
    fn merge_slots(
        &self,
        date: NaiveDate,
        times: &[SlotTime],
    ) -> Result<Vec<TimeSlot>, SchedulingError>;

    fn slots(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, SchedulingError>;

    /// Removes the named slots and returns the bookings removed with them.
    /// Without `cascade` a booked slot rejects the whole call with `SlotInUse`.
    fn delete_slots(
        &self,
        date: NaiveDate,
        times: &[SlotTime],
        cascade: bool,
    ) -> Result<Vec<Booking>, SchedulingError>;
}

pub trait TemplateStore: Clone + Send + Sync + 'static {
    fn create_template(&self, template: Template) -> Result<(), SchedulingError>;
    fn templates(&self) -> Result<Vec<Template>, SchedulingError>;
    fn template(&self, name: &str) -> Result<Option<Template>, SchedulingError>;
    fn delete_template(&self, name: &str) -> Result<(), SchedulingError>;
}

pub trait BookingLedger: Clone + Send + Sync + 'static {
    /// Claims the open slot of `booking` and records the booking in one step.
    /// Exactly one of several concurrent claims for the same slot succeeds.
    fn create_booking(&self, booking: Booking) -> Result<Booking, SchedulingError>;
    fn bookings(&self) -> Result<Vec<Booking>, SchedulingError>;
    /// Removes the booking and reopens its slot.
    fn delete_booking(&self, id: Uuid) -> Result<Booking, SchedulingError>;
}

pub trait SchedulingBackend: SlotStore + TemplateStore + BookingLedger {}

impl<T> SchedulingBackend for T where T: SlotStore + TemplateStore + BookingLedger {}
