use crate::{
    backend::SchedulingBackend,
    error::{ErrorKind, SchedulingError},
    query_filter::{self, FilterCriteria},
    types::{collapse_times, Booking, BookingRequest, Customer, SlotTime, Template, TimeSlot},
};
use chrono::{Local, NaiveDate, Utc, Weekday};
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

/// Single entry point for every scheduling operation. Handlers never talk to
/// the backend directly, so input validation and the slot/booking rules are
/// applied in one place.
#[derive(Debug, Clone)]
pub struct AvailabilityCoordinator<B: SchedulingBackend> {
    backend: B,
    week_start: Weekday,
}

fn report(operation: &'static str) -> impl Fn(SchedulingError) -> SchedulingError {
    move |err| {
        match err.kind() {
            ErrorKind::Persistence => error!(?err, operation, "Storage operation failed"),
            _ => warn!(%err, operation, "Operation rejected"),
        }
        err
    }
}

fn required(field: &'static str, value: &str) -> Result<String, SchedulingError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SchedulingError::MissingField { field });
    }
    Ok(value.to_string())
}

impl<B: SchedulingBackend> AvailabilityCoordinator<B> {
    pub fn new(backend: B, week_start: Weekday) -> Self {
        Self {
            backend,
            week_start,
        }
    }

    pub fn save_slots(&self, date: NaiveDate, times: Vec<SlotTime>) -> Result<(), SchedulingError> {
        let times = collapse_times(times);
        self.backend
            .save_slots(date, &times)
            .map_err(|err| match err {
                SchedulingError::Persistence(reason) => SchedulingError::SlotPersist { date, reason },
                other => other,
            })
            .map_err(report("save slots"))?;
        info!(%date, slots = times.len(), "Saved slots");
        Ok(())
    }

    pub fn slots(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, SchedulingError> {
        self.backend.slots(date).map_err(report("get slots"))
    }

    /// Deletes the named slots. A booked slot is only removed, together with its
    /// booking, when `cascade` is set.
    pub fn delete_slots(
        &self,
        date: NaiveDate,
        times: Vec<SlotTime>,
        cascade: bool,
    ) -> Result<(), SchedulingError> {
        if times.is_empty() {
            return Ok(());
        }
        let times = collapse_times(times);
        let removed = self
            .backend
            .delete_slots(date, &times, cascade)
            .map_err(report("delete slots"))?;

        for booking in &removed {
            warn!(id = %booking.id, %date, time = %booking.time, "Booking removed with its slot");
        }
        info!(%date, slots = times.len(), "Deleted slots");
        Ok(())
    }

    pub fn create_booking(&self, request: BookingRequest) -> Result<Booking, SchedulingError> {
        let service = required("service", &request.service)?;
        let customer = Customer {
            name: required("customer.name", &request.customer.name)?,
            email: required("customer.email", &request.customer.email)?,
            phone: required("customer.phone", &request.customer.phone)?,
        };
        customer.validate().map_err(|errors| {
            let mut fields: Vec<String> = errors
                .field_errors()
                .keys()
                .map(|field| format!("customer.{field}"))
                .collect();
            fields.sort();
            SchedulingError::InvalidField {
                field: fields.into_iter().next().unwrap_or_else(|| "customer".into()),
            }
        })?;

        let booking = Booking {
            id: Uuid::new_v4(),
            date: request.date,
            time: request.time,
            service,
            customer,
            created_at: Utc::now(),
        };
        let booking = self
            .backend
            .create_booking(booking)
            .map_err(report("create booking"))?;

        info!(id = %booking.id, date = %booking.date, time = %booking.time, "Booking created");
        Ok(booking)
    }

    /// Bookings selected by `criteria`, relative to the local calendar date.
    pub fn bookings(&self, criteria: &FilterCriteria) -> Result<Vec<Booking>, SchedulingError> {
        self.bookings_as_of(criteria, Local::now().date_naive())
    }

    pub fn bookings_as_of(
        &self,
        criteria: &FilterCriteria,
        today: NaiveDate,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let bookings = self.backend.bookings().map_err(report("list bookings"))?;
        Ok(query_filter::filter(&bookings, criteria, today, self.week_start)
            .cloned()
            .collect())
    }

    pub fn delete_booking(&self, id: Uuid) -> Result<(), SchedulingError> {
        let booking = self
            .backend
            .delete_booking(id)
            .map_err(report("delete booking"))?;
        info!(%id, date = %booking.date, time = %booking.time, "Booking deleted, slot reopened");
        Ok(())
    }

    pub fn create_template(
        &self,
        name: &str,
        slots: Vec<SlotTime>,
    ) -> Result<Template, SchedulingError> {
        let name = required("name", name)?;
        if slots.is_empty() {
            return Err(SchedulingError::MissingField { field: "slots" });
        }
        let template = Template::new(name, slots);
        self.backend
            .create_template(template.clone())
            .map_err(report("create template"))?;
        info!(name = %template.name, slots = template.slots.len(), "Template created");
        Ok(template)
    }

    pub fn templates(&self) -> Result<Vec<Template>, SchedulingError> {
        self.backend.templates().map_err(report("list templates"))
    }

    pub fn template(&self, name: &str) -> Result<Template, SchedulingError> {
        self.backend
            .template(name)
            .and_then(|template| {
                template.ok_or_else(|| SchedulingError::not_found("template", name))
            })
            .map_err(report("get template"))
    }

    /// Adds the template's times to `date`; slots already present keep their status.
    pub fn apply_template(
        &self,
        name: &str,
        date: NaiveDate,
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let template = self.template(name)?;
        let slots = self
            .backend
            .merge_slots(date, &template.slots)
            .map_err(report("apply template"))?;
        info!(name, %date, slots = slots.len(), "Template applied");
        Ok(slots)
    }

    pub fn delete_template(&self, name: &str) -> Result<(), SchedulingError> {
        self.backend
            .delete_template(name)
            .map_err(report("delete template"))?;
        info!(name, "Template deleted");
        Ok(())
    }
}
