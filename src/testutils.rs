use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use chrono::{NaiveDate, Utc, Weekday};
use uuid::Uuid;

use crate::{
    backend::{BookingLedger, SlotStore, TemplateStore},
    configuration::Configuration,
    error::SchedulingError,
    types::{Booking, BookingRequest, Customer, SlotTime, Template, TimeSlot},
};

pub const TEST_PASSWORD: &str = "123";

pub fn date(value: &str) -> NaiveDate {
    value.parse().unwrap()
}

pub fn times(values: &[&str]) -> Vec<SlotTime> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

pub fn booking_request(date: NaiveDate, time: &str) -> BookingRequest {
    BookingRequest {
        date,
        time: time.parse().unwrap(),
        service: "Haircut".into(),
        customer: Customer {
            name: "Stefan".into(),
            email: "stefan@example.com".into(),
            phone: "555 1234".into(),
        },
    }
}

pub fn booking_for(date: NaiveDate, time: &str) -> Booking {
    let request = booking_request(date, time);
    Booking {
        id: Uuid::new_v4(),
        date: request.date,
        time: request.time,
        service: request.service,
        customer: request.customer,
        created_at: Utc::now(),
    }
}

#[derive(Clone)]
pub struct TestConfiguration;

impl Configuration for TestConfiguration {
    fn password(&self) -> String {
        TEST_PASSWORD.into()
    }

    fn port(&self) -> String {
        "0".into()
    }

    fn database_url(&self) -> Option<String> {
        None
    }

    fn week_start(&self) -> Weekday {
        Weekday::Sun
    }
}

pub struct MockSchedulingBackendInner {
    pub success: AtomicBool,
    pub calls_to_save_slots: AtomicU64,
    pub calls_to_merge_slots: AtomicU64,
    pub calls_to_slots: AtomicU64,
    pub calls_to_delete_slots: AtomicU64,
    pub calls_to_create_template: AtomicU64,
    pub calls_to_templates: AtomicU64,
    pub calls_to_template: AtomicU64,
    pub calls_to_delete_template: AtomicU64,
    pub calls_to_create_booking: AtomicU64,
    pub calls_to_bookings: AtomicU64,
    pub calls_to_delete_booking: AtomicU64,
}

/// Backend that only counts calls and succeeds or fails on demand.
#[derive(Clone)]
pub struct MockSchedulingBackend(pub Arc<MockSchedulingBackendInner>);

impl MockSchedulingBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            calls_to_save_slots: AtomicU64::default(),
            calls_to_merge_slots: AtomicU64::default(),
            calls_to_slots: AtomicU64::default(),
            calls_to_delete_slots: AtomicU64::default(),
            calls_to_create_template: AtomicU64::default(),
            calls_to_templates: AtomicU64::default(),
            calls_to_template: AtomicU64::default(),
            calls_to_delete_template: AtomicU64::default(),
            calls_to_create_booking: AtomicU64::default(),
            calls_to_bookings: AtomicU64::default(),
            calls_to_delete_booking: AtomicU64::default(),
        }
    }
}

impl MockSchedulingBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockSchedulingBackendInner::new()))
    }

    /// Total number of storage calls of any kind.
    pub fn calls(&self) -> u64 {
        [
            &self.0.calls_to_save_slots,
            &self.0.calls_to_merge_slots,
            &self.0.calls_to_slots,
            &self.0.calls_to_delete_slots,
            &self.0.calls_to_create_template,
            &self.0.calls_to_templates,
            &self.0.calls_to_template,
            &self.0.calls_to_delete_template,
            &self.0.calls_to_create_booking,
            &self.0.calls_to_bookings,
            &self.0.calls_to_delete_booking,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }

    fn result<T>(&self, counter: &AtomicU64, value: T) -> Result<T, SchedulingError> {
        counter.fetch_add(1, Ordering::SeqCst);
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(value),
            false => Err(SchedulingError::Persistence("Supposed to fail".into())),
        }
    }
}

impl SlotStore for MockSchedulingBackend {
    fn save_slots(&self, _date: NaiveDate, _times: &[SlotTime]) -> Result<(), SchedulingError> {
        self.result(&self.0.calls_to_save_slots, ())
    }

    fn merge_slots(
        &self,
        date: NaiveDate,
        times: &[SlotTime],
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let slots = times.iter().map(|time| TimeSlot::open(date, *time)).collect();
        self.result(&self.0.calls_to_merge_slots, slots)
    }

    fn slots(&self, _date: NaiveDate) -> Result<Vec<TimeSlot>, SchedulingError> {
        self.result(&self.0.calls_to_slots, vec![])
    }

    fn delete_slots(
        &self,
        _date: NaiveDate,
        _times: &[SlotTime],
        _cascade: bool,
    ) -> Result<Vec<Booking>, SchedulingError> {
        self.result(&self.0.calls_to_delete_slots, vec![])
    }
}

impl TemplateStore for MockSchedulingBackend {
    fn create_template(&self, _template: Template) -> Result<(), SchedulingError> {
        self.result(&self.0.calls_to_create_template, ())
    }

    fn templates(&self) -> Result<Vec<Template>, SchedulingError> {
        self.result(&self.0.calls_to_templates, vec![])
    }

    fn template(&self, name: &str) -> Result<Option<Template>, SchedulingError> {
        let template = Template::new(name, vec![]);
        self.result(&self.0.calls_to_template, Some(template))
    }

    fn delete_template(&self, _name: &str) -> Result<(), SchedulingError> {
        self.result(&self.0.calls_to_delete_template, ())
    }
}

impl BookingLedger for MockSchedulingBackend {
    fn create_booking(&self, booking: Booking) -> Result<Booking, SchedulingError> {
        self.result(&self.0.calls_to_create_booking, booking)
    }

    fn bookings(&self) -> Result<Vec<Booking>, SchedulingError> {
        self.result(&self.0.calls_to_bookings, vec![])
    }

    fn delete_booking(&self, id: Uuid) -> Result<Booking, SchedulingError> {
        let mut booking = booking_for(Utc::now().date_naive(), "09:00");
        booking.id = id;
        self.result(&self.0.calls_to_delete_booking, booking)
    }
}
