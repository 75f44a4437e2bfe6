use crate::{
    backend::{BookingLedger, SlotStore, TemplateStore},
    error::SchedulingError,
    schema::{bookings, templates, time_slots},
    types::{Booking, Customer, SlotStatus, SlotTime, Template, TimeSlot},
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::{
    pg::Pg,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    sql_types::Text,
    Connection, ConnectionError, PgConnection,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Queryable, Selectable)]
#[diesel(table_name = time_slots)]
#[diesel(check_for_backend(Pg))]
struct SlotRow {
    slot_date: NaiveDate,
    slot_time: NaiveTime,
    status: String,
}

#[derive(Insertable)]
#[diesel(table_name = time_slots)]
struct NewSlotRow<'a> {
    slot_date: NaiveDate,
    slot_time: NaiveTime,
    status: &'a str,
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = templates)]
#[diesel(check_for_backend(Pg))]
struct TemplateRow {
    name: String,
    slots: Vec<NaiveTime>,
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(Pg))]
struct BookingRow {
    id: Uuid,
    slot_date: NaiveDate,
    slot_time: NaiveTime,
    service: String,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SlotRow> for TimeSlot {
    type Error = SchedulingError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        Ok(TimeSlot {
            date: row.slot_date,
            time: row.slot_time.into(),
            status: row.status.parse().map_err(SchedulingError::Persistence)?,
        })
    }
}

impl From<TemplateRow> for Template {
    fn from(row: TemplateRow) -> Self {
        Template::new(row.name, row.slots.into_iter().map(SlotTime::from).collect())
    }
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            date: row.slot_date,
            time: row.slot_time.into(),
            service: row.service,
            customer: Customer {
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
            },
            created_at: row.created_at,
        }
    }
}

impl From<&Booking> for BookingRow {
    fn from(booking: &Booking) -> Self {
        BookingRow {
            id: booking.id,
            slot_date: booking.date,
            slot_time: booking.time.as_naive(),
            service: booking.service.clone(),
            customer_name: booking.customer.name.clone(),
            customer_email: booking.customer.email.clone(),
            customer_phone: booking.customer.phone.clone(),
            created_at: booking.created_at,
        }
    }
}

fn naive_times(times: &[SlotTime]) -> Vec<NaiveTime> {
    times.iter().map(SlotTime::as_naive).collect()
}

/// Serializes all writers of `date` until the surrounding transaction ends.
fn lock_date(conn: &mut PgConnection, date: NaiveDate) -> QueryResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind::<Text, _>(date.to_string())
        .execute(conn)?;
    Ok(())
}

fn load_slots(conn: &mut PgConnection, date: NaiveDate) -> Result<Vec<TimeSlot>, SchedulingError> {
    time_slots::table
        .filter(time_slots::slot_date.eq(date))
        .order(time_slots::id.asc())
        .select(SlotRow::as_select())
        .load(conn)?
        .into_iter()
        .map(TimeSlot::try_from)
        .collect()
}

fn insert_open_slots(
    conn: &mut PgConnection,
    date: NaiveDate,
    times: &[NaiveTime],
) -> QueryResult<usize> {
    if times.is_empty() {
        return Ok(0);
    }
    let rows: Vec<NewSlotRow> = times
        .iter()
        .map(|time| NewSlotRow {
            slot_date: date,
            slot_time: *time,
            status: SlotStatus::Open.as_str(),
        })
        .collect();
    diesel::insert_into(time_slots::table)
        .values(&rows)
        .on_conflict((time_slots::slot_date, time_slots::slot_time))
        .do_nothing()
        .execute(conn)
}

/// PostgreSQL backend. Run the migrations in `migrations/` before first use.
#[derive(Clone)]
pub struct DatabaseInterface {
    connection: Arc<Mutex<PgConnection>>,
}

impl DatabaseInterface {
    pub fn new(database_url: &str) -> Result<Self, ConnectionError> {
        let connection = Self::establish_connection(database_url)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn establish_connection(database_url: &str) -> Result<PgConnection, ConnectionError> {
        PgConnection::establish(database_url)
    }

    #[cfg(test)]
    fn clear(&self) {
        let mut connection = self.connection.lock().unwrap();
        diesel::delete(bookings::table)
            .execute(&mut *connection)
            .unwrap();
        diesel::delete(time_slots::table)
            .execute(&mut *connection)
            .unwrap();
        diesel::delete(templates::table)
            .execute(&mut *connection)
            .unwrap();
    }
}

impl SlotStore for DatabaseInterface {
    fn save_slots(&self, date: NaiveDate, times: &[SlotTime]) -> Result<(), SchedulingError> {
        let mut connection = self.connection.lock()?;
        let times = naive_times(times);

        connection.transaction::<_, SchedulingError, _>(|conn| {
            lock_date(conn, date)?;
            let booked: Vec<SlotTime> = load_slots(conn, date)?
                .into_iter()
                .filter(|slot| slot.status == SlotStatus::Booked)
                .map(|slot| slot.time)
                .collect();

            let dropped_booked: Vec<SlotTime> = booked
                .iter()
                .filter(|time| !times.contains(&time.as_naive()))
                .copied()
                .collect();
            if !dropped_booked.is_empty() {
                return Err(SchedulingError::SlotInUse {
                    date,
                    times: dropped_booked,
                });
            }

            diesel::delete(
                time_slots::table
                    .filter(time_slots::slot_date.eq(date))
                    .filter(time_slots::status.eq(SlotStatus::Open.as_str())),
            )
            .execute(conn)?;

            let new_times: Vec<NaiveTime> = times
                .iter()
                .filter(|time| !booked.iter().any(|slot| slot.as_naive() == **time))
                .copied()
                .collect();
            let inserted = insert_open_slots(conn, date, &new_times)?;
            debug!(%date, inserted, kept = booked.len(), "Replaced slots");
            Ok(())
        })
    }

    fn merge_slots(
        &self,
        date: NaiveDate,
        times: &[SlotTime],
    ) -> Result<Vec<TimeSlot>, SchedulingError> {
        let mut connection = self.connection.lock()?;
        let times = naive_times(times);

        connection.transaction::<_, SchedulingError, _>(|conn| {
            lock_date(conn, date)?;
            insert_open_slots(conn, date, &times)?;
            load_slots(conn, date)
        })
    }

    fn slots(&self, date: NaiveDate) -> Result<Vec<TimeSlot>, SchedulingError> {
        let mut connection = self.connection.lock()?;
        load_slots(&mut connection, date)
    }

    fn delete_slots(
        &self,
        date: NaiveDate,
        times: &[SlotTime],
        cascade: bool,
    ) -> Result<Vec<Booking>, SchedulingError> {
        let mut connection = self.connection.lock()?;
        let times = naive_times(times);

        connection.transaction::<_, SchedulingError, _>(|conn| {
            lock_date(conn, date)?;
            let booked: Vec<NaiveTime> = time_slots::table
                .filter(time_slots::slot_date.eq(date))
                .filter(time_slots::slot_time.eq_any(times.clone()))
                .filter(time_slots::status.eq(SlotStatus::Booked.as_str()))
                .order(time_slots::id.asc())
                .select(time_slots::slot_time)
                .load(conn)?;

            if !booked.is_empty() && !cascade {
                return Err(SchedulingError::SlotInUse {
                    date,
                    times: booked.into_iter().map(SlotTime::from).collect(),
                });
            }

            let removed: Vec<BookingRow> = if booked.is_empty() {
                vec![]
            } else {
                diesel::delete(
                    bookings::table
                        .filter(bookings::slot_date.eq(date))
                        .filter(bookings::slot_time.eq_any(booked)),
                )
                .returning(BookingRow::as_returning())
                .get_results(conn)?
            };

            diesel::delete(
                time_slots::table
                    .filter(time_slots::slot_date.eq(date))
                    .filter(time_slots::slot_time.eq_any(times)),
            )
            .execute(conn)?;

            Ok(removed.into_iter().map(Booking::from).collect())
        })
    }
}

impl TemplateStore for DatabaseInterface {
    fn create_template(&self, template: Template) -> Result<(), SchedulingError> {
        let mut connection = self.connection.lock()?;
        let row = TemplateRow {
            name: template.name,
            slots: naive_times(&template.slots),
        };

        let result = diesel::insert_into(templates::table)
            .values(&row)
            .execute(&mut *connection);
        match result {
            Ok(_) => Ok(()),
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                Err(SchedulingError::DuplicateTemplate { name: row.name })
            }
            Err(err) => {
                error!(?err, "Template can't be added");
                Err(err.into())
            }
        }
    }

    fn templates(&self) -> Result<Vec<Template>, SchedulingError> {
        let mut connection = self.connection.lock()?;
        let rows = templates::table
            .select(TemplateRow::as_select())
            .load(&mut *connection)?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    fn template(&self, name: &str) -> Result<Option<Template>, SchedulingError> {
        let mut connection = self.connection.lock()?;
        let row = templates::table
            .find(name)
            .select(TemplateRow::as_select())
            .first(&mut *connection)
            .optional()?;
        Ok(row.map(Template::from))
    }

    fn delete_template(&self, name: &str) -> Result<(), SchedulingError> {
        let mut connection = self.connection.lock()?;
        diesel::delete(templates::table.find(name)).execute(&mut *connection)?;
        Ok(())
    }
}

impl BookingLedger for DatabaseInterface {
    fn create_booking(&self, booking: Booking) -> Result<Booking, SchedulingError> {
        let mut connection = self.connection.lock()?;

        connection.transaction::<_, SchedulingError, _>(|conn| {
            lock_date(conn, booking.date)?;
            let claimed = diesel::update(
                time_slots::table
                    .filter(time_slots::slot_date.eq(booking.date))
                    .filter(time_slots::slot_time.eq(booking.time.as_naive()))
                    .filter(time_slots::status.eq(SlotStatus::Open.as_str())),
            )
            .set(time_slots::status.eq(SlotStatus::Booked.as_str()))
            .execute(conn)?;

            if claimed == 0 {
                return Err(SchedulingError::SlotUnavailable {
                    date: booking.date,
                    time: booking.time,
                });
            }

            diesel::insert_into(bookings::table)
                .values(BookingRow::from(&booking))
                .execute(conn)?;
            Ok(booking)
        })
    }

    fn bookings(&self) -> Result<Vec<Booking>, SchedulingError> {
        let mut connection = self.connection.lock()?;
        let rows = bookings::table
            .select(BookingRow::as_select())
            .load(&mut *connection)?;
        Ok(rows.into_iter().map(Booking::from).collect())
    }

    fn delete_booking(&self, id: Uuid) -> Result<Booking, SchedulingError> {
        let mut connection = self.connection.lock()?;

        connection.transaction::<_, SchedulingError, _>(|conn| {
            let row = bookings::table
                .find(id)
                .select(BookingRow::as_select())
                .first(conn)
                .optional()?
                .ok_or_else(|| SchedulingError::not_found("booking", id))?;
            lock_date(conn, row.slot_date)?;

            let deleted = diesel::delete(bookings::table.find(id)).execute(conn)?;
            if deleted == 0 {
                return Err(SchedulingError::not_found("booking", id));
            }

            diesel::update(
                time_slots::table
                    .filter(time_slots::slot_date.eq(row.slot_date))
                    .filter(time_slots::slot_time.eq(row.slot_time)),
            )
            .set(time_slots::status.eq(SlotStatus::Open.as_str()))
            .execute(conn)?;
            Ok(Booking::from(row))
        })
    }
}
