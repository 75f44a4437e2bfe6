diesel::table! {
    time_slots (id) {
        id -> Int4,
        slot_date -> Date,
        slot_time -> Time,
        status -> Text,
    }
}

diesel::table! {
    templates (name) {
        name -> Text,
        slots -> Array<Time>,
    }
}

diesel::table! {
    bookings (id) {
        id -> Uuid,
        slot_date -> Date,
        slot_time -> Time,
        service -> Text,
        customer_name -> Text,
        customer_email -> Text,
        customer_phone -> Text,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(time_slots, templates, bookings);
