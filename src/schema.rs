diesel::table! {
    appointments (id) {
        id -> Uuid,
        customer_name -> Nullable<Text>,
        company_name -> Nullable<Text>,
        service_type -> Text,
        description -> Text,
        notes -> Nullable<Text>,
        scheduled_at -> Date,
        start_time -> Nullable<Text>,
        end_time -> Nullable<Text>,
        status -> Text,
        price -> Float8,
        stage -> Text,
        expected_revenue -> Float8,
        probability -> Int4,
        phone -> Nullable<Text>,
        email -> Nullable<Text>,
        nif -> Nullable<Text>,
        tech_sent_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    responses (id) {
        id -> Uuid,
        title -> Text,
        content -> Text,
        category -> Text,
        last_updated -> Int8,
    }
}
