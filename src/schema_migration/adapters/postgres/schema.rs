//! Diesel schema for the migration tracking table.

diesel::table! {
    schema_versions (version) {
        version -> Int4,
        #[max_length = 100]
        name -> Varchar,
        applied_at -> Timestamptz,
    }
}
