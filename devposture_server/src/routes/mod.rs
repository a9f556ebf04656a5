use rocket::{Route, routes};

pub mod devices;
pub mod enroll;
pub mod telemetry;

/// API routes
pub fn api_routes() -> Vec<Route> {
    routes![
        // Telemetry ingestion
        telemetry::ingest_report,
        // Inventory
        devices::list_devices,
        devices::get_device_details,
        devices::delete_device,
        // Enrollment handshake
        enroll::poll,
        enroll::claim,
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    use diesel::r2d2::{ConnectionManager, Pool};
    use diesel::sqlite::SqliteConnection;
    use rocket::local::blocking::Client;

    use crate::db::{self, DbPool};
    use crate::error;

    /// Local client over the mounted API, backed by a single-connection
    /// in-memory database so every request sees the same schema.
    pub fn test_client() -> Client {
        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool: DbPool = Pool::builder()
            .max_size(1)
            .build(manager)
            .expect("in-memory pool");
        db::run_migrations(&mut pool.get().expect("pooled connection")).expect("migrations");

        let rocket = rocket::build()
            .manage(pool)
            .register("/api", rocket::catchers![error::unauthorized_catcher])
            .mount("/api", super::api_routes());
        Client::tracked(rocket).expect("valid rocket instance")
    }
}
