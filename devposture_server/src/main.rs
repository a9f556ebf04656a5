use rocket::launch;

mod auth;
mod db;
mod enrollment;
mod error;
mod models;
mod routes;
mod schema;
mod settings;
mod store;
mod tasks;

#[launch]
fn rocket() -> _ {
    db::init_logger();

    let settings = settings::Settings::from_env();
    let pool = db::init_pool(&settings.database_url);

    {
        let mut conn = db::get_conn(&pool);
        db::run_migrations(&mut conn).expect("Failed to run migrations");
    }

    log::info!("devposture server starting (db: {})", settings.database_url);

    rocket::build()
        .manage(pool)
        .manage(settings)
        .attach(tasks::pending_sweep::PendingSweepFairing)
        .register("/api", rocket::catchers![error::unauthorized_catcher])
        .mount("/api", routes::api_routes())
}
