//! Binary entry point; all wiring lives in the library crate.

#[rocket::launch]
fn rocket() -> rocket::Rocket<rocket::Build> {
    dispatch_server::rocket()
}
