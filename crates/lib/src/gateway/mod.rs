//! Gateway: HTTP server for the Twilio webhook and the static result route.
//!
//! `POST /` takes the Twilio form and answers with TwiML; `GET /static/{file}` serves try-on
//! results; `GET /` is a health check.

mod server;

pub use server::{build_state, router, run_gateway, GatewayState};
