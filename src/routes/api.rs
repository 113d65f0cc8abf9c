use actix_web::web;

use crate::handlers;

pub fn scoped_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(web::resource("/register").route(web::post().to(handlers::auth::register)))
            .service(web::resource("/login").route(web::post().to(handlers::auth::login))),
    )
    .service(
        web::scope("/mentors")
            .service(
                web::resource("")
                    .route(web::get().to(handlers::mentors::index))
                    .route(web::post().to(handlers::mentors::create)),
            )
            .service(web::resource("/{id}").route(web::get().to(handlers::mentors::show))),
    )
    .service(
        web::scope("/bookings")
            .service(
                web::resource("")
                    .route(web::post().to(handlers::bookings::create))
                    .route(web::get().to(handlers::bookings::index)),
            )
            .service(
                web::resource("/create-with-payment")
                    .route(web::post().to(handlers::bookings::create_with_payment)),
            )
            .service(
                web::resource("/confirm-payment")
                    .route(web::post().to(handlers::bookings::confirm_payment)),
            )
            .service(web::resource("/confirm").route(web::post().to(handlers::bookings::confirm)))
            .service(web::resource("/upcoming").route(web::get().to(handlers::bookings::upcoming)))
            .service(web::resource("/past").route(web::get().to(handlers::bookings::past)))
            .service(web::resource("/{id}").route(web::get().to(handlers::bookings::show)))
            .service(web::resource("/{id}/accept").route(web::post().to(handlers::bookings::accept)))
            .service(
                web::resource("/{id}/decline").route(web::post().to(handlers::bookings::decline)),
            )
            .service(
                web::resource("/{id}/complete").route(web::post().to(handlers::bookings::complete)),
            )
            .service(
                web::resource("/{id}/cancel").route(web::post().to(handlers::bookings::cancel)),
            ),
    )
    .service(
        web::scope("/payments")
            .service(
                web::resource("/create-payment-intent")
                    .route(web::post().to(handlers::payments::create_payment_intent)),
            )
            .service(
                web::resource("/confirm-payment")
                    .route(web::post().to(handlers::payments::confirm_payment)),
            )
            .service(
                web::resource("/payment-status/{payment_intent_id}")
                    .route(web::get().to(handlers::payments::payment_status)),
            ),
    );
}
