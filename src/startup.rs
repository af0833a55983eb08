use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::SessionManager;
use crate::clock::Clock;
use crate::configuration::Settings;
use crate::middleware::{AccessGuard, RequestLogger};
use crate::routes::{health_check, login, logout, me, refresh, signup};
use crate::store::PrincipalStore;
use crate::transport::CredentialTransport;

pub fn run(
    listener: TcpListener,
    store: Arc<dyn PrincipalStore>,
    clock: Arc<dyn Clock>,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let transport = web::Data::new(CredentialTransport::new(
        settings.application.secure_cookies,
        &settings.tokens,
    ));
    let sessions = web::Data::new(SessionManager::new(
        store,
        clock,
        settings.tokens,
        &settings.hashing,
    ));

    let server = HttpServer::new(move || {
        let guard = || AccessGuard::new(sessions.clone(), transport.clone());

        App::new()
            // Global middleware
            .wrap(RequestLogger)

            // Shared state
            .app_data(sessions.clone())
            .app_data(transport.clone())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/signup", web::post().to(signup))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))

            // Protected routes (require a valid access token)
            .service(
                web::resource("/auth/logout")
                    .wrap(guard())
                    .route(web::post().to(logout)),
            )
            .service(
                web::resource("/auth/me")
                    .wrap(guard())
                    .route(web::get().to(me)),
            )
            .service(
                web::scope("/api")
                    .wrap(guard())
                    .route("/me", web::get().to(me)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
