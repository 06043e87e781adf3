pub mod health;
pub mod origin;

use actix_web::web;

use crate::gate::SorryPage;

/// Mount /health and /metrics, and put everything else behind `gate`, with
/// the origin relay as the downstream service.
pub fn configure(gate: SorryPage) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        health::configure(cfg);
        cfg.service(
            web::scope("")
                .wrap(gate)
                .default_service(web::to(origin::forward_to_origin)),
        );
    }
}
