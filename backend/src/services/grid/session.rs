use crate::session::SessionStore;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use common::responses::SessionResponse;

/// Hands out the anti-forgery token of the caller's session, setting the
/// session cookie when a new session was opened.
pub async fn process(req: HttpRequest, sessions: web::Data<SessionStore>) -> impl Responder {
    let issued = sessions.issue(&req).await;
    let mut response = HttpResponse::Ok();
    if issued.is_new {
        response.cookie(issued.cookie());
    }
    response.json(SessionResponse {
        success: true,
        token: issued.token,
    })
}
