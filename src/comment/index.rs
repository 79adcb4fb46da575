use super::controller::{get_comment, get_post_comments};
use actix_web::web;

pub fn comment_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/comments/{comment_id}", web::get().to(get_comment))
        .route("/posts/{post_id}/comments", web::get().to(get_post_comments));
}
