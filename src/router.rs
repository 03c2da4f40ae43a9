use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use chrono::FixedOffset;
use url::Url;

use crate::auth::TokenService;
use crate::config::Config;
use crate::handlers::{
    appointments, auth, availability, board, bulletin, documents, health, messages, notices,
    notifications, posts, report_updates, reports, users,
};
use crate::service::mailer::MailService;
use crate::service::scheduling::schedule_zone;
use crate::service::store_actor::StoreHandle;

#[derive(Clone)]
pub struct PortalState {
    pub store: StoreHandle,
    pub tokens: TokenService,
    pub mailer: MailService,
    /// Frontend origin used for links in outbound mail.
    pub base_url: Arc<Url>,
    pub schedule_zone: FixedOffset,
    pub body_limit: usize,
}

impl PortalState {
    pub fn new(store: StoreHandle, mailer: MailService, cfg: &Config) -> Self {
        Self {
            store,
            tokens: TokenService::new(&cfg.jwt_secret, cfg.jwt_expiry_secs),
            mailer,
            base_url: Arc::new(cfg.base_url.clone()),
            schedule_zone: schedule_zone(cfg.schedule_utc_offset_minutes),
            body_limit: cfg.body_limit_bytes,
        }
    }
}

impl FromRef<PortalState> for TokenService {
    fn from_ref(state: &PortalState) -> Self {
        state.tokens.clone()
    }
}

impl FromRef<PortalState> for StoreHandle {
    fn from_ref(state: &PortalState) -> Self {
        state.store.clone()
    }
}

pub fn portal_router(state: PortalState) -> Router {
    let body_limit = state.body_limit;

    let api = Router::new()
        .route(
            "/auth",
            get(auth::lookup).post(auth::register).put(auth::login),
        )
        .route("/auth/me", get(auth::me))
        .route(
            "/users",
            get(users::list)
                .post(users::create)
                .put(users::update)
                .delete(users::delete),
        )
        .route(
            "/notices",
            get(notices::list).post(notices::create).delete(notices::delete),
        )
        .route(
            "/reports",
            get(reports::list)
                .post(reports::create)
                .put(reports::update)
                .delete(reports::delete),
        )
        .route(
            "/reports/updates",
            get(report_updates::list)
                .post(report_updates::create)
                .delete(report_updates::delete),
        )
        .route(
            "/appointments",
            get(appointments::list)
                .post(appointments::create)
                .patch(appointments::set_status),
        )
        .route(
            "/availability",
            get(availability::list).post(availability::upsert),
        )
        .route(
            "/board",
            get(board::list)
                .post(board::create)
                .put(board::update)
                .delete(board::delete),
        )
        .route(
            "/bulletin",
            get(bulletin::list).post(bulletin::create).delete(bulletin::delete),
        )
        .route(
            "/documents",
            get(documents::list)
                .post(documents::create)
                .delete(documents::delete),
        )
        .route(
            "/messages",
            get(messages::list).post(messages::send).put(messages::mark_read),
        )
        .route(
            "/notifications",
            get(notifications::list)
                .post(notifications::create)
                .put(notifications::update)
                .delete(notifications::delete),
        )
        .route("/posts", get(posts::list).post(posts::create))
        .route("/posts/comments", post(posts::add_comment));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
