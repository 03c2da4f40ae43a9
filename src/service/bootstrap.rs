//! One-off data repairs run at startup, before the server accepts requests.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use crate::auth::hash_password;
use crate::db::Collection;
use crate::db::models::{Message, MessageKind, Role, User, new_id};
use crate::error::PortalError;
use crate::service::store_actor::StoreHandle;

/// Credentials for the administrator created when none exists.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub passwords_backfilled: usize,
    pub admin_created: bool,
    pub messages_typed: usize,
}

pub async fn run(
    store: &StoreHandle,
    admin: Option<&AdminSeed>,
) -> Result<BootstrapReport, PortalError> {
    let mut report = BootstrapReport {
        passwords_backfilled: backfill_passwords(store).await?,
        ..BootstrapReport::default()
    };
    if let Some(seed) = admin {
        report.admin_created = ensure_admin(store, seed).await?;
    }
    report.messages_typed = backfill_message_types(store).await?;
    info!(?report, "bootstrap finished");
    Ok(report)
}

/// Users without a password get the local part of their e-mail as password.
pub async fn backfill_passwords(store: &StoreHandle) -> Result<usize, PortalError> {
    let users: Vec<User> = store.list(Collection::Users).await?;
    let mut hashes = HashMap::new();
    for user in users.iter().filter(|u| u.password.is_none()) {
        let local_part = user.email.split('@').next().unwrap_or_default();
        if local_part.is_empty() {
            warn!(user_id = %user.id, "user without password has no usable email; skipped");
            continue;
        }
        hashes.insert(user.id.clone(), hash_password(local_part)?);
        warn!(user_id = %user.id, email = %user.email, "password missing; set to email local part");
    }
    if hashes.is_empty() {
        return Ok(0);
    }

    store
        .mutate(Collection::Users, move |users: &mut Vec<User>| {
            let mut count = 0;
            for user in users.iter_mut().filter(|u| u.password.is_none()) {
                if let Some(hash) = hashes.remove(&user.id) {
                    user.password = Some(hash);
                    user.updated_at = Utc::now();
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
}

/// Create the configured administrator unless an ADMIN already exists.
pub async fn ensure_admin(store: &StoreHandle, seed: &AdminSeed) -> Result<bool, PortalError> {
    let users: Vec<User> = store.list(Collection::Users).await?;
    if users.iter().any(|u| u.role == Role::Admin) {
        return Ok(false);
    }

    let now = Utc::now();
    let admin = User {
        id: new_id(),
        email: seed.email.trim().to_lowercase(),
        password: Some(hash_password(&seed.password)?),
        name: seed.name.clone(),
        role: Role::Admin,
        created_at: now,
        updated_at: now,
    };

    let created = store
        .mutate(Collection::Users, move |users: &mut Vec<User>| {
            if let Some(existing) = users.iter().find(|u| u.role == Role::Admin) {
                info!(email = %existing.email, "administrator present");
                return Ok(false);
            }
            if users.iter().any(|u| u.email.eq_ignore_ascii_case(&admin.email)) {
                warn!(email = %admin.email, "seed admin email taken by a non-admin user; not seeding");
                return Ok(false);
            }
            info!(email = %admin.email, "creating administrator");
            users.push(admin);
            Ok(true)
        })
        .await?;
    Ok(created)
}

/// Give untyped legacy messages a `type` derived from their recipient.
pub async fn backfill_message_types(store: &StoreHandle) -> Result<usize, PortalError> {
    store
        .mutate(Collection::Messages, |messages: &mut Vec<Message>| {
            let mut count = 0;
            for m in messages.iter_mut().filter(|m| m.kind.is_none()) {
                m.kind = Some(match m.recipient_id {
                    Some(_) => MessageKind::Private,
                    None => MessageKind::Group,
                });
                count += 1;
            }
            Ok(count)
        })
        .await
}
