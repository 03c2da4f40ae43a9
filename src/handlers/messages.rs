use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{enum_field, present};
use crate::db::Collection;
use crate::db::models::{Message, MessageKind, User, new_id};
use crate::error::PortalError;
use crate::middleware::ApiJson;
use crate::router::PortalState;
use crate::types::MarkReadResponse;

/// Sender ids with this prefix belong to visitors without an account.
const GUEST_PREFIX: &str = "temp-";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    pub user_id: Option<String>,
    pub recipient_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInput {
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    pub recipient_id: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRead {
    pub user_id: Option<String>,
    pub sender_id: Option<String>,
}

/// Which messages a GET asks for. Earlier variants take precedence.
#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Conversation(String),
    Group,
    Thread { user: String, peer: String },
    Inbox(String),
    All,
}

impl Selection {
    fn from_query(query: MessageQuery) -> Self {
        let user = present(query.user_id);
        let recipient = present(query.recipient_id);
        if let Some(conversation) = present(query.conversation_id) {
            return Self::Conversation(conversation);
        }
        if query.kind.as_deref() == Some("group") || recipient.as_deref() == Some("null") {
            return Self::Group;
        }
        match (user, recipient) {
            (Some(user), Some(peer)) => Self::Thread { user, peer },
            (Some(user), None) => Self::Inbox(user),
            _ => Self::All,
        }
    }

    fn matches(&self, m: &Message) -> bool {
        match self {
            Self::Conversation(id) => m.conversation_id.as_deref() == Some(id.as_str()),
            Self::Group => m.is_group(),
            Self::Thread { user, peer } => {
                let to = m.recipient_id.as_deref();
                m.is_private()
                    && ((m.sender_id == *user && to == Some(peer.as_str()))
                        || (m.sender_id == *peer && to == Some(user.as_str())))
            }
            Self::Inbox(user) => {
                m.is_private()
                    && (m.sender_id == *user || m.recipient_id.as_deref() == Some(user.as_str()))
            }
            Self::All => true,
        }
    }
}

fn chat_link(base: &Url, sender_id: &str, sender_name: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push("messages");
    }
    url.query_pairs_mut()
        .append_pair("recipientId", sender_id)
        .append_pair("recipientName", sender_name);
    url
}

/// GET /api/messages -> oldest first.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<MessageQuery>,
) -> Result<Json<Vec<Message>>, PortalError> {
    let selection = Selection::from_query(query);
    let mut messages: Vec<Message> = state.store.list(Collection::Messages).await?;
    messages.retain(|m| selection.matches(m));
    messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    debug!(?selection, count = messages.len(), "messages selected");
    Ok(Json(messages))
}

/// POST /api/messages -> store a message; private ones notify the recipient by mail.
pub async fn send(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<MessageInput>,
) -> Result<Json<Message>, PortalError> {
    let (Some(sender_id), Some(content)) = (present(body.sender_id), present(body.content)) else {
        return Err(PortalError::bad_request("senderId and content are required"));
    };
    let recipient_id = present(body.recipient_id);
    let kind = enum_field::<MessageKind>(body.kind, "type")?.unwrap_or(match recipient_id {
        Some(_) => MessageKind::Private,
        None => MessageKind::Group,
    });

    let users: Vec<User> = state.store.list(Collection::Users).await?;
    let sender_name = if sender_id.starts_with(GUEST_PREFIX) {
        present(body.sender_name).unwrap_or_else(|| "Guest".to_string())
    } else {
        users
            .iter()
            .find(|u| u.id == sender_id)
            .map(|u| u.name.clone())
            .ok_or_else(|| PortalError::not_found("Sender not found"))?
    };

    let message = Message {
        id: new_id(),
        sender_id,
        sender_name,
        recipient_id,
        content,
        created_at: Utc::now(),
        is_read: false,
        kind: Some(kind),
        conversation_id: present(body.conversation_id),
    };
    let created = state.store.insert(Collection::Messages, message).await?;
    info!(message_id = %created.id, kind = ?kind, "message stored");

    if kind == MessageKind::Private
        && let Some(recipient) = created
            .recipient_id
            .as_deref()
            .and_then(|id| users.iter().find(|u| u.id == id))
    {
        let link = chat_link(&state.base_url, &created.sender_id, &created.sender_name);
        state.mailer.send_chat_notification(
            &recipient.email,
            &created.sender_name,
            &created.content,
            link.as_str(),
        );
    }

    Ok(Json(created))
}

/// PUT /api/messages -> mark everything `senderId` sent to `userId` as read.
pub async fn mark_read(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<MarkRead>,
) -> Result<Json<MarkReadResponse>, PortalError> {
    let (Some(user_id), Some(sender_id)) = (present(body.user_id), present(body.sender_id)) else {
        return Err(PortalError::bad_request("userId and senderId are required"));
    };

    let updated_count = state
        .store
        .mutate(Collection::Messages, move |messages: &mut Vec<Message>| {
            let mut count = 0;
            for m in messages.iter_mut().filter(|m| {
                !m.is_read
                    && m.sender_id == sender_id
                    && m.recipient_id.as_deref() == Some(user_id.as_str())
            }) {
                m.is_read = true;
                count += 1;
            }
            Ok(count)
        })
        .await?;

    Ok(Json(MarkReadResponse {
        success: true,
        updated_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(user: Option<&str>, recipient: Option<&str>, kind: Option<&str>) -> MessageQuery {
        MessageQuery {
            user_id: user.map(String::from),
            recipient_id: recipient.map(String::from),
            kind: kind.map(String::from),
            conversation_id: None,
        }
    }

    #[test]
    fn selection_precedence() {
        let mut q = query(Some("u1"), Some("u2"), Some("group"));
        q.conversation_id = Some("c1".into());
        assert_eq!(Selection::from_query(q), Selection::Conversation("c1".into()));

        assert_eq!(
            Selection::from_query(query(Some("u1"), Some("u2"), Some("group"))),
            Selection::Group
        );
        assert_eq!(
            Selection::from_query(query(Some("u1"), Some("null"), None)),
            Selection::Group
        );
        assert_eq!(
            Selection::from_query(query(Some("u1"), Some("u2"), None)),
            Selection::Thread {
                user: "u1".into(),
                peer: "u2".into()
            }
        );
        assert_eq!(
            Selection::from_query(query(Some("u1"), None, None)),
            Selection::Inbox("u1".into())
        );
        assert_eq!(Selection::from_query(query(None, None, None)), Selection::All);
    }

    #[test]
    fn chat_link_encodes_the_name() {
        let base = Url::parse("https://portal.example.nl").unwrap();
        let link = chat_link(&base, "u1", "Anna de Vries");
        assert_eq!(
            link.as_str(),
            "https://portal.example.nl/messages?recipientId=u1&recipientName=Anna+de+Vries"
        );
    }
}
