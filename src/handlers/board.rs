use axum::{
    Json,
    extract::{Query, State},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use super::{delete_owned, enum_field, explicit, parse_enum, present};
use crate::db::Collection;
use crate::db::models::{ItemCategory, ItemCondition, MarketplaceItem, new_id};
use crate::error::PortalError;
use crate::middleware::{ApiJson, CurrentUser, ensure_owner_or_admin};
use crate::router::PortalState;
use crate::types::DeleteResponse;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardQuery {
    pub user_id: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    pub id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInput {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "explicit")]
    pub price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "explicit")]
    pub condition: Option<Option<ItemCondition>>,
    pub images: Option<Vec<String>>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "explicit")]
    pub contact_info: Option<Option<String>>,
}

fn required_category(raw: Option<String>) -> Result<Option<ItemCategory>, PortalError> {
    enum_field::<ItemCategory>(raw, "category")
}

/// GET /api/board -> marketplace items, newest first.
pub async fn list(
    State(state): State<PortalState>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Vec<MarketplaceItem>>, PortalError> {
    let mut items: Vec<MarketplaceItem> = state.store.list(Collection::Board).await?;
    if let Some(user_id) = present(query.user_id) {
        items.retain(|i| i.user_id == user_id);
    }
    if let Some(category) = present(query.category) {
        let category = parse_enum::<ItemCategory>(&category);
        items.retain(|i| Some(i.category) == category);
    }
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(items))
}

/// POST /api/board
pub async fn create(
    State(state): State<PortalState>,
    ApiJson(body): ApiJson<ItemInput>,
) -> Result<Json<MarketplaceItem>, PortalError> {
    let (Some(title), Some(description), Some(category), Some(user_id), Some(user_name)) = (
        present(body.title),
        present(body.description),
        required_category(body.category)?,
        present(body.user_id),
        present(body.user_name),
    ) else {
        return Err(PortalError::bad_request(
            "Title, description, category, userId and userName are required",
        ));
    };

    let now = Utc::now();
    let item = MarketplaceItem {
        id: new_id(),
        title,
        description,
        price: body.price.flatten(),
        category,
        condition: body.condition.flatten(),
        images: body.images.unwrap_or_default(),
        user_id,
        user_name,
        contact_info: body.contact_info.flatten(),
        created_at: now,
        updated_at: now,
    };
    let created = state.store.insert(Collection::Board, item).await?;
    info!(item_id = %created.id, category = ?created.category, "marketplace item created");
    Ok(Json(created))
}

/// PUT /api/board -> owner or admin edits an item. Fields left out keep their value.
pub async fn update(
    State(state): State<PortalState>,
    current: CurrentUser,
    ApiJson(body): ApiJson<ItemInput>,
) -> Result<Json<MarketplaceItem>, PortalError> {
    let (Some(id), Some(title), Some(description), Some(category)) = (
        present(body.id),
        present(body.title),
        present(body.description),
        required_category(body.category)?,
    ) else {
        return Err(PortalError::bad_request(
            "ID, title, description and category are required",
        ));
    };

    let existing: MarketplaceItem = state
        .store
        .find(Collection::Board, &id)
        .await?
        .ok_or_else(|| PortalError::not_found("Item not found"))?;
    ensure_owner_or_admin(
        &state.store,
        &current,
        body.user_id.as_deref(),
        &existing.user_id,
    )
    .await?;

    let (price, condition, images, contact_info) =
        (body.price, body.condition, body.images, body.contact_info);
    let updated = state
        .store
        .mutate(Collection::Board, move |items: &mut Vec<MarketplaceItem>| {
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| PortalError::not_found("Item not found"))?;
            item.title = title;
            item.description = description;
            item.category = category;
            if let Some(price) = price {
                item.price = price;
            }
            if let Some(condition) = condition {
                item.condition = condition;
            }
            if let Some(images) = images {
                item.images = images;
            }
            if let Some(contact_info) = contact_info {
                item.contact_info = contact_info;
            }
            item.updated_at = Utc::now();
            Ok(item.clone())
        })
        .await?;

    info!(item_id = %updated.id, "marketplace item updated");
    Ok(Json(updated))
}

/// DELETE /api/board?id=&userId=
pub async fn delete(
    State(state): State<PortalState>,
    current: CurrentUser,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteResponse>, PortalError> {
    let Some(id) = present(query.id) else {
        return Err(PortalError::bad_request("Item id is required"));
    };
    let removed: MarketplaceItem = delete_owned(
        &state.store,
        Collection::Board,
        &id,
        &current,
        query.user_id.as_deref(),
        "Item not found",
    )
    .await?;
    info!(item_id = %removed.id, "marketplace item deleted");
    Ok(Json(DeleteResponse::ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_price_differs_from_missing_price() {
        let free: ItemInput = serde_json::from_value(json!({"price": null})).unwrap();
        assert_eq!(free.price, Some(None));

        let untouched: ItemInput = serde_json::from_value(json!({})).unwrap();
        assert_eq!(untouched.price, None);

        let priced: ItemInput = serde_json::from_value(json!({"price": 12.5})).unwrap();
        assert_eq!(priced.price, Some(Some(12.5)));
    }
}
