use serde::{Deserialize, Serialize};

use crate::models::{Item, ItemKind};

// -- Listing --

/// Filter accepted by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    pub unread_only: bool,
    pub kind: Option<ItemKind>,
}

/// One authoritative page of items, plus the separately computed unread
/// count for the whole domain and a has-more marker for infinite scroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub unread_count: u32,
    pub has_more: bool,
}

// -- Badge --

/// Count-only response for the lightweight badge request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: u32,
}
