//! Usage ledger: the ordered links between media items and the external
//! entities that reference them.
//!
//! A link lives in a *slot*, identified by the owner reference, a field key and
//! an optional group. Owners are never loaded or type-checked here; the ledger
//! only stores and filters by the `(owner_type, owner_id)` pair.
//!
//! Every mutation of a slot runs inside one database transaction while holding
//! the slot's lock, so concurrent writers on the same field are serialized and
//! readers never see a half-applied `sync` or `reorder`.

use crate::entities::{prelude::*, *};
use crate::error::{MediaError, MediaResult};
use crate::services::asset::AssetLike;
use crate::utils::keyed_mutex::KeyedMutex;
use chrono::Utc;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Untyped reference to the entity that owns a usage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct OwnerRef {
    pub owner_type: String,
    pub owner_id: String,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
        }
    }

    fn condition(&self) -> Condition {
        Condition::all()
            .add(media_usages::Column::ModelType.eq(self.owner_type.as_str()))
            .add(media_usages::Column::ModelId.eq(self.owner_id.as_str()))
    }
}

/// A named attachment point on an owner.
///
/// With `group: None` the slot addresses the whole field: queries and deletions
/// match every group, and inserted links carry no group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub owner: OwnerRef,
    pub field_key: String,
    pub group: Option<String>,
}

impl Slot {
    pub fn new(
        owner_type: impl Into<String>,
        owner_id: impl Into<String>,
        field_key: impl Into<String>,
    ) -> Self {
        Self {
            owner: OwnerRef::new(owner_type, owner_id),
            field_key: field_key.into(),
            group: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = group.filter(|g| !g.is_empty());
        self
    }

    /// Rows addressed by this slot (any group when `group` is `None`)
    fn condition(&self) -> Condition {
        self.field_condition()
            .add_option(self.group.as_deref().map(|g| media_usages::Column::GroupName.eq(g)))
    }

    /// Rows in exactly this partition, treating `None` as "no group"
    fn partition_condition(&self) -> Condition {
        let group: SimpleExpr = match &self.group {
            Some(g) => media_usages::Column::GroupName.eq(g.as_str()),
            None => media_usages::Column::GroupName.is_null(),
        };
        self.field_condition().add(group)
    }

    fn field_condition(&self) -> Condition {
        self.owner
            .condition()
            .add(media_usages::Column::FieldKey.eq(self.field_key.as_str()))
    }

    /// Lock key covering every group of the field, since `group: None`
    /// operations span all of them.
    fn lock_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}",
            self.owner.owner_type, self.owner.owner_id, self.field_key
        )
    }

    fn validate(&self) -> MediaResult<()> {
        if self.owner.owner_type.is_empty()
            || self.owner.owner_id.is_empty()
            || self.field_key.is_empty()
        {
            return Err(MediaError::Validation(
                "Owner type, owner id and field key are required".to_string(),
            ));
        }
        Ok(())
    }
}

type UsageRow = (media_usages::Model, media_items::Model);

pub struct UsageLedger {
    db: DatabaseConnection,
    locks: KeyedMutex,
}

impl UsageLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            locks: KeyedMutex::new(),
        }
    }

    /// Append one usage per item at `start_position + index`. Existing usages
    /// are kept; a position already taken in the slot is a conflict.
    pub async fn attach<A: AssetLike>(
        &self,
        slot: &Slot,
        items: &[A],
        start_position: Option<i32>,
    ) -> MediaResult<Vec<media_usages::Model>> {
        slot.validate()?;
        let start = start_position.unwrap_or(0);
        if start < 0 {
            return Err(MediaError::Validation(
                "Start position must be non-negative".to_string(),
            ));
        }

        let _guard = self.locks.lock(&slot.lock_key()).await;
        let txn = self.db.begin().await?;

        let ids: Vec<String> = items.iter().map(|i| i.id().to_string()).collect();
        ensure_items_exist(&txn, &ids).await?;

        let mut created = Vec::with_capacity(items.len());
        for (index, id) in ids.iter().enumerate() {
            let position = i32::try_from(index)
                .ok()
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| {
                    MediaError::Validation(format!(
                        "Start position {} leaves no room for {} item(s)",
                        start,
                        ids.len()
                    ))
                })?;

            let taken = MediaUsages::find()
                .filter(slot.partition_condition())
                .filter(media_usages::Column::Position.eq(position))
                .count(&txn)
                .await?;
            if taken > 0 {
                return Err(MediaError::Conflict(format!(
                    "Position {} of {}/{}/{} is already occupied",
                    position, slot.owner.owner_type, slot.owner.owner_id, slot.field_key
                )));
            }

            created.push(insert_usage(&txn, slot, id, position).await?);
        }

        txn.commit().await?;
        debug!(
            "Attached {} item(s) to {}/{}/{}",
            created.len(),
            slot.owner.owner_type,
            slot.owner.owner_id,
            slot.field_key
        );
        Ok(created)
    }

    /// Replace the slot's contents with `media_item_ids`, positioned 0..n-1.
    /// Either the whole replacement is applied or nothing changes.
    pub async fn sync(
        &self,
        slot: &Slot,
        media_item_ids: &[String],
    ) -> MediaResult<Vec<media_usages::Model>> {
        slot.validate()?;
        let ids: Vec<String> = media_item_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();

        let _guard = self.locks.lock(&slot.lock_key()).await;
        let txn = self.db.begin().await?;

        ensure_items_exist(&txn, &ids).await?;

        let removed = MediaUsages::delete_many()
            .filter(slot.condition())
            .exec(&txn)
            .await?
            .rows_affected;

        let mut created = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            created.push(insert_usage(&txn, slot, id, position_of(index)?).await?);
        }

        txn.commit().await?;
        debug!(
            "Synced {}/{}/{}: removed {}, inserted {}",
            slot.owner.owner_type,
            slot.owner.owner_id,
            slot.field_key,
            removed,
            created.len()
        );
        Ok(created)
    }

    /// Remove every usage in the slot. Returns the number of rows removed.
    pub async fn detach(&self, slot: &Slot) -> MediaResult<u64> {
        slot.validate()?;
        let _guard = self.locks.lock(&slot.lock_key()).await;

        let removed = MediaUsages::delete_many()
            .filter(slot.condition())
            .exec(&self.db)
            .await?
            .rows_affected;
        Ok(removed)
    }

    /// Remove the usages of one media item from the slot
    pub async fn detach_one(&self, slot: &Slot, media_item_id: &str) -> MediaResult<u64> {
        slot.validate()?;
        let _guard = self.locks.lock(&slot.lock_key()).await;

        let removed = MediaUsages::delete_many()
            .filter(slot.condition())
            .filter(media_usages::Column::MediaItemId.eq(media_item_id))
            .exec(&self.db)
            .await?
            .rows_affected;
        Ok(removed)
    }

    /// Media items of the slot in position order
    pub async fn query(&self, slot: &Slot) -> MediaResult<Vec<media_items::Model>> {
        let rows = load_rows(&self.db, slot).await?;
        Ok(rows.into_iter().map(|(_, item)| item).collect())
    }

    pub async fn first(&self, slot: &Slot) -> MediaResult<Option<media_items::Model>> {
        Ok(self.query(slot).await?.into_iter().next())
    }

    pub async fn count(&self, slot: &Slot) -> MediaResult<u64> {
        Ok(MediaUsages::find()
            .filter(slot.condition())
            .count(&self.db)
            .await?)
    }

    pub async fn exists(&self, slot: &Slot) -> MediaResult<bool> {
        let hit = MediaUsages::find()
            .filter(slot.condition())
            .limit(1)
            .one(&self.db)
            .await?;
        Ok(hit.is_some())
    }

    /// Every media item attached to the owner, across all fields
    pub async fn all_for_owner(&self, owner: &OwnerRef) -> MediaResult<Vec<media_items::Model>> {
        let rows = MediaUsages::find()
            .filter(owner.condition())
            .order_by_asc(media_usages::Column::FieldKey)
            .order_by_asc(media_usages::Column::Position)
            .order_by_asc(media_usages::Column::Id)
            .find_also_related(MediaItems)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(_, item)| item.filter(|i| i.deleted_at.is_none()))
            .collect())
    }

    /// The owner's media grouped by field key, optionally limited to one group
    pub async fn by_field(
        &self,
        owner: &OwnerRef,
        group: Option<&str>,
    ) -> MediaResult<BTreeMap<String, Vec<media_items::Model>>> {
        let rows = MediaUsages::find()
            .filter(
                owner
                    .condition()
                    .add_option(group.map(|g| media_usages::Column::GroupName.eq(g))),
            )
            .order_by_asc(media_usages::Column::Position)
            .order_by_asc(media_usages::Column::Id)
            .find_also_related(MediaItems)
            .all(&self.db)
            .await?;

        let mut grouped: BTreeMap<String, Vec<media_items::Model>> = BTreeMap::new();
        for (usage, item) in rows {
            if let Some(item) = item.filter(|i| i.deleted_at.is_none()) {
                grouped.entry(usage.field_key).or_default().push(item);
            }
        }
        Ok(grouped)
    }

    /// Move the item at `from_index` to `to_index` and renumber the slot 0..n-1
    pub async fn reorder(
        &self,
        slot: &Slot,
        from_index: usize,
        to_index: usize,
    ) -> MediaResult<Vec<media_items::Model>> {
        self.reorder_with(slot, |rows| {
            let len = rows.len();
            if from_index >= len || to_index >= len {
                return Err(MediaError::Range(format!(
                    "Cannot move from {} to {} in a slot of {} item(s)",
                    from_index, to_index, len
                )));
            }
            Ok(Some((from_index, to_index)))
        })
        .await
    }

    /// Move an item one step towards the front. No-op when already first.
    pub async fn move_up(
        &self,
        slot: &Slot,
        media_item_id: &str,
    ) -> MediaResult<Vec<media_items::Model>> {
        self.reorder_with(slot, |rows| {
            let index = index_of(rows, media_item_id)?;
            Ok((index > 0).then(|| (index, index - 1)))
        })
        .await
    }

    /// Move an item one step towards the back. No-op when already last.
    pub async fn move_down(
        &self,
        slot: &Slot,
        media_item_id: &str,
    ) -> MediaResult<Vec<media_items::Model>> {
        self.reorder_with(slot, |rows| {
            let index = index_of(rows, media_item_id)?;
            Ok((index + 1 < rows.len()).then(|| (index, index + 1)))
        })
        .await
    }

    async fn reorder_with<F>(&self, slot: &Slot, pick: F) -> MediaResult<Vec<media_items::Model>>
    where
        F: FnOnce(&[UsageRow]) -> MediaResult<Option<(usize, usize)>>,
    {
        slot.validate()?;
        let _guard = self.locks.lock(&slot.lock_key()).await;
        let txn = self.db.begin().await?;

        let mut rows = load_rows(&txn, slot).await?;
        let Some((from, to)) = pick(&rows)? else {
            return Ok(rows.into_iter().map(|(_, item)| item).collect());
        };
        if from == to {
            return Ok(rows.into_iter().map(|(_, item)| item).collect());
        }

        let moved = rows.remove(from);
        rows.insert(to, moved);

        // Park every row at a negative position first, so the final numbering
        // never collides with a row that has not been renumbered yet.
        let now = Utc::now();
        for (index, (usage, _)) in rows.iter().enumerate() {
            set_position(&txn, &usage.id, -position_of(index)? - 1, now).await?;
        }
        for (index, (usage, _)) in rows.iter().enumerate() {
            set_position(&txn, &usage.id, position_of(index)?, now).await?;
        }

        txn.commit().await?;
        debug!(
            "Reordered {}/{}/{}: {} -> {}",
            slot.owner.owner_type, slot.owner.owner_id, slot.field_key, from, to
        );
        Ok(rows.into_iter().map(|(_, item)| item).collect())
    }
}

fn position_of(index: usize) -> MediaResult<i32> {
    i32::try_from(index)
        .map_err(|_| MediaError::Range(format!("Position {} is out of range", index)))
}

fn index_of(rows: &[UsageRow], media_item_id: &str) -> MediaResult<usize> {
    rows.iter()
        .position(|(_, item)| item.id == media_item_id)
        .ok_or_else(|| {
            MediaError::NotFound(format!(
                "Media item {} is not attached to this slot",
                media_item_id
            ))
        })
}

/// Usages of the slot joined with live media items, in position order
async fn load_rows<C: ConnectionTrait>(conn: &C, slot: &Slot) -> MediaResult<Vec<UsageRow>> {
    let rows = MediaUsages::find()
        .filter(slot.condition())
        .order_by_asc(media_usages::Column::Position)
        .order_by_asc(media_usages::Column::Id)
        .find_also_related(MediaItems)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(usage, item)| {
            item.filter(|i| i.deleted_at.is_none())
                .map(|item| (usage, item))
        })
        .collect())
}

async fn ensure_items_exist<C: ConnectionTrait>(conn: &C, ids: &[String]) -> MediaResult<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let unique: Vec<String> = ids
        .iter()
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let found: HashSet<String> = MediaItems::find()
        .filter(media_items::Column::Id.is_in(unique))
        .filter(media_items::Column::DeletedAt.is_null())
        .all(conn)
        .await?
        .into_iter()
        .map(|item| item.id)
        .collect();

    match ids.iter().find(|id| !found.contains(*id)) {
        Some(missing) => Err(MediaError::NotFound(format!(
            "Media item {} does not exist",
            missing
        ))),
        None => Ok(()),
    }
}

async fn insert_usage<C: ConnectionTrait>(
    conn: &C,
    slot: &Slot,
    media_item_id: &str,
    position: i32,
) -> MediaResult<media_usages::Model> {
    let now = Utc::now();
    let usage = media_usages::ActiveModel {
        id: Set(Uuid::now_v7().to_string()),
        media_item_id: Set(media_item_id.to_string()),
        model_type: Set(slot.owner.owner_type.clone()),
        model_id: Set(slot.owner.owner_id.clone()),
        field_key: Set(slot.field_key.clone()),
        group_name: Set(slot.group.clone()),
        position: Set(position),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(usage.insert(conn).await?)
}

async fn set_position<C: ConnectionTrait>(
    conn: &C,
    usage_id: &str,
    position: i32,
    now: chrono::DateTime<Utc>,
) -> MediaResult<()> {
    MediaUsages::update_many()
        .col_expr(media_usages::Column::Position, Expr::value(position))
        .col_expr(media_usages::Column::UpdatedAt, Expr::value(now))
        .filter(media_usages::Column::Id.eq(usage_id))
        .exec(conn)
        .await?;
    Ok(())
}
