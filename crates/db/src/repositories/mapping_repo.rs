//! Repository for the per-kind `*_mappings` tables.
//!
//! One repository serves every entity kind: the table name and source-key
//! columns come from [`EntityKind`], and statements are assembled with
//! `QueryBuilder` so composite keys bind only the columns their table has.
//!
//! Every function takes any `PgExecutor`, so callers pass `&pool` for a
//! standalone statement or `&mut *tx` to run inside a transaction.

use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use idmap_core::entity_kind::{EntityKind, SourceShape};
use idmap_core::error::CoreError;
use idmap_core::mapping::{MappingRecord, NewMapping, SourceKey};
use idmap_core::paging::{Page, PageRequest};
use idmap_core::types::DbId;

use crate::error::MappingStoreError;
use crate::models::mapping::MappingRow;

/// Projection shared by every kind. Missing composite columns read as NULL.
fn select_columns(kind: EntityKind) -> &'static str {
    match kind.source_shape() {
        SourceShape::Simple => {
            "source_id, NULL::INTEGER AS source_seq, NULL::TEXT AS source_discriminator, \
             target_id, run_label, origin, created_at"
        }
        SourceShape::Sequenced => {
            "source_id, source_seq, NULL::TEXT AS source_discriminator, \
             target_id, run_label, origin, created_at"
        }
        SourceShape::Discriminated => {
            "source_id, NULL::INTEGER AS source_seq, source_discriminator, \
             target_id, run_label, origin, created_at"
        }
    }
}

/// Column list for inserts.
fn insert_columns(kind: EntityKind) -> &'static str {
    match kind.source_shape() {
        SourceShape::Simple => "source_id, target_id, run_label, origin",
        SourceShape::Sequenced => "source_id, source_seq, target_id, run_label, origin",
        SourceShape::Discriminated => {
            "source_id, source_discriminator, target_id, run_label, origin"
        }
    }
}

/// Append `source_id = $n [AND source_seq|source_discriminator = $m]`.
fn push_source_predicate(qb: &mut QueryBuilder<'_, Postgres>, key: &SourceKey) {
    qb.push("source_id = ").push_bind(key.subject_id());
    match key {
        SourceKey::Simple(_) => {}
        SourceKey::Sequenced { sequence, .. } => {
            qb.push(" AND source_seq = ").push_bind(*sequence);
        }
        SourceKey::Discriminated { discriminator, .. } => {
            qb.push(" AND source_discriminator = ")
                .push_bind(discriminator.clone());
        }
    }
}

fn ensure_shape(kind: EntityKind, key: &SourceKey) -> Result<(), CoreError> {
    if key.shape() == kind.source_shape() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Source id '{key}' does not match the {:?} key shape of {kind}",
            kind.source_shape()
        )))
    }
}

fn into_records(
    kind: EntityKind,
    rows: Vec<MappingRow>,
) -> Result<Vec<MappingRecord>, MappingStoreError> {
    rows.into_iter()
        .map(|row| row.into_record(kind).map_err(MappingStoreError::from))
        .collect()
}

/// Provides the mapping record store operations for every entity kind.
pub struct MappingRepo;

impl MappingRepo {
    /// Insert a mapping, returning the stored record.
    ///
    /// Never upserts: a collision on either id fails with
    /// [`MappingStoreError::UniqueViolation`].
    pub async fn insert<'e, E>(
        executor: E,
        mapping: &NewMapping,
    ) -> Result<MappingRecord, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        mapping.validate()?;
        let kind = mapping.kind;
        let key = &mapping.source_id;

        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "INSERT INTO {} ({}) VALUES (",
            kind.table(),
            insert_columns(kind)
        ));
        qb.push_bind(key.subject_id());
        if let Some(sequence) = key.sequence() {
            qb.push(", ").push_bind(sequence);
        }
        if let Some(discriminator) = key.discriminator() {
            qb.push(", ").push_bind(discriminator.to_string());
        }
        qb.push(", ")
            .push_bind(mapping.target_id.clone())
            .push(", ")
            .push_bind(mapping.run_label.clone())
            .push(", ")
            .push_bind(mapping.origin.as_str())
            .push(") RETURNING ")
            .push(select_columns(kind));

        let row = qb
            .build_query_as::<MappingRow>()
            .fetch_one(executor)
            .await
            .map_err(|err| MappingStoreError::from_write(err, mapping))?;

        Ok(row.into_record(kind)?)
    }

    /// Find a mapping by its legacy source id.
    pub async fn find_by_source<'e, E>(
        executor: E,
        kind: EntityKind,
        source_id: &SourceKey,
    ) -> Result<Option<MappingRecord>, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        ensure_shape(kind, source_id)?;
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {} WHERE ",
            select_columns(kind),
            kind.table()
        ));
        push_source_predicate(&mut qb, source_id);

        let row = qb
            .build_query_as::<MappingRow>()
            .fetch_optional(executor)
            .await?;
        Ok(row.map(|row| row.into_record(kind)).transpose()?)
    }

    /// Find a mapping by its target id.
    pub async fn find_by_target<'e, E>(
        executor: E,
        kind: EntityKind,
        target_id: &str,
    ) -> Result<Option<MappingRecord>, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {} FROM {} WHERE target_id = $1",
            select_columns(kind),
            kind.table()
        );
        let row = sqlx::query_as::<_, MappingRow>(&query)
            .bind(target_id)
            .fetch_optional(executor)
            .await?;
        Ok(row.map(|row| row.into_record(kind)).transpose()?)
    }

    /// Correct the target id of the mapping with `source_id`, in place.
    ///
    /// Only kinds that report [`EntityKind::supports_update`] accept this.
    /// Returns `None` when no mapping has that source id.
    pub async fn update_target(
        pool: &PgPool,
        kind: EntityKind,
        source_id: &SourceKey,
        target_id: &str,
    ) -> Result<Option<MappingRecord>, MappingStoreError> {
        if !kind.supports_update() {
            return Err(CoreError::Validation(format!(
                "Mappings of kind {kind} cannot be updated in place"
            ))
            .into());
        }
        idmap_core::mapping::validate_target_id(target_id)?;

        let mut tx = pool.begin().await?;

        let Some(current) = Self::find_by_source(&mut *tx, kind, source_id).await? else {
            return Ok(None);
        };
        let attempted = NewMapping {
            target_id: target_id.to_string(),
            ..current.mapping
        };

        let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET target_id = ", kind.table()));
        qb.push_bind(target_id.to_string()).push(" WHERE ");
        push_source_predicate(&mut qb, source_id);
        qb.push(" RETURNING ").push(select_columns(kind));

        let row = qb
            .build_query_as::<MappingRow>()
            .fetch_one(&mut *tx)
            .await
            .map_err(|err| MappingStoreError::from_write(err, &attempted))?;

        tx.commit().await?;
        Ok(Some(row.into_record(kind)?))
    }

    /// Delete the mapping with `source_id`. Returns the number of rows removed.
    pub async fn delete_by_source<'e, E>(
        executor: E,
        kind: EntityKind,
        source_id: &SourceKey,
    ) -> Result<u64, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        ensure_shape(kind, source_id)?;
        let mut qb = QueryBuilder::<Postgres>::new(format!("DELETE FROM {} WHERE ", kind.table()));
        push_source_predicate(&mut qb, source_id);

        let result = qb.build().execute(executor).await?;
        Ok(result.rows_affected())
    }

    /// Delete the mapping with `target_id`. Returns the number of rows removed.
    pub async fn delete_by_target<'e, E>(
        executor: E,
        kind: EntityKind,
        target_id: &str,
    ) -> Result<u64, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("DELETE FROM {} WHERE target_id = $1", kind.table());
        let result = sqlx::query(&query)
            .bind(target_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every mapping of `kind` keyed to `subject_id`: the record itself
    /// for simple kinds, all children of that parent for composite ones.
    pub async fn delete_by_subject<'e, E>(
        executor: E,
        kind: EntityKind,
        subject_id: DbId,
    ) -> Result<u64, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("DELETE FROM {} WHERE source_id = $1", kind.table());
        let result = sqlx::query(&query)
            .bind(subject_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every mapping of `kind`.
    pub async fn delete_all<'e, E>(executor: E, kind: EntityKind) -> Result<u64, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("DELETE FROM {}", kind.table());
        let result = sqlx::query(&query).execute(executor).await?;
        Ok(result.rows_affected())
    }

    /// Count mappings of `kind` carrying `run_label`.
    pub async fn count_by_label<'e, E>(
        executor: E,
        kind: EntityKind,
        run_label: &str,
    ) -> Result<i64, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT COUNT(*) FROM {} WHERE run_label = $1", kind.table());
        let (count,): (i64,) = sqlx::query_as(&query)
            .bind(run_label)
            .fetch_one(executor)
            .await?;
        Ok(count)
    }

    /// Count every mapping of `kind`.
    pub async fn count_all<'e, E>(executor: E, kind: EntityKind) -> Result<i64, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT COUNT(*) FROM {}", kind.table());
        let (count,): (i64,) = sqlx::query_as(&query).fetch_one(executor).await?;
        Ok(count)
    }

    /// One page of mappings carrying `run_label`, in the request's sort order
    /// with `target_id` as the pinned tie-breaker.
    pub async fn find_page<'e, E>(
        executor: E,
        kind: EntityKind,
        run_label: &str,
        request: &PageRequest,
    ) -> Result<Vec<MappingRecord>, MappingStoreError>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {} FROM {} WHERE run_label = $1 ORDER BY {} LIMIT $2 OFFSET $3",
            select_columns(kind),
            kind.table(),
            request.sort.order_by_clause()
        );
        let rows = sqlx::query_as::<_, MappingRow>(&query)
            .bind(run_label)
            .bind(request.size)
            .bind(request.offset())
            .fetch_all(executor)
            .await?;
        into_records(kind, rows)
    }

    /// Page of mappings for a migration run.
    ///
    /// The content read and the count read are independent and run
    /// concurrently on separate pool connections.
    pub async fn page_by_run_label(
        pool: &PgPool,
        kind: EntityKind,
        run_label: &str,
        request: &PageRequest,
    ) -> Result<Page<MappingRecord>, MappingStoreError> {
        let (content, total) = tokio::try_join!(
            Self::find_page(pool, kind, run_label, request),
            Self::count_by_label(pool, kind, run_label),
        )?;
        Ok(Page::new(content, request, total))
    }
}
