//! Driver for composite aggregates: a parent table plus child relations.
//!
//! Reads go through an intermediate snapshot that child rows are folded
//! into before the aggregate is built. Multi-row reads batch every
//! relation into a single `IN (...)` query; per-parent child queries are
//! never issued. Multi-statement writes run inside one transaction when
//! the caller's database can begin one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{Driver, check_version};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::{Executor, TxBeginner};
use crate::mapping::{
    BuildFn, CompositeMapping, DecomposeFn, ExtractPkFn, ScanChildFn, ScanRootFn,
};
use crate::schema::{CompositeValues, Relation, SaveStrategy, Table};
use crate::value::Value;

pub(crate) struct CompositeDriver<T, S> {
    table: Table,
    relations: Vec<Relation>,
    dialect: Arc<dyn Dialect>,
    scan_root: ScanRootFn<S>,
    scan_child: ScanChildFn<S>,
    build: BuildFn<S, T>,
    decompose: DecomposeFn<T>,
    extract_pk: ExtractPkFn<S>,
}

impl<T, S> CompositeDriver<T, S> {
    pub(crate) fn new(mapping: CompositeMapping<T, S>, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            table: mapping.table,
            relations: mapping.relations,
            dialect,
            scan_root: mapping.scan_root,
            scan_child: mapping.scan_child,
            build: mapping.build,
            decompose: mapping.decompose,
            extract_pk: mapping.extract_pk,
        }
    }

    async fn load_children(
        &self,
        exec: &dyn Executor,
        rel: &Relation,
        parent_pk: &Value,
        snap: &mut S,
    ) -> Result<()> {
        let query = rel.select_by_fk(&*self.dialect);
        let rows = exec
            .query(&query, std::slice::from_ref(parent_pk))
            .await
            .map_err(|err| Error::database(format!("load children {}", rel.table), err))?;
        for row in &rows {
            (self.scan_child)(&rel.table, row, snap)?;
        }
        Ok(())
    }

    /// One batched query per relation across all collected parent keys,
    /// each returned row routed to its snapshot by the value in the
    /// relation's foreign-key column.
    async fn batch_load_children(
        &self,
        exec: &dyn Executor,
        rel: &Relation,
        ids: &[Value],
        snaps: &mut HashMap<String, S>,
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let fk_idx = rel.fk_column_index().ok_or_else(|| {
            Error::config(format!(
                "foreign key {} not found in columns of {}",
                rel.foreign_key, rel.table
            ))
        })?;

        let query = rel.batch_select_by_fks(&*self.dialect, ids.len());
        debug!(relation = %rel.table, parents = ids.len(), "batch load children");
        let rows = exec
            .query(&query, ids)
            .await
            .map_err(|err| Error::database(format!("load children {}", rel.table), err))?;

        for row in &rows {
            let parent_key = row
                .value(fk_idx)
                .ok_or_else(|| {
                    Error::decode(fk_idx.to_string(), "foreign key column missing from row")
                })?
                .to_string();
            let Some(snap) = snaps.get_mut(&parent_key) else {
                continue;
            };
            (self.scan_child)(&rel.table, row, snap)?;
        }
        Ok(())
    }

    async fn save_with_children(
        &self,
        exec: &dyn Executor,
        values: &CompositeValues,
    ) -> Result<()> {
        let query = self.table.upsert_sql(&*self.dialect);
        let affected = exec.execute(&query, &values.root).await?;
        check_version(&self.table, affected)?;

        let root_pk = values
            .root
            .first()
            .cloned()
            .ok_or_else(|| Error::config("decompose produced no root values"))?;

        for rel in &self.relations {
            let child_rows = values
                .children
                .get(&rel.table)
                .map(Vec::as_slice)
                .unwrap_or(&[]);

            match rel.on_save {
                SaveStrategy::DeleteAndReinsert => {
                    let delete = rel.delete_by_fk(&*self.dialect);
                    exec.execute(&delete, std::slice::from_ref(&root_pk))
                        .await
                        .map_err(|err| {
                            Error::database(format!("delete children {}", rel.table), err)
                        })?;
                    if !child_rows.is_empty() {
                        self.batch_insert(exec, rel, child_rows).await.map_err(
                            |err| Error::database(format!("insert children {}", rel.table), err),
                        )?;
                    }
                }

                SaveStrategy::Upsert => {
                    let upsert = rel.upsert_sql(&*self.dialect);
                    for row in child_rows {
                        exec.execute(&upsert, row).await.map_err(|err| {
                            Error::database(format!("upsert child {}", rel.table), err)
                        })?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn batch_insert(
        &self,
        exec: &dyn Executor,
        rel: &Relation,
        child_rows: &[Vec<Value>],
    ) -> Result<()> {
        let query = rel.batch_insert_sql(&*self.dialect, child_rows.len());
        let mut all_args = Vec::with_capacity(child_rows.len() * rel.columns.len());
        for row in child_rows {
            all_args.extend(row.iter().cloned());
        }
        exec.execute(&query, &all_args).await?;
        Ok(())
    }

    async fn delete_with_children(&self, exec: &dyn Executor, ids: &[Value]) -> Result<()> {
        let fk = ids
            .first()
            .ok_or_else(|| Error::config("delete requires at least one primary key value"))?;

        // Children go first, in reverse declaration order, so dependent
        // tables empty out before the rows they point at.
        for rel in self.relations.iter().rev() {
            let delete = rel.delete_by_fk(&*self.dialect);
            exec.execute(&delete, std::slice::from_ref(fk))
                .await
                .map_err(|err| Error::database(format!("delete children {}", rel.table), err))?;
        }

        let root = self.table.delete_sql(&*self.dialect);
        exec.execute(&root, ids).await?;
        Ok(())
    }
}

#[async_trait]
impl<T, S> Driver<T> for CompositeDriver<T, S>
where
    T: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    async fn find_one(&self, exec: &dyn Executor, query: &str, args: &[Value]) -> Result<T> {
        let row = exec.query_opt(query, args).await?.ok_or(Error::NotFound)?;
        let mut snap = (self.scan_root)(&row)?;

        let pk = (self.extract_pk)(&snap);
        for rel in &self.relations {
            self.load_children(exec, rel, &pk, &mut snap).await?;
        }

        (self.build)(snap)
    }

    async fn find_many(
        &self,
        exec: &dyn Executor,
        query: &str,
        args: &[Value],
    ) -> Result<Vec<T>> {
        let rows = exec.query(query, args).await?;

        if self.relations.is_empty() {
            return rows
                .iter()
                .map(|row| (self.scan_root)(row).and_then(|snap| (self.build)(snap)))
                .collect();
        }

        let mut keys = Vec::with_capacity(rows.len());
        let mut ids = Vec::with_capacity(rows.len());
        let mut snap_by_id: HashMap<String, S> = HashMap::with_capacity(rows.len());
        for row in &rows {
            let snap = (self.scan_root)(row)?;
            let pk = (self.extract_pk)(&snap);
            let key = pk.to_string();
            keys.push(key.clone());
            ids.push(pk);
            snap_by_id.insert(key, snap);
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        for rel in &self.relations {
            self.batch_load_children(exec, rel, &ids, &mut snap_by_id)
                .await?;
        }

        let mut result = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Some(snap) = snap_by_id.remove(key) {
                result.push((self.build)(snap)?);
            }
        }
        Ok(result)
    }

    async fn save(
        &self,
        db: Option<&dyn TxBeginner>,
        exec: &dyn Executor,
        aggregate: &T,
    ) -> Result<()> {
        let values = (self.decompose)(aggregate);

        if self.relations.is_empty() {
            let query = self.table.upsert_sql(&*self.dialect);
            let affected = exec.execute(&query, &values.root).await?;
            return check_version(&self.table, affected);
        }

        match db {
            Some(db) => {
                let tx = db.begin().await?;
                debug!(table = %self.table.name, "composite save in transaction");
                match self.save_with_children(&*tx, &values).await {
                    Ok(()) => tx.commit().await,
                    Err(err) => {
                        if let Err(rollback_err) = tx.rollback().await {
                            warn!(error = %rollback_err, "rollback failed");
                        }
                        Err(err)
                    }
                }
            }
            None => self.save_with_children(exec, &values).await,
        }
    }

    async fn delete(
        &self,
        db: Option<&dyn TxBeginner>,
        exec: &dyn Executor,
        ids: &[Value],
    ) -> Result<()> {
        if self.table.soft_delete_column.is_some() || self.relations.is_empty() {
            let query = self.table.delete_sql(&*self.dialect);
            exec.execute(&query, ids).await?;
            return Ok(());
        }

        match db {
            Some(db) => {
                let tx = db.begin().await?;
                match self.delete_with_children(&*tx, ids).await {
                    Ok(()) => tx.commit().await,
                    Err(err) => {
                        if let Err(rollback_err) = tx.rollback().await {
                            warn!(error = %rollback_err, "rollback failed");
                        }
                        Err(err)
                    }
                }
            }
            None => self.delete_with_children(exec, ids).await,
        }
    }
}
