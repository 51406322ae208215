//! Provider over a record query

use async_trait::async_trait;

use super::provider::{DataProvider, KeySelector, ProviderState};
use super::sort::Sort;
use crate::connection::Connection;
use crate::error::OrmResult;
use crate::model::{Key, Record};
use crate::persistence::{ActiveQuery, Persister};

/// Pages and sorts the results of an [`ActiveQuery`] in storage.
///
/// Nothing is selected when the table is empty or the page starts past
/// the last row.
///
/// Keys are the primary key of each record unless a [`KeySelector`] is
/// configured, and the position on the page when the table has no
/// primary key.
#[derive(Debug)]
pub struct ActiveDataProvider {
    persister: Persister,
    query: ActiveQuery,
    state: ProviderState<Record>,
}

impl ActiveDataProvider {
    pub fn new(connection: Connection, query: ActiveQuery) -> Self {
        Self {
            persister: Persister::new(connection),
            query,
            state: ProviderState::default(),
        }
    }

    pub fn with_key(mut self, key: KeySelector<Record>) -> Self {
        self.state.key = Some(key);
        self
    }

    pub fn query(&self) -> &ActiveQuery {
        &self.query
    }
}

#[async_trait]
impl DataProvider for ActiveDataProvider {
    type Item = Record;

    fn state(&self) -> &ProviderState<Record> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProviderState<Record> {
        &mut self.state
    }

    async fn prepare_models(&mut self) -> OrmResult<Vec<Record>> {
        let mut query = self.query.clone();

        if self.state.pagination.is_some() {
            let total = self.total_count().await?;
            if let Some(pagination) = self.state.pagination.as_mut() {
                pagination.set_total_count(total);
                if total == 0 || (pagination.is_paged() && pagination.offset() >= total) {
                    return Ok(Vec::new());
                }
                if let Some(limit) = pagination.limit() {
                    query = query.limit(limit).offset(pagination.offset());
                }
            }
        }

        if let Some(sort) = &self.state.sort {
            for (column, direction) in sort.orders() {
                query = query.add_order_by(&column, direction);
            }
        }

        self.persister.find_all(&query).await
    }

    fn prepare_keys(&self, models: &[Record]) -> Vec<Key> {
        if let Some(selector) = &self.state.key {
            return models.iter().map(|m| selector.key_of(m)).collect();
        }
        models
            .iter()
            .enumerate()
            .map(|(i, model)| {
                if model.schema().primary_key.is_empty() {
                    Key::Index(i)
                } else {
                    model.primary_key()
                }
            })
            .collect()
    }

    async fn prepare_total_count(&mut self) -> OrmResult<u64> {
        self.persister.count(&self.query).await
    }

    /// An empty whitelist is filled with the table's columns
    async fn set_sort(&mut self, sort: Option<Sort>) -> OrmResult<()> {
        let sort = match sort {
            Some(mut sort) => {
                if sort.attributes().is_empty() {
                    let schema = self
                        .persister
                        .connection()
                        .table_schema(self.query.definition().table())
                        .await?;
                    sort.populate_attributes(&schema.column_names())?;
                }
                Some(sort)
            }
            None => None,
        };
        self.state.sort = sort;
        Ok(())
    }
}
