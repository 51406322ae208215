//! Provider over an in-memory collection

use std::cmp::Ordering;

use async_trait::async_trait;

use super::provider::{AttributeAccess, DataProvider, KeySelector, ProviderState};
use super::sort::Sort;
use crate::error::OrmResult;
use crate::model::Key;
use crate::storage::OrderDirection;
use crate::value::Value;

/// Sorts and pages a fixed collection.
///
/// Sorting is stable. Without a [`KeySelector`] the key of a model is its
/// position in the sorted collection.
#[derive(Debug)]
pub struct ArrayDataProvider<T> {
    items: Vec<T>,
    state: ProviderState<T>,
}

impl<T> ArrayDataProvider<T>
where
    T: AttributeAccess + Clone + Send + Sync,
{
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            state: ProviderState::default(),
        }
    }

    pub fn with_key(mut self, key: KeySelector<T>) -> Self {
        self.state.key = Some(key);
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Replace the collection; cached results are dropped
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.state.clear();
    }
}

/// Stable multi-key sort
pub(crate) fn sort_items<T: AttributeAccess>(items: &mut [T], orders: &[(String, OrderDirection)]) {
    if orders.is_empty() {
        return;
    }
    items.sort_by(|a, b| {
        for (column, direction) in orders {
            let left = a.attribute(column).unwrap_or(&Value::Null);
            let right = b.attribute(column).unwrap_or(&Value::Null);
            let ordering = match direction {
                OrderDirection::Asc => left.compare(right),
                OrderDirection::Desc => right.compare(left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl<T> DataProvider for ArrayDataProvider<T>
where
    T: AttributeAccess + Clone + Send + Sync,
{
    type Item = T;

    fn state(&self) -> &ProviderState<T> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ProviderState<T> {
        &mut self.state
    }

    async fn prepare_models(&mut self) -> OrmResult<Vec<T>> {
        let mut models = self.items.clone();
        if let Some(sort) = &self.state.sort {
            sort_items(&mut models, &sort.orders());
        }

        if self.state.pagination.is_some() {
            let total = self.total_count().await?;
            if let Some(pagination) = self.state.pagination.as_mut() {
                pagination.set_total_count(total);
                if let Some(limit) = pagination.limit() {
                    let start = usize::try_from(pagination.offset())
                        .unwrap_or(usize::MAX)
                        .min(models.len());
                    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
                    let end = start.saturating_add(limit).min(models.len());
                    models = models.drain(start..end).collect();
                }
            }
        }
        Ok(models)
    }

    fn prepare_keys(&self, models: &[T]) -> Vec<Key> {
        if let Some(selector) = &self.state.key {
            return models.iter().map(|m| selector.key_of(m)).collect();
        }
        let offset = self
            .state
            .pagination
            .as_ref()
            .map_or(0, |p| usize::try_from(p.offset()).unwrap_or(usize::MAX));
        (0..models.len())
            .map(|i| Key::Index(offset.saturating_add(i)))
            .collect()
    }

    async fn prepare_total_count(&mut self) -> OrmResult<u64> {
        Ok(self.items.len() as u64)
    }

    /// Items have no catalog, so the whitelist must cover the default order
    async fn set_sort(&mut self, sort: Option<Sort>) -> OrmResult<()> {
        if let Some(sort) = &sort {
            sort.check_default_order_whitelisted()?;
        }
        self.state.sort = sort;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Pagination, SortAttribute};
    use crate::error::ModelError;
    use crate::value::{row, Row};

    fn items() -> Vec<Row> {
        [(5, "e"), (3, "c"), (1, "a"), (4, "d"), (2, "b")]
            .iter()
            .map(|(id, name)| row([("id", Value::Integer(*id)), ("name", Value::from(*name))]))
            .collect()
    }

    fn ids(models: &[Row]) -> Vec<i64> {
        models.iter().filter_map(|m| m.get("id").and_then(Value::as_i64)).collect()
    }

    async fn sorted_by_id() -> ArrayDataProvider<Row> {
        let mut provider = ArrayDataProvider::new(items());
        let sort = Sort::new()
            .attribute(SortAttribute::new("id"))
            .unwrap()
            .default_order(&[("id", OrderDirection::Asc)])
            .unwrap();
        provider.set_sort(Some(sort)).await.unwrap();
        provider
    }

    #[tokio::test]
    async fn test_second_page_of_two() {
        let mut provider = sorted_by_id().await;
        provider.set_pagination(Some(Pagination::new().with_page_size(2).with_page(1)));

        assert_eq!(ids(provider.models().await.unwrap()), vec![3, 4]);
        assert_eq!(provider.keys().await.unwrap(), &[Key::Index(2), Key::Index(3)]);
        assert_eq!(provider.total_count().await.unwrap(), 5);
        assert_eq!(provider.count().await.unwrap(), 2);
        assert_eq!(provider.pagination().map(|p| p.page_count()), Some(3));
    }

    #[tokio::test]
    async fn test_page_past_the_end_is_empty() {
        let mut provider = sorted_by_id().await;
        provider.set_pagination(Some(Pagination::new().with_page_size(2).with_page(9)));
        assert!(provider.models().await.unwrap().is_empty());
        assert_eq!(provider.total_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_huge_page_index_is_empty() {
        let mut provider = sorted_by_id().await;
        provider.set_pagination(Some(Pagination::new().with_page_size(20).with_page(u64::MAX / 4)));
        assert!(provider.models().await.unwrap().is_empty());
        assert!(provider.keys().await.unwrap().is_empty());
        assert_eq!(provider.total_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_unpaged_total_is_model_count() {
        let mut provider = sorted_by_id().await;
        provider.set_pagination(None);
        assert_eq!(ids(provider.models().await.unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(provider.total_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_default_order_needs_whitelisted_attribute() {
        let mut provider = ArrayDataProvider::new(items());
        let unlisted = Sort::new().default_order(&[("id", OrderDirection::Asc)]).unwrap();
        let result = provider.set_sort(Some(unlisted)).await;
        assert!(matches!(result, Err(ModelError::Configuration(_))));
        assert!(provider.sort().is_none());

        provider.set_sort(Some(Sort::new())).await.unwrap();
        assert_eq!(ids(provider.models().await.unwrap()), vec![5, 3, 1, 4, 2]);
    }

    #[test]
    fn test_stable_multi_key_sort() {
        let rows: Vec<Row> = [(1, "b", 2), (2, "a", 1), (3, "b", 1), (4, "a", 1)]
            .iter()
            .map(|(id, name, rank)| {
                row([
                    ("id", Value::Integer(*id)),
                    ("name", Value::from(*name)),
                    ("rank", Value::Integer(*rank)),
                ])
            })
            .collect();

        let mut models = rows.clone();
        sort_items(&mut models, &[("name".to_string(), OrderDirection::Desc)]);
        assert_eq!(ids(&models), vec![1, 3, 2, 4]);

        let mut models = rows;
        sort_items(
            &mut models,
            &[
                ("rank".to_string(), OrderDirection::Asc),
                ("name".to_string(), OrderDirection::Asc),
            ],
        );
        assert_eq!(ids(&models), vec![2, 4, 3, 1]);
    }

    #[tokio::test]
    async fn test_key_selector_and_refresh() {
        let mut provider = ArrayDataProvider::new(items()).with_key(KeySelector::attribute("name"));
        assert_eq!(provider.keys().await.unwrap()[0], Key::from("e"));

        provider.set_items(vec![row([("id", Value::Integer(9)), ("name", Value::from("z"))])]);
        assert_eq!(provider.keys().await.unwrap(), &[Key::from("z")]);

        provider.items.push(row([("id", Value::Integer(10)), ("name", Value::from("y"))]));
        assert_eq!(provider.count().await.unwrap(), 1);
        provider.refresh();
        assert_eq!(provider.count().await.unwrap(), 2);
    }
}
