//! Shared data-provider behavior
//!
//! A provider computes its models, their keys and the total count lazily on
//! first access and caches them until `refresh`. Models and keys are always
//! computed and cleared together.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::pagination::Pagination;
use super::sort::Sort;
use crate::error::OrmResult;
use crate::model::{Key, Record};
use crate::value::{Row, Value};

/// Read access to named attributes of a provider item
pub trait AttributeAccess {
    fn attribute(&self, name: &str) -> Option<&Value>;
}

impl AttributeAccess for Record {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.has_attribute(name).then(|| self.get_attribute(name))
    }
}

impl AttributeAccess for Row {
    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

/// How a provider derives the key of each model
pub enum KeySelector<T> {
    /// Value of the named attribute
    Attribute(String),
    Closure(Arc<dyn Fn(&T) -> Key + Send + Sync>),
}

impl<T> KeySelector<T> {
    pub fn attribute(name: &str) -> Self {
        KeySelector::Attribute(name.to_string())
    }

    pub fn closure<F>(f: F) -> Self
    where
        F: Fn(&T) -> Key + Send + Sync + 'static,
    {
        KeySelector::Closure(Arc::new(f))
    }
}

impl<T: AttributeAccess> KeySelector<T> {
    pub fn key_of(&self, item: &T) -> Key {
        match self {
            KeySelector::Attribute(name) => {
                Key::Scalar(item.attribute(name).cloned().unwrap_or(Value::Null))
            }
            KeySelector::Closure(f) => f(item),
        }
    }
}

impl<T> Clone for KeySelector<T> {
    fn clone(&self) -> Self {
        match self {
            KeySelector::Attribute(name) => KeySelector::Attribute(name.clone()),
            KeySelector::Closure(f) => KeySelector::Closure(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for KeySelector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySelector::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            KeySelector::Closure(_) => f.write_str("Closure(..)"),
        }
    }
}

/// Configuration and cached results of a provider
#[derive(Debug)]
pub struct ProviderState<T> {
    pub(crate) sort: Option<Sort>,
    pub(crate) pagination: Option<Pagination>,
    pub(crate) key: Option<KeySelector<T>>,
    pub(crate) models: Option<Vec<T>>,
    pub(crate) keys: Option<Vec<Key>>,
    pub(crate) total_count: Option<u64>,
}

impl<T> Default for ProviderState<T> {
    fn default() -> Self {
        Self {
            sort: None,
            pagination: Some(Pagination::default()),
            key: None,
            models: None,
            keys: None,
            total_count: None,
        }
    }
}

impl<T> ProviderState<T> {
    pub fn is_prepared(&self) -> bool {
        self.models.is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.models = None;
        self.keys = None;
        self.total_count = None;
    }
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    type Item: AttributeAccess + Send + Sync;

    fn state(&self) -> &ProviderState<Self::Item>;

    fn state_mut(&mut self) -> &mut ProviderState<Self::Item>;

    /// Load the models of the current page, in order
    async fn prepare_models(&mut self) -> OrmResult<Vec<Self::Item>>;

    /// Keys of `models`, one per model
    fn prepare_keys(&self, models: &[Self::Item]) -> Vec<Key>;

    /// Number of items across all pages
    async fn prepare_total_count(&mut self) -> OrmResult<u64>;

    /// Compute models and keys unless cached (or when `force`)
    async fn prepare(&mut self, force: bool) -> OrmResult<()> {
        if force || !self.state().is_prepared() {
            let models = self.prepare_models().await?;
            let keys = self.prepare_keys(&models);
            let state = self.state_mut();
            state.models = Some(models);
            state.keys = Some(keys);
        }
        Ok(())
    }

    async fn models(&mut self) -> OrmResult<&[Self::Item]> {
        self.prepare(false).await?;
        Ok(self.state().models.as_deref().unwrap_or(&[]))
    }

    async fn keys(&mut self) -> OrmResult<&[Key]> {
        self.prepare(false).await?;
        Ok(self.state().keys.as_deref().unwrap_or(&[]))
    }

    /// Number of models on the current page
    async fn count(&mut self) -> OrmResult<usize> {
        Ok(self.models().await?.len())
    }

    /// Number of items across all pages; the model count when paging is disabled
    async fn total_count(&mut self) -> OrmResult<u64> {
        if self.state().pagination.is_none() {
            return Ok(self.count().await? as u64);
        }
        if let Some(total) = self.state().total_count {
            return Ok(total);
        }
        let total = self.prepare_total_count().await?;
        self.state_mut().total_count = Some(total);
        Ok(total)
    }

    /// Drop cached models, keys and total count
    fn refresh(&mut self) {
        self.state_mut().clear();
    }

    fn pagination(&self) -> Option<&Pagination> {
        self.state().pagination.as_ref()
    }

    fn pagination_mut(&mut self) -> Option<&mut Pagination> {
        self.state_mut().pagination.as_mut()
    }

    /// `None` disables paging
    fn set_pagination(&mut self, pagination: Option<Pagination>) {
        self.state_mut().pagination = pagination;
    }

    fn sort(&self) -> Option<&Sort> {
        self.state().sort.as_ref()
    }

    fn sort_mut(&mut self) -> Option<&mut Sort> {
        self.state_mut().sort.as_mut()
    }

    /// `None` disables sorting
    async fn set_sort(&mut self, sort: Option<Sort>) -> OrmResult<()> {
        self.state_mut().sort = sort;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::row;

    #[test]
    fn test_key_selector() {
        let item = row([("id", Value::Integer(3)), ("name", Value::from("c"))]);
        let by_name: KeySelector<Row> = KeySelector::attribute("name");
        assert_eq!(by_name.key_of(&item), Key::from("c"));

        let by_closure: KeySelector<Row> =
            KeySelector::closure(|r: &Row| Key::Index(r.len()));
        assert_eq!(by_closure.key_of(&item), Key::Index(2));
    }
}
