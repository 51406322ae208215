//! Record queries

use std::sync::Arc;

use crate::model::ModelDefinition;
use crate::storage::{Condition, OrderDirection, Query};
use crate::value::Value;

/// A storage query bound to the model its rows are loaded into
#[derive(Debug, Clone)]
pub struct ActiveQuery {
    definition: Arc<ModelDefinition>,
    query: Query,
}

impl ActiveQuery {
    pub fn new(definition: &Arc<ModelDefinition>) -> Self {
        Self {
            query: Query::table(definition.table()),
            definition: Arc::clone(definition),
        }
    }

    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Replace the underlying query; the table stays the model's table
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = Query {
            table: self.definition.table().to_string(),
            ..query
        };
        self
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.query = self.query.filter(condition);
        self
    }

    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.query = self.query.where_eq(column, value);
        self
    }

    pub fn order_by(mut self, column: &str) -> Self {
        self.query = self.query.order_by(column);
        self
    }

    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.query = self.query.order_by_desc(column);
        self
    }

    pub fn add_order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.query = self.query.add_order_by(column, direction);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query = self.query.limit(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.query = self.query.offset(offset);
        self
    }
}
