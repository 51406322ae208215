//! SELECT description handed to the storage

use std::fmt;

use super::condition::Condition;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn reverse(self) -> Self {
        match self {
            OrderDirection::Asc => OrderDirection::Desc,
            OrderDirection::Desc => OrderDirection::Asc,
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Query over one table: filter, ordering and an optional window
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub condition: Condition,
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            condition: Condition::All,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// AND a condition onto the filter
    pub fn filter(mut self, condition: Condition) -> Self {
        self.condition = std::mem::take(&mut self.condition).and(condition);
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<crate::value::Value>) -> Self {
        self.filter(Condition::eq(column, value))
    }

    /// Replace the ordering with a single ascending column
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by = vec![(column.to_string(), OrderDirection::Asc)];
        self
    }

    /// Replace the ordering with a single descending column
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by = vec![(column.to_string(), OrderDirection::Desc)];
        self
    }

    /// Append a column to the ordering
    pub fn add_order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.order_by.push((column.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Same filter, no ordering and no window; what a count runs over
    pub fn without_paging(&self) -> Self {
        Self {
            table: self.table.clone(),
            condition: self.condition.clone(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}
