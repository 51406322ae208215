//! Sort orders for data providers
//!
//! A sort holds a whitelist of sortable attributes, each mapping to the
//! column orders used for ascending and descending, plus the attribute
//! orders requested by the caller. Requests for attributes outside the
//! whitelist are ignored.

use crate::error::{ModelError, OrmResult};
use crate::storage::OrderDirection;

/// One sortable attribute
#[derive(Debug, Clone, PartialEq)]
pub struct SortAttribute {
    pub name: String,
    pub asc: Vec<(String, OrderDirection)>,
    pub desc: Vec<(String, OrderDirection)>,
    /// Direction used when the attribute is first requested through a toggle
    pub default_direction: OrderDirection,
    pub label: Option<String>,
}

impl SortAttribute {
    /// Sorts on the column of the same name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            asc: vec![(name.to_string(), OrderDirection::Asc)],
            desc: vec![(name.to_string(), OrderDirection::Desc)],
            default_direction: OrderDirection::Asc,
            label: None,
        }
    }

    pub fn asc(mut self, columns: &[(&str, OrderDirection)]) -> Self {
        self.asc = columns.iter().map(|(c, d)| (c.to_string(), *d)).collect();
        self
    }

    pub fn desc(mut self, columns: &[(&str, OrderDirection)]) -> Self {
        self.desc = columns.iter().map(|(c, d)| (c.to_string(), *d)).collect();
        self
    }

    pub fn default_direction(mut self, direction: OrderDirection) -> Self {
        self.default_direction = direction;
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn orders(&self, direction: OrderDirection) -> &[(String, OrderDirection)] {
        match direction {
            OrderDirection::Asc => &self.asc,
            OrderDirection::Desc => &self.desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    attributes: Vec<SortAttribute>,
    requested: Vec<(String, OrderDirection)>,
    default_order: Vec<(String, OrderDirection)>,
    multi_sort: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Self::new()
    }
}

impl Sort {
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
            requested: Vec::new(),
            default_order: Vec::new(),
            multi_sort: false,
        }
    }

    /// Add a sortable attribute; an empty column list is rejected
    pub fn attribute(mut self, attribute: SortAttribute) -> OrmResult<Self> {
        self.add_attribute(attribute)?;
        Ok(self)
    }

    pub fn add_attribute(&mut self, attribute: SortAttribute) -> OrmResult<()> {
        if attribute.asc.is_empty() || attribute.desc.is_empty() {
            return Err(ModelError::Configuration(format!(
                "Sort attribute '{}' must define ascending and descending columns",
                attribute.name
            )));
        }
        self.attributes.retain(|a| a.name != attribute.name);
        self.attributes.push(attribute);
        Ok(())
    }

    /// Order used when nothing valid is requested
    pub fn default_order(mut self, orders: &[(&str, OrderDirection)]) -> OrmResult<Self> {
        self.default_order = orders.iter().map(|(a, d)| (a.to_string(), *d)).collect();
        self.check_default_order()?;
        Ok(self)
    }

    pub fn multi_sort(mut self, enabled: bool) -> Self {
        self.multi_sort = enabled;
        self
    }

    pub fn is_multi_sort(&self) -> bool {
        self.multi_sort
    }

    pub fn attributes(&self) -> &[SortAttribute] {
        &self.attributes
    }

    pub fn get_attribute(&self, name: &str) -> Option<&SortAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Whitelist every given attribute when the whitelist is empty
    pub fn populate_attributes(&mut self, names: &[String]) -> OrmResult<()> {
        if self.attributes.is_empty() {
            self.attributes = names.iter().map(|name| SortAttribute::new(name)).collect();
        }
        self.check_default_order()
    }

    /// Request orders; attributes outside the whitelist are ignored
    pub fn set_orders(&mut self, orders: Vec<(String, OrderDirection)>) {
        self.requested.clear();
        for (name, direction) in orders {
            if !self.has_attribute(&name) {
                tracing::debug!("Ignoring sort on unknown attribute '{}'", name);
                continue;
            }
            if self.requested.iter().any(|(n, _)| n == &name) {
                continue;
            }
            self.requested.push((name, direction));
            if !self.multi_sort {
                break;
            }
        }
    }

    /// Request orders from a parameter such as `-id,name`
    pub fn parse_param(&mut self, param: &str) {
        let orders = param
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.strip_prefix('-') {
                Some(name) => (name.to_string(), OrderDirection::Desc),
                None => (part.to_string(), OrderDirection::Asc),
            })
            .collect();
        self.set_orders(orders);
    }

    /// Requested attribute orders, or the default order when none are requested
    pub fn attribute_orders(&self) -> &[(String, OrderDirection)] {
        if self.requested.is_empty() {
            &self.default_order
        } else {
            &self.requested
        }
    }

    pub fn direction(&self, attribute: &str) -> Option<OrderDirection> {
        self.attribute_orders()
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, d)| *d)
    }

    /// Column orders to apply, in attribute order
    pub fn orders(&self) -> Vec<(String, OrderDirection)> {
        let mut orders = Vec::new();
        for (name, direction) in self.attribute_orders() {
            if let Some(attribute) = self.get_attribute(name) {
                orders.extend(attribute.orders(*direction).iter().cloned());
            }
        }
        orders
    }

    /// Parameter that sorts by `attribute`: reversed when it is already
    /// sorted on, its default direction otherwise. With multi-sort the
    /// other current orders follow.
    pub fn toggle_param(&self, attribute: &str) -> Option<String> {
        let definition = self.get_attribute(attribute)?;
        let direction = match self.direction(attribute) {
            Some(current) => current.reverse(),
            None => definition.default_direction,
        };

        let mut orders = vec![(attribute.to_string(), direction)];
        if self.multi_sort {
            orders.extend(
                self.attribute_orders()
                    .iter()
                    .filter(|(name, _)| name != attribute)
                    .cloned(),
            );
        }
        Some(format_param(&orders))
    }

    /// The whitelist may still be filled from the table's columns
    fn check_default_order(&self) -> OrmResult<()> {
        if self.attributes.is_empty() {
            return Ok(());
        }
        self.check_default_order_whitelisted()
    }

    /// Every default-order attribute is in the whitelist, even when it is empty
    pub(crate) fn check_default_order_whitelisted(&self) -> OrmResult<()> {
        for (name, _) in &self.default_order {
            if !self.has_attribute(name) {
                return Err(ModelError::Configuration(format!(
                    "Default sort order refers to unknown attribute '{}'",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn format_param(orders: &[(String, OrderDirection)]) -> String {
    orders
        .iter()
        .map(|(name, direction)| match direction {
            OrderDirection::Asc => name.clone(),
            OrderDirection::Desc => format!("-{}", name),
        })
        .collect::<Vec<_>>()
        .join(",")
}
