//! Display orderings persisted apart from their collections.

use std::collections::HashSet;

/// Arrange `items` by `order`.
///
/// Ids in `order` with no matching item are dropped. Items missing from `order` follow
/// in their collection order.
pub fn apply_ordering<'a, T, F>(items: &'a [T], order: &[String], id_of: F) -> Vec<&'a T>
where
    F: Fn(&T) -> &str,
{
    let mut placed = HashSet::with_capacity(items.len());
    let mut result = Vec::with_capacity(items.len());

    for id in order {
        if placed.contains(id.as_str()) {
            continue;
        }
        if let Some(item) = items.iter().find(|item| id_of(item) == id) {
            placed.insert(id.as_str());
            result.push(item);
        }
    }

    result.extend(items.iter().filter(|item| !placed.contains(id_of(item))));
    result
}

/// Drop ids that no longer name an item and append the missing ones.
pub fn repair_ordering<T, F>(items: &[T], order: &[String], id_of: F) -> Vec<String>
where
    F: Fn(&T) -> &str,
{
    apply_ordering(items, order, &id_of)
        .into_iter()
        .map(|item| id_of(item).to_string())
        .collect()
}
