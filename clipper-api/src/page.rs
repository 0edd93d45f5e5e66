use std::fmt::Debug;

/// Anything that can be found by id inside a list resource
pub trait Entity: Clone {
    type Id: Copy + Debug + Eq;

    fn id(&self) -> Self::Id;
}

/// One page of a paginated resource
///
/// Non-paginated resources are represented as a single page holding all the items.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Page<T: Clone> {
    pub items: im::Vector<T>,
    pub total: u64,

    /// 1-based page number
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl<T: Clone> Page<T> {
    /// Wrap a complete, non-paginated list into a single page
    pub fn single(items: im::Vector<T>) -> Page<T> {
        let total = items.len() as u64;
        Page {
            limit: items.len() as u32,
            items,
            total,
            page: 1,
            has_more: false,
        }
    }

    /// Cut page number `page` out of an already-sorted complete list
    pub fn slice(all: &[T], page: u32, limit: u32) -> Page<T> {
        let page = page.max(1);
        let start = (page as usize - 1).saturating_mul(limit as usize);
        let items = all
            .iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect::<im::Vector<T>>();
        Page {
            has_more: start + items.len() < all.len(),
            items,
            total: all.len() as u64,
            page,
            limit,
        }
    }
}
