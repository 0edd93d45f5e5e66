use crate::api::{Entity, Page, QueueItem};

/// Replaces the item with id `id` in `page` by `transform(item)`
///
/// Returns `None` if the page does not hold such an item.
pub fn patch_page<T, F>(page: &Page<T>, id: T::Id, transform: F) -> Option<Page<T>>
where
    T: Entity,
    F: FnOnce(&T) -> T,
{
    let i = page.items.iter().position(|t| t.id() == id)?;
    let patched = transform(&page.items[i]);
    Some(Page {
        items: page.items.update(i, patched),
        ..page.clone()
    })
}

/// Applies `patch_page` to every page, leaving the pages without a match untouched
pub fn patch_pages<T, F>(pages: &[Page<T>], id: T::Id, mut transform: F) -> Vec<Page<T>>
where
    T: Entity,
    F: FnMut(&T) -> T,
{
    pages
        .iter()
        .map(|p| patch_page(p, id, &mut transform).unwrap_or_else(|| p.clone()))
        .collect()
}

/// Drops the item with id `id` from `page`, decrementing its total
///
/// Returns `None` if the page does not hold such an item.
pub fn remove_from_page<T: Entity>(page: &Page<T>, id: T::Id) -> Option<Page<T>> {
    let i = page.items.iter().position(|t| t.id() == id)?;
    let mut items = page.items.clone();
    items.remove(i);
    Some(Page {
        items,
        total: page.total.saturating_sub(1),
        ..page.clone()
    })
}

/// Items with a 1-based position in some global ordering
pub trait Positioned {
    fn position(&mut self) -> &mut u32;
}

impl Positioned for QueueItem {
    fn position(&mut self) -> &mut u32 {
        &mut self.position
    }
}

fn first_position<T: Clone>(page: &Page<T>) -> u32 {
    page.page.max(1).saturating_sub(1).saturating_mul(page.limit) + 1
}

/// Gives the items of `page` consecutive positions, in their current order
///
/// The first item of page `n` is at position `(n - 1) * limit + 1`.
pub fn renumber<T: Entity + Positioned>(page: &Page<T>) -> Page<T> {
    let first = first_position(page);
    let items = page
        .items
        .iter()
        .zip(first..)
        .map(|(t, pos)| {
            let mut t = t.clone();
            *t.position() = pos;
            t
        })
        .collect();
    Page {
        items,
        ..page.clone()
    }
}

/// Moves the item with id `id` to the 1-based list `position`, then renumbers `page`
///
/// `position` is at least 1. Past the end of the last page it is clamped to the last
/// position; on any other page, a position outside of the page drops the item from it.
/// Returns `None` if the page does not hold such an item.
pub fn move_to_position<T: Entity + Positioned>(
    page: &Page<T>,
    id: T::Id,
    position: u32,
) -> Option<Page<T>> {
    let from = page.items.iter().position(|t| t.id() == id)?;
    let first = first_position(page);
    let last = first + page.items.len() as u32 - 1;
    let position = position.max(1);
    let mut items = page.items.clone();
    let item = items.remove(from);
    if position >= first && (position <= last || !page.has_more) {
        items.insert((position.min(last) - first) as usize, item);
    }
    Some(renumber(&Page {
        items,
        ..page.clone()
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::{ClipId, QueueItemId, Uuid};

    pub fn item(id: u128, position: u32) -> QueueItem {
        QueueItem {
            id: QueueItemId(Uuid::from_u128(id)),
            clip_id: ClipId(Uuid::from_u128(1000 + id)),
            position,
            added_at: chrono::DateTime::<chrono::Utc>::MIN_UTC,
            played_at: None,
        }
    }

    pub fn qid(id: u128) -> QueueItemId {
        QueueItemId(Uuid::from_u128(id))
    }

    fn queue(ids: &[u128]) -> Page<QueueItem> {
        Page::single(
            ids.iter()
                .enumerate()
                .map(|(i, id)| item(*id, i as u32 + 1))
                .collect(),
        )
    }

    fn ids(page: &Page<QueueItem>) -> Vec<(u128, u32)> {
        page.items
            .iter()
            .map(|i| (i.id.0.as_u128(), i.position))
            .collect()
    }

    #[test]
    fn patches_matching_page_only() {
        let pages = vec![
            Page::slice(&[item(1, 1), item(2, 2)], 1, 2),
            Page::slice(&[item(3, 3)], 1, 2),
        ];
        let patched = patch_pages(&pages, qid(3), |i| QueueItem {
            position: 42,
            ..i.clone()
        });
        assert_eq!(patched[0], pages[0]);
        assert_eq!(patched[1].items[0].position, 42);
        assert_eq!(patch_page(&pages[0], qid(3), |i| i.clone()), None);
    }

    #[test]
    fn removing_renumbers_and_floors_total() {
        let page = queue(&[1, 2, 3]);
        let removed = renumber(&remove_from_page(&page, qid(2)).unwrap());
        assert_eq!(ids(&removed), vec![(1, 1), (3, 2)]);
        assert_eq!(removed.total, 2);

        let mut empty_total = queue(&[1]);
        empty_total.total = 0;
        assert_eq!(remove_from_page(&empty_total, qid(1)).unwrap().total, 0);
        assert_eq!(remove_from_page(&page, qid(9)), None);
    }

    #[test]
    fn renumbering_later_pages() {
        let page = Page::slice(&[item(1, 1), item(2, 2), item(3, 3)], 2, 2);
        assert_eq!(ids(&renumber(&page)), vec![(3, 3)]);
    }

    #[test]
    fn moving_clamps_position() {
        let page = queue(&[1, 2, 3]);
        assert_eq!(
            ids(&move_to_position(&page, qid(1), 3).unwrap()),
            vec![(2, 1), (3, 2), (1, 3)]
        );
        assert_eq!(
            ids(&move_to_position(&page, qid(3), 0).unwrap()),
            vec![(3, 1), (1, 2), (2, 3)]
        );
        assert_eq!(
            ids(&move_to_position(&page, qid(2), 99).unwrap()),
            vec![(1, 1), (3, 2), (2, 3)]
        );
        assert_eq!(move_to_position(&page, qid(4), 1), None);
    }

    #[test]
    fn moving_past_a_truncated_page_drops_the_item() {
        let page = Page::slice(&[item(1, 1), item(2, 2), item(3, 3)], 1, 2);
        assert_eq!(ids(&move_to_position(&page, qid(1), 3).unwrap()), vec![(2, 1)]);
        assert_eq!(
            ids(&move_to_position(&page, qid(1), 2).unwrap()),
            vec![(2, 1), (1, 2)]
        );

        let second = Page::slice(&[item(1, 1), item(2, 2), item(3, 3)], 2, 2);
        assert_eq!(ids(&move_to_position(&second, qid(3), 1).unwrap()), vec![]);
        assert_eq!(ids(&move_to_position(&second, qid(3), 9).unwrap()), vec![(3, 3)]);
    }
}
