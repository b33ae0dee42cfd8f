use serde::{Deserialize, Serialize};

/// One page of query results plus the offsets the caller needs to render
/// pagination controls. Built from rows that carry a `COUNT(*) OVER()`
/// window column, so listing and counting stay a single query.
#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub next_offset: i64,
    pub prev_offset: i64,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        if rows.is_empty() {
            return Self::no_rows();
        }
        let last_offset = total_rows - (total_rows % page_size);
        let next_offset = (current_offset + page_size).min(last_offset);
        let prev_offset = (current_offset - page_size).max(0);

        Self {
            rows,
            total_rows,
            next_offset,
            prev_offset,
            message: Some(format!(
                "{} - {} / {}",
                current_offset,
                (current_offset + page_size).min(total_rows),
                total_rows
            )),
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            next_offset: 0,
            prev_offset: 0,
            message: Some(String::from("No results")),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageContext<U> {
        PageContext {
            rows: self.rows.into_iter().map(f).collect(),
            total_rows: self.total_rows,
            next_offset: self.next_offset,
            prev_offset: self.prev_offset,
            message: self.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page() {
        let page = PageContext::<i32>::from_rows(vec![], 0, 6, 0);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.next_offset, 0);
    }

    #[test]
    fn offsets_advance_and_clamp() {
        // 14 rows, page size 6: offsets 0, 6, 12
        let page = PageContext::from_rows(vec![1, 2, 3, 4, 5, 6], 14, 6, 0);
        assert_eq!(page.next_offset, 6);
        assert_eq!(page.prev_offset, 0);

        let page = PageContext::from_rows(vec![1, 2], 14, 6, 12);
        assert_eq!(page.next_offset, 12);
        assert_eq!(page.prev_offset, 6);
    }

    #[test]
    fn map_preserves_counts() {
        let page = PageContext::from_rows(vec![1, 2, 3], 3, 6, 0).map(|n| n * 2);
        assert_eq!(page.rows, vec![2, 4, 6]);
        assert_eq!(page.total_rows, 3);
    }
}
