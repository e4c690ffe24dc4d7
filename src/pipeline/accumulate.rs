//! Ordered collection of page results and the joined document text.

use crate::config::PageSeparator;
use crate::output::{DocumentText, PageResult};

/// Holds page results in strict index order.
///
/// `append` only accepts the page whose index equals the current length, so
/// the held results are always the gap-free prefix `0..len()`.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    pages: Vec<PageResult>,
    separator: PageSeparator,
}

impl ResultAccumulator {
    pub fn new(separator: PageSeparator) -> Self {
        Self {
            pages: Vec::new(),
            separator,
        }
    }

    pub fn with_capacity(separator: PageSeparator, capacity: usize) -> Self {
        Self {
            pages: Vec::with_capacity(capacity),
            separator,
        }
    }

    /// Append the next page.
    ///
    /// # Panics
    /// If `result.page_index` is not the next expected index.
    pub fn append(&mut self, result: PageResult) {
        assert_eq!(
            result.page_index,
            self.pages.len(),
            "page results must be appended in index order"
        );
        self.pages.push(result);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[PageResult] {
        &self.pages
    }

    /// Join every section held so far. Callable mid-run for partial output.
    pub fn render(&self) -> String {
        self.pages
            .iter()
            .map(|page| match self.separator.heading(page.page_num()) {
                Some(heading) => format!("\n{heading}\n{}", page.text),
                None => page.text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn into_document(self) -> DocumentText {
        DocumentText {
            text: self.render(),
            pages: self.pages,
        }
    }
}
