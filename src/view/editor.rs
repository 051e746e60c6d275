use crate::state::data::{CatalogEntry, EntryId, ImagePayload, Rank};

pub const EMPTY_CATALOG: &str = "NO GAMES IN DATABASE";

/// One line of the editor's game list
#[derive(Debug, Clone, PartialEq)]
pub struct EditorRow {
    pub id: EntryId,
    pub title: String,
    pub rank: Rank,
    pub rank_label: String,
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorListView {
    Empty(&'static str),
    Rows(Vec<EditorRow>),
}

impl EditorListView {
    /// Rows in the given order; callers pass `CatalogRepository::list_for_editing`
    pub fn build(entries: Vec<CatalogEntry>) -> Self {
        if entries.is_empty() {
            return EditorListView::Empty(EMPTY_CATALOG);
        }

        EditorListView::Rows(
            entries
                .into_iter()
                .map(|entry| EditorRow {
                    id: entry.id,
                    rank_label: format!("Tier: {}", entry.rank),
                    title: entry.title,
                    rank: entry.rank,
                    image: entry.image,
                })
                .collect(),
        )
    }
}
