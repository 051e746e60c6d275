/// Read-only tier grid for the viewer
///
/// Entries are grouped into the six tiers without sorting; each tier keeps
/// the source order. The result is plain data that any renderer can paint.
use chrono::{DateTime, Local, TimeZone, Utc};
use std::fmt::Display;

use crate::state::data::{CatalogEntry, EntryId, ImagePayload, Rank};

pub const EMPTY_TIER: &str = "[NO DATA IN THIS TIER]";
pub const NO_DESCRIPTION: &str = "[NO DESCRIPTION]";
pub const NEVER_UPDATED: &str = "NEVER";

/// Entries of one tier, in source order
#[derive(Debug, Clone, PartialEq)]
pub struct RankGroup<'a> {
    pub rank: Rank,
    pub entries: Vec<&'a CatalogEntry>,
}

/// Partition entries into the six tiers (S..F). Every entry lands in exactly one group.
pub fn group_by_rank(entries: &[CatalogEntry]) -> Vec<RankGroup<'_>> {
    let mut groups: Vec<RankGroup<'_>> = Rank::ALL
        .iter()
        .map(|&rank| RankGroup {
            rank,
            entries: Vec::new(),
        })
        .collect();

    for entry in entries {
        groups[entry.rank.index()].entries.push(entry);
    }
    groups
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub id: EntryId,
    pub title: String,
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowContent {
    /// Placeholder text shown in place of cards
    Empty(&'static str),
    Cards(Vec<CardView>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankRow {
    pub rank: Rank,
    pub label: String,
    pub content: RowContent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridStats {
    pub total: usize,
    pub last_update: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub rows: Vec<RankRow>,
    pub stats: GridStats,
}

impl GridView {
    /// `last_update` is shown in local time
    pub fn build(entries: &[CatalogEntry], last_update: Option<DateTime<Utc>>) -> Self {
        let last_update = last_update.map(|stamp| stamp.with_timezone(&Local));
        Self::build_with_label(entries, format_last_update(last_update.as_ref()))
    }

    fn build_with_label(entries: &[CatalogEntry], last_update: String) -> Self {
        let rows = group_by_rank(entries)
            .into_iter()
            .map(|group| {
                let content = if group.entries.is_empty() {
                    RowContent::Empty(EMPTY_TIER)
                } else {
                    RowContent::Cards(
                        group
                            .entries
                            .into_iter()
                            .map(|entry| CardView {
                                id: entry.id,
                                title: entry.title.clone(),
                                image: entry.image.clone(),
                            })
                            .collect(),
                    )
                };

                RankRow {
                    rank: group.rank,
                    label: group.rank.to_string(),
                    content,
                }
            })
            .collect();

        Self {
            rows,
            stats: GridStats {
                total: entries.len(),
                last_update,
            },
        }
    }
}

/// `dd.mm.yyyy hh:mm`, or `NEVER` when nothing was saved yet
pub fn format_last_update<Tz>(stamp: Option<&DateTime<Tz>>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match stamp {
        Some(stamp) => stamp.format("%d.%m.%Y %H:%M").to_string(),
        None => NEVER_UPDATED.to_string(),
    }
}

/// The click-through detail panel
#[derive(Debug, Clone, PartialEq)]
pub struct DetailView {
    pub id: EntryId,
    pub title: String,
    pub image: Option<ImagePayload>,
    pub tier_label: String,
    pub description: String,
}

impl DetailView {
    pub fn for_entry(entry: &CatalogEntry) -> Self {
        let description = entry
            .description
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(NO_DESCRIPTION)
            .to_string();

        Self {
            id: entry.id,
            title: entry.title.clone(),
            image: entry.image.clone(),
            tier_label: format!("TIER: {}", entry.rank),
            description,
        }
    }

    /// Detail for `id`, if it is in `entries`
    pub fn find(entries: &[CatalogEntry], id: EntryId) -> Option<Self> {
        entries.iter().find(|entry| entry.id == id).map(Self::for_entry)
    }
}
