/// The catalog repository: create/update/delete/list over the Library.
///
/// There is no in-memory cache. Every read goes to the store and every
/// mutation is written through before the call returns.
use chrono::Utc;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use thiserror::Error;

use super::data::{CatalogEntry, EntryId, ImagePayload, Rank};
use super::library::{KeyValueStore, Library, StorageError};

/// Title given to imported entries that arrive without one
pub const UNTITLED: &str = "Untitled";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter game title")]
    MissingTitle,
    #[error("Please upload and crop an image")]
    MissingImage,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Invalid tier-data format: {0}")]
    Import(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Issues millisecond-timestamp ids that never repeat within a session
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh id from the wall clock, skipping any id in `taken`
    pub fn next(&mut self, taken: &HashSet<EntryId>) -> EntryId {
        self.next_at(Utc::now().timestamp_millis(), taken)
    }

    /// Same as `next`, with the current time supplied by the caller
    pub fn next_at(&mut self, now_millis: i64, taken: &HashSet<EntryId>) -> EntryId {
        let mut candidate = now_millis.max(self.last + 1);
        while taken.contains(&EntryId(candidate)) {
            candidate += 1;
        }
        self.last = candidate;
        EntryId(candidate)
    }
}

/// Fields the editor collects for a new entry
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: String,
    pub rank: Option<Rank>,
    pub image: Option<ImagePayload>,
    pub description: Option<String>,
}

/// Turn one element of an imported `games` array into a catalog entry.
///
/// Default rules:
/// - missing, zero or non-numeric `id` → fresh id from `ids`
/// - missing or unknown `tier` → `Rank::TOP`
/// - missing or empty `title` → `"Untitled"`
/// - `image` is passed through as-is, and may stay absent
/// - `description` is kept when it is a string
pub fn sanitize_entry(raw: &Value, ids: &mut IdGenerator, taken: &HashSet<EntryId>) -> CatalogEntry {
    let id = read_id(raw.get("id")).unwrap_or_else(|| ids.next(taken));

    let title = raw
        .get("title")
        .and_then(Value::as_str)
        .filter(|title| !title.is_empty())
        .unwrap_or(UNTITLED)
        .to_string();

    let rank = raw
        .get("tier")
        .and_then(Value::as_str)
        .and_then(|tier| tier.parse::<Rank>().ok())
        .unwrap_or(Rank::TOP);

    let image = raw
        .get("image")
        .and_then(Value::as_str)
        .map(|image| ImagePayload::from_raw(image.to_string()));

    let description = raw
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    CatalogEntry {
        id,
        title,
        rank,
        image,
        description,
    }
}

/// Ids that import can keep: non-zero integers, or strings holding one
fn read_id(value: Option<&Value>) -> Option<EntryId> {
    let id = match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (id != 0).then_some(EntryId(id))
}

/// Sanitize a whole `games` array. Ids already present in the document are
/// reserved first so that synthesized ids never collide with them. The first
/// entry carrying an id keeps it; later repeats get a fresh one.
pub fn sanitize_games(games: &[Value], ids: &mut IdGenerator) -> Vec<CatalogEntry> {
    let mut taken: HashSet<EntryId> = games
        .iter()
        .filter_map(|game| read_id(game.get("id")))
        .collect();
    let mut kept = HashSet::with_capacity(games.len());

    let mut entries = Vec::with_capacity(games.len());
    for game in games {
        let mut entry = sanitize_entry(game, ids, &taken);
        if !kept.insert(entry.id) {
            let fresh = ids.next(&taken);
            tracing::debug!("Duplicate id {} in import, reassigned to {}", entry.id, fresh);
            entry.id = fresh;
            kept.insert(fresh);
        }
        taken.insert(entry.id);
        entries.push(entry);
    }
    entries
}

/// Extract the `games` array from a snapshot/import document
pub fn games_array(document: &Value) -> Option<&Vec<Value>> {
    document.get("games").and_then(Value::as_array)
}

/// Editing order: tier first (S..F), then title.
/// Titles compare case-insensitively, with the raw string as tiebreak.
pub fn editing_order(a: &CatalogEntry, b: &CatalogEntry) -> Ordering {
    a.rank
        .cmp(&b.rank)
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
        .then_with(|| a.title.cmp(&b.title))
}

/// Owns the canonical catalog operations, writing through to the Library
#[derive(Debug)]
pub struct CatalogRepository<S> {
    library: Library<S>,
    ids: IdGenerator,
}

impl<S: KeyValueStore> CatalogRepository<S> {
    pub fn new(library: Library<S>) -> Self {
        Self {
            library,
            ids: IdGenerator::new(),
        }
    }

    pub fn library(&self) -> &Library<S> {
        &self.library
    }

    /// Current persisted catalog in stored order
    pub fn list(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        Ok(self.library.read_catalog()?.unwrap_or_default())
    }

    /// Catalog sorted for the editor list
    pub fn list_for_editing(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let mut entries = self.list()?;
        entries.sort_by(editing_order);
        Ok(entries)
    }

    /// Validate and append a new entry. Nothing is written on validation failure.
    pub fn add(&mut self, new: NewEntry) -> Result<CatalogEntry, CatalogError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingTitle.into());
        }
        let Some(image) = new.image else {
            return Err(ValidationError::MissingImage.into());
        };

        let mut entries = self.list()?;
        let taken: HashSet<EntryId> = entries.iter().map(|entry| entry.id).collect();

        let entry = CatalogEntry {
            id: self.ids.next(&taken),
            title: title.to_string(),
            rank: new.rank.unwrap_or(Rank::TOP),
            image: Some(image),
            description: new
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        };

        entries.push(entry.clone());
        self.library.write_catalog(&entries)?;

        tracing::info!("➕ Added '{}' to tier {} (id {})", entry.title, entry.rank, entry.id);
        Ok(entry)
    }

    /// Delete by id. An unknown id is a no-op and writes nothing.
    pub fn remove(&mut self, id: EntryId) -> Result<bool, CatalogError> {
        let entries = self.list()?;
        let before = entries.len();
        let remaining: Vec<CatalogEntry> = entries.into_iter().filter(|e| e.id != id).collect();

        if remaining.len() == before {
            tracing::debug!("Remove ignored, no entry with id {}", id);
            return Ok(false);
        }

        self.library.write_catalog(&remaining)?;
        tracing::info!("🗑️  Removed entry {}", id);
        Ok(true)
    }

    /// Move an entry to another tier. Returns `false` without writing if the id is unknown.
    pub fn set_rank(&mut self, id: EntryId, rank: Rank) -> Result<bool, CatalogError> {
        let mut entries = self.list()?;
        let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
            tracing::debug!("Tier change ignored, no entry with id {}", id);
            return Ok(false);
        };

        entry.rank = rank;
        self.library.write_catalog(&entries)?;
        tracing::info!("🔀 Entry {} moved to tier {}", id, rank);
        Ok(true)
    }

    /// Replace the whole catalog from an import document (`{ "games": [...] }`).
    /// Returns the number of imported entries.
    pub fn replace_all(&mut self, document: &str) -> Result<usize, CatalogError> {
        let document: Value = serde_json::from_str(document)
            .map_err(|e| CatalogError::Import(format!("not valid JSON ({})", e)))?;

        let games = games_array(&document)
            .ok_or_else(|| CatalogError::Import("expected an object with a \"games\" array".to_string()))?;

        let entries = sanitize_games(games, &mut self.ids);
        self.replace_entries(entries)
    }

    /// Replace the catalog with entries read back from an exported tier pack
    pub fn import_archive(&mut self, bytes: &[u8]) -> Result<usize, CatalogError> {
        let entries = crate::archive::read_archive(bytes).map_err(|e| CatalogError::Import(e.to_string()))?;
        self.replace_entries(entries)
    }

    fn replace_entries(&mut self, entries: Vec<CatalogEntry>) -> Result<usize, CatalogError> {
        self.library.write_catalog(&entries)?;
        tracing::info!("📥 Imported {} entries", entries.len());
        Ok(entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::library::{SqliteStore, CATALOG_KEY};
    use serde_json::json;

    fn repository() -> CatalogRepository<SqliteStore> {
        CatalogRepository::new(Library::new(SqliteStore::open_in_memory().unwrap()))
    }

    fn image() -> ImagePayload {
        ImagePayload::from_bytes("image/jpeg", b"\xFF\xD8thumb")
    }

    fn entry(id: i64, title: &str, rank: Rank) -> CatalogEntry {
        CatalogEntry {
            id: EntryId(id),
            title: title.to_string(),
            rank,
            image: Some(image()),
            description: None,
        }
    }

    fn raw_store_value(repo: &CatalogRepository<SqliteStore>) -> Option<String> {
        repo.library().store().get(CATALOG_KEY).unwrap()
    }

    #[test]
    fn test_id_generator_is_strictly_increasing() {
        let mut ids = IdGenerator::new();
        let taken = HashSet::new();
        let a = ids.next_at(1000, &taken);
        let b = ids.next_at(1000, &taken);
        let c = ids.next_at(900, &taken);
        assert_eq!(a, EntryId(1000));
        assert_eq!(b, EntryId(1001));
        assert_eq!(c, EntryId(1002));
    }

    #[test]
    fn test_id_generator_skips_taken_ids() {
        let mut ids = IdGenerator::new();
        let taken: HashSet<EntryId> = [EntryId(5), EntryId(6)].into_iter().collect();
        assert_eq!(ids.next_at(5, &taken), EntryId(7));
    }

    #[test]
    fn test_list_of_fresh_store_is_empty() {
        assert!(repository().list().unwrap().is_empty());
    }

    #[test]
    fn test_add_assigns_id_and_writes_through() {
        let mut repo = repository();
        let created = repo
            .add(NewEntry {
                title: "  Half-Life  ".to_string(),
                rank: Some(Rank::A),
                image: Some(image()),
                description: None,
            })
            .unwrap();

        assert_eq!(created.title, "Half-Life");
        assert_eq!(created.rank, Rank::A);
        assert!(created.id.0 > 0);
        assert_eq!(repo.list().unwrap(), vec![created]);
        assert!(repo.library().read_last_update().unwrap().is_some());
    }

    #[test]
    fn test_add_twice_gives_distinct_ids() {
        let mut repo = repository();
        let new = || NewEntry {
            title: "Doom".to_string(),
            image: Some(image()),
            ..NewEntry::default()
        };
        let a = repo.add(new()).unwrap();
        let b = repo.add(new()).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.rank, Rank::S);
        assert_eq!(repo.list().unwrap().len(), 2);
    }

    #[test]
    fn test_add_rejects_empty_title_without_writing() {
        let mut repo = repository();
        repo.add(NewEntry {
            title: "Keep".to_string(),
            image: Some(image()),
            ..NewEntry::default()
        })
        .unwrap();
        let before = raw_store_value(&repo);

        let err = repo
            .add(NewEntry {
                title: "   ".to_string(),
                image: Some(image()),
                ..NewEntry::default()
            })
            .unwrap_err();

        assert!(matches!(err, CatalogError::Validation(ValidationError::MissingTitle)));
        assert_eq!(raw_store_value(&repo), before);
    }

    #[test]
    fn test_add_rejects_missing_image_without_writing() {
        let mut repo = repository();

        let err = repo
            .add(NewEntry {
                title: "No Picture".to_string(),
                ..NewEntry::default()
            })
            .unwrap_err();

        assert!(matches!(err, CatalogError::Validation(ValidationError::MissingImage)));
        assert_eq!(raw_store_value(&repo), None);
    }

    #[test]
    fn test_remove_unknown_id_leaves_catalog_unchanged() {
        let mut repo = repository();
        repo.library().write_catalog(&[entry(1, "Foo", Rank::S)]).unwrap();
        let before = raw_store_value(&repo);

        let removed = repo.remove(EntryId(2)).unwrap();

        assert!(!removed);
        assert_eq!(raw_store_value(&repo), before);
        assert_eq!(repo.list().unwrap(), vec![entry(1, "Foo", Rank::S)]);
    }

    #[test]
    fn test_remove_filters_by_id() {
        let mut repo = repository();
        repo.library()
            .write_catalog(&[entry(1, "Foo", Rank::S), entry(2, "Bar", Rank::B)])
            .unwrap();

        assert!(repo.remove(EntryId(1)).unwrap());
        assert_eq!(repo.list().unwrap(), vec![entry(2, "Bar", Rank::B)]);
    }

    #[test]
    fn test_set_rank_updates_existing_entry() {
        let mut repo = repository();
        repo.library().write_catalog(&[entry(1, "Foo", Rank::S)]).unwrap();

        assert!(repo.set_rank(EntryId(1), Rank::D).unwrap());
        assert_eq!(repo.list().unwrap()[0].rank, Rank::D);
    }

    #[test]
    fn test_set_rank_unknown_id_does_not_write() {
        let mut repo = repository();
        assert!(!repo.set_rank(EntryId(42), Rank::C).unwrap());
        assert_eq!(raw_store_value(&repo), None);
    }

    #[test]
    fn test_list_for_editing_sorts_by_tier_then_title() {
        let mut repo = repository();
        repo.library()
            .write_catalog(&[
                entry(1, "zelda", Rank::B),
                entry(2, "Celeste", Rank::S),
                entry(3, "apex", Rank::B),
                entry(4, "Braid", Rank::S),
                entry(5, "Anthem", Rank::F),
            ])
            .unwrap();

        let titles: Vec<String> = repo
            .list_for_editing()
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();

        assert_eq!(titles, vec!["Braid", "Celeste", "apex", "zelda", "Anthem"]);
        // stored order is untouched
        assert_eq!(repo.list().unwrap()[0].title, "zelda");
    }

    #[test]
    fn test_import_defaults_invalid_tier_and_missing_id() {
        let mut repo = repository();

        let count = repo
            .replace_all(r#"{"games":[{"title":"Bar","tier":"Z"}]}"#)
            .unwrap();

        let entries = repo.list().unwrap();
        assert_eq!(count, 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Bar");
        assert_eq!(entries[0].rank, Rank::S);
        assert!(entries[0].id.0 > 0);
        assert!(entries[0].image.is_none());
    }

    #[test]
    fn test_import_preserves_ids_and_replaces_catalog() {
        let mut repo = repository();
        repo.library().write_catalog(&[entry(99, "Old", Rank::A)]).unwrap();

        let document = json!({
            "games": [
                { "id": 7, "title": "Seven", "tier": "C", "image": "data:image/webp;base64,AAAA" },
                { "id": 8, "tier": "F", "description": "eight" },
                { "title": "", "tier": 3 }
            ]
        });
        repo.replace_all(&document.to_string()).unwrap();

        let entries = repo.list().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, EntryId(7));
        assert_eq!(entries[0].rank, Rank::C);
        assert_eq!(
            entries[0].image.as_ref().map(ImagePayload::as_str),
            Some("data:image/webp;base64,AAAA")
        );
        assert_eq!(entries[1].id, EntryId(8));
        assert_eq!(entries[1].title, UNTITLED);
        assert_eq!(entries[1].description.as_deref(), Some("eight"));
        assert_eq!(entries[2].title, UNTITLED);
        assert_eq!(entries[2].rank, Rank::S);
        assert!(entries.iter().all(|e| e.id != EntryId(99)));
    }

    #[test]
    fn test_import_rejects_wrong_shape_without_writing() {
        let mut repo = repository();
        repo.library().write_catalog(&[entry(1, "Foo", Rank::S)]).unwrap();
        let before = raw_store_value(&repo);

        for doc in ["not json", "[]", r#"{"games": {}}"#, r#"{"items": []}"#] {
            let err = repo.replace_all(doc).unwrap_err();
            assert!(matches!(err, CatalogError::Import(_)), "{doc}");
        }
        assert_eq!(raw_store_value(&repo), before);
    }

    #[test]
    fn test_sanitize_reads_numeric_and_string_ids() {
        let mut ids = IdGenerator::new();
        let taken = HashSet::new();

        let from_float = sanitize_entry(&json!({ "id": 12.0 }), &mut ids, &taken);
        let from_string = sanitize_entry(&json!({ "id": "34" }), &mut ids, &taken);
        let zero = sanitize_entry(&json!({ "id": 0 }), &mut ids, &taken);

        assert_eq!(from_float.id, EntryId(12));
        assert_eq!(from_string.id, EntryId(34));
        assert_ne!(zero.id, EntryId(0));
    }

    #[test]
    fn test_synthesized_ids_avoid_ids_in_document() {
        let mut ids = IdGenerator::new();
        let now = Utc::now().timestamp_millis();
        let games = vec![json!({ "title": "fresh" }), json!({ "id": now + 1 }), json!({ "id": now })];

        let entries = sanitize_games(&games, &mut ids);
        let unique: HashSet<EntryId> = entries.iter().map(|e| e.id).collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_repeated_id_in_document_gets_fresh_id() {
        let mut ids = IdGenerator::new();
        let games = vec![
            json!({ "id": 7, "title": "First" }),
            json!({ "id": 7, "title": "Second" }),
            json!({ "id": 8, "title": "Third" }),
        ];

        let entries = sanitize_games(&games, &mut ids);

        assert_eq!(entries[0].id, EntryId(7));
        assert_eq!(entries[2].id, EntryId(8));
        assert_ne!(entries[1].id, EntryId(7));
        assert_ne!(entries[1].id, EntryId(8));
        assert_eq!(entries[1].title, "Second");
    }

    #[test]
    fn test_import_with_repeated_id_keeps_entries_separately_removable() {
        let mut repo = repository();
        let document = json!({
            "games": [
                { "id": 7, "title": "Foo", "tier": "S", "image": "data:image/jpeg;base64,AAAA" },
                { "id": 7, "title": "Bar", "tier": "A", "image": "data:image/jpeg;base64,AAAA" }
            ]
        });
        repo.replace_all(&document.to_string()).unwrap();

        let entries = repo.list().unwrap();
        let unique: HashSet<EntryId> = entries.iter().map(|e| e.id).collect();
        assert_eq!(unique.len(), 2);

        assert!(repo.remove(EntryId(7)).unwrap());
        let remaining = repo.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "Bar");
    }
}
