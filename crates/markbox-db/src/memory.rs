//! In-process repositories for handler tests.
//!
//! `MemoryStore` implements every repository trait over a single mutex-guarded
//! state, applying the same owner scoping and tag rules as the PostgreSQL
//! repositories. Bookmark saves validate everything before mutating, so a
//! failed save leaves the store unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use markbox_core::{
    dedupe_ids, normalize_tag_name, validate_tag_name, Bookmark, BookmarkOrder,
    BookmarkRepository, BookmarkStatusPatch, Category, CategoryOrder, CategoryRelation,
    CategoryRepository, CreateCategoryRequest, Error, FileRepository,
    ListBookmarksRequest, ListCategoriesRequest, NewFile, Result, SaveBookmarkRequest,
    SortDirection, StoredFile, Tag, TagInput, TagRef, TagRepository, UpdateCategoryRequest,
    User, UserRepository, UserSettings, UserSettingsPatch, UserSummary,
};

use crate::file_storage::{compute_content_hash, sniff_content_type};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    tags: BTreeMap<i64, Tag>,
    bookmarks: BTreeMap<i64, Bookmark>,
    links: BTreeSet<(i64, i64)>,
    files: BTreeMap<i64, (StoredFile, Vec<u8>)>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn tag_id_by_name(&self, owner_id: i64, name: &str) -> Option<i64> {
        self.tags
            .values()
            .find(|t| t.owner_id == owner_id && t.name == name)
            .map(|t| t.id)
    }

    /// Resolve descriptors without writing; returns ids and the names to create.
    fn plan_tags(&self, owner_id: i64, inputs: &[TagInput]) -> Result<Vec<TagSlot>> {
        let mut slots = Vec::with_capacity(inputs.len());
        for input in inputs {
            match input {
                TagInput::Name(raw) => {
                    let Some(name) = normalize_tag_name(raw) else {
                        continue;
                    };
                    validate_tag_name(name).map_err(Error::InvalidInput)?;
                    slots.push(match self.tag_id_by_name(owner_id, name) {
                        Some(id) => TagSlot::Existing(id),
                        None => TagSlot::New(name.to_string()),
                    });
                }
                TagInput::Id(id) => match self.tags.get(id) {
                    Some(tag) if tag.owner_id == owner_id => slots.push(TagSlot::Existing(*id)),
                    _ => return Err(Error::InvalidInput(format!("Unknown tag: {}", id))),
                },
            }
        }
        Ok(slots)
    }

    fn apply_tags(&mut self, owner_id: i64, slots: Vec<TagSlot>) -> Vec<i64> {
        let ids = slots
            .into_iter()
            .map(|slot| match slot {
                TagSlot::Existing(id) => id,
                TagSlot::New(name) => match self.tag_id_by_name(owner_id, &name) {
                    Some(id) => id,
                    None => {
                        let id = self.next_id();
                        let now = Utc::now();
                        self.tags.insert(
                            id,
                            Tag {
                                id,
                                name,
                                owner_id,
                                created: now,
                                updated: now,
                                bookmark_count: 0,
                            },
                        );
                        id
                    }
                },
            })
            .collect();
        dedupe_ids(ids)
    }

    fn check_category(&self, owner_id: i64, category_id: Option<i64>) -> Result<()> {
        match category_id {
            Some(id) if !self.owns_category(owner_id, id) => {
                Err(Error::InvalidInput(format!("Unknown category: {}", id)))
            }
            _ => Ok(()),
        }
    }

    fn check_parent(
        &self,
        owner_id: i64,
        category_id: Option<i64>,
        parent_id: Option<i64>,
    ) -> Result<()> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if Some(parent_id) == category_id {
            return Err(Error::InvalidInput(
                "Category cannot be its own parent".to_string(),
            ));
        }
        if !self.owns_category(owner_id, parent_id) {
            return Err(Error::InvalidInput(format!(
                "Unknown parent category: {}",
                parent_id
            )));
        }
        let Some(category_id) = category_id else {
            return Ok(());
        };

        let mut seen = BTreeSet::new();
        let mut cursor = Some(parent_id);
        while let Some(id) = cursor {
            if id == category_id {
                return Err(Error::InvalidInput(format!(
                    "Category {} cannot be moved under its descendant {}",
                    category_id, parent_id
                )));
            }
            if !seen.insert(id) {
                break;
            }
            cursor = self.categories.get(&id).and_then(|c| c.parent_id);
        }
        Ok(())
    }

    fn owns_category(&self, owner_id: i64, id: i64) -> bool {
        self.categories
            .get(&id)
            .is_some_and(|c| c.owner_id == owner_id)
    }

    fn store_file(&mut self, owner_id: i64, file: &NewFile) -> StoredFile {
        let id = self.next_id();
        let stored = StoredFile {
            id,
            owner_id,
            file_name: file.file_name.clone(),
            content_type: sniff_content_type(&file.data),
            size_bytes: file.data.len() as i64,
            content_hash: compute_content_hash(&file.data),
            storage_path: format!("memory/{}", id),
            created: Utc::now(),
        };
        self.files.insert(id, (stored.clone(), file.data.clone()));
        stored
    }

    fn expand_category(&self, category: &Category, relations: &[CategoryRelation]) -> Category {
        let mut category = category.clone();
        if relations.contains(&CategoryRelation::Owner) {
            category.owner = self.users.get(&category.owner_id).map(|u| UserSummary {
                id: u.id,
                username: u.username.clone(),
            });
        }
        if relations.contains(&CategoryRelation::Parent) {
            category.parent = category
                .parent_id
                .and_then(|id| self.categories.get(&id))
                .filter(|p| p.owner_id == category.owner_id)
                .map(Category::summary);
        }
        category
    }

    fn view_bookmark(&self, bookmark: &Bookmark) -> Bookmark {
        let mut bookmark = bookmark.clone();
        let mut tags: Vec<TagRef> = self
            .links
            .iter()
            .filter(|(b, _)| *b == bookmark.id)
            .filter_map(|(_, t)| self.tags.get(t))
            .map(|t| TagRef {
                id: t.id,
                name: t.name.clone(),
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        bookmark.tags = tags;
        bookmark
    }

    fn owned_bookmark_mut(&mut self, id: i64, owner_id: i64) -> Option<&mut Bookmark> {
        self.bookmarks
            .get_mut(&id)
            .filter(|b| b.owner_id == owner_id)
    }
}

enum TagSlot {
    Existing(i64),
    New(String),
}

/// In-memory implementation of every repository trait.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }

    /// Insert a user with an explicit id.
    pub fn insert_user(&self, id: i64, username: &str) -> Result<User> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let user = User {
            id,
            username: username.to_string(),
            email: None,
            name: None,
            settings: UserSettings::default(),
            created: now,
            updated: now,
        };
        inner.users.insert(id, user.clone());
        inner.next_id = inner.next_id.max(id);
        Ok(user)
    }

    /// Total rows across owned tables, for asserting that nothing was written.
    pub fn row_count(&self) -> Result<usize> {
        let inner = self.lock()?;
        Ok(inner.categories.len()
            + inner.tags.len()
            + inner.bookmarks.len()
            + inner.links.len()
            + inner.files.len())
    }
}

fn sort_by_direction<T, K: Ord>(
    items: &mut [T],
    direction: SortDirection,
    key: impl Fn(&T) -> K,
) {
    match direction {
        SortDirection::Asc => items.sort_by_key(|item| key(item)),
        SortDirection::Desc => items.sort_by_key(|item| std::cmp::Reverse(key(item))),
    }
}

fn paginate<T>(items: Vec<T>, limit: Option<i64>, offset: Option<i64>) -> Vec<T> {
    let skip = offset.unwrap_or(0).max(0) as usize;
    let iter = items.into_iter().skip(skip);
    match limit {
        Some(limit) => iter.take(limit.max(0) as usize).collect(),
        None => iter.collect(),
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn ensure(&self, id: i64, username: &str, email: Option<&str>) -> Result<()> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let user = inner.users.entry(id).or_insert_with(|| User {
            id,
            username: username.to_string(),
            email: None,
            name: None,
            settings: UserSettings::default(),
            created: now,
            updated: now,
        });
        user.username = username.to_string();
        user.email = email.map(str::to_string);
        inner.next_id = inner.next_id.max(id);
        Ok(())
    }

    async fn update_settings(&self, id: i64, patch: UserSettingsPatch) -> Result<User> {
        let mut inner = self.lock()?;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("User {}", id)))?;
        if let Some(theme) = patch.theme {
            user.settings.theme = Some(theme);
        }
        user.updated = Utc::now();
        Ok(user.clone())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn get(
        &self,
        id: i64,
        owner_id: i64,
        relations: &[CategoryRelation],
    ) -> Result<Option<Category>> {
        let inner = self.lock()?;
        Ok(inner
            .categories
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .map(|c| inner.expand_category(c, relations)))
    }

    async fn list(
        &self,
        owner_id: i64,
        req: &ListCategoriesRequest,
        relations: &[CategoryRelation],
    ) -> Result<Vec<Category>> {
        let inner = self.lock()?;
        let mut rows: Vec<Category> = inner
            .categories
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();

        if let Some(order) = req.order_by {
            let direction = req.order_direction.unwrap_or_default();
            match order {
                CategoryOrder::Created => {
                    sort_by_direction(&mut rows, direction, |c| (c.created, c.id))
                }
                CategoryOrder::Name => {
                    sort_by_direction(&mut rows, direction, |c| (c.name.clone(), c.id))
                }
                CategoryOrder::Slug => {
                    sort_by_direction(&mut rows, direction, |c| (c.slug.clone(), c.id))
                }
            }
        }

        Ok(paginate(rows, req.limit, req.offset()?)
            .iter()
            .map(|c| inner.expand_category(c, relations))
            .collect())
    }

    async fn create(&self, req: CreateCategoryRequest) -> Result<Category> {
        let mut inner = self.lock()?;
        inner.check_parent(req.owner_id, None, req.parent_id)?;

        let id = inner.next_id();
        let now = Utc::now();
        let category = Category {
            id,
            name: req.name,
            slug: req.slug,
            description: req.description,
            icon: req.icon,
            color: req.color,
            parent_id: req.parent_id,
            archived: req.archived,
            public: req.public,
            initial: req.initial,
            owner_id: req.owner_id,
            created: now,
            updated: now,
            owner: None,
            parent: None,
        };
        inner.categories.insert(id, category.clone());
        Ok(inner.expand_category(&category, CategoryRelation::ALL))
    }

    async fn update(
        &self,
        id: i64,
        owner_id: i64,
        req: UpdateCategoryRequest,
    ) -> Result<Category> {
        let mut inner = self.lock()?;
        if !inner.owns_category(owner_id, id) {
            return Err(Error::NotFound(format!("Category {}", id)));
        }
        inner.check_parent(owner_id, Some(id), req.parent_id)?;

        let category = inner
            .categories
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Category {}", id)))?;
        category.name = req.name;
        category.slug = req.slug;
        category.description = req.description;
        category.icon = req.icon;
        category.color = req.color;
        category.parent_id = req.parent_id;
        category.archived = req.archived;
        category.public = req.public;
        category.updated = Utc::now();
        let category = category.clone();
        Ok(inner.expand_category(&category, CategoryRelation::ALL))
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        if !inner.owns_category(owner_id, id) {
            return Ok(false);
        }
        inner.categories.remove(&id);
        for child in inner.categories.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = None;
            }
        }
        for bookmark in inner.bookmarks.values_mut() {
            if bookmark.category_id == Some(id) {
                bookmark.category_id = None;
            }
        }
        Ok(true)
    }

    async fn count(&self, owner_id: i64) -> Result<i64> {
        let inner = self.lock()?;
        Ok(inner
            .categories
            .values()
            .filter(|c| c.owner_id == owner_id)
            .count() as i64)
    }
}

#[async_trait]
impl TagRepository for MemoryStore {
    async fn prepare_tags(&self, owner_id: i64, inputs: &[TagInput]) -> Result<Vec<i64>> {
        let mut inner = self.lock()?;
        let slots = inner.plan_tags(owner_id, inputs)?;
        Ok(inner.apply_tags(owner_id, slots))
    }

    async fn list(&self, owner_id: i64) -> Result<Vec<Tag>> {
        let inner = self.lock()?;
        let mut tags: Vec<Tag> = inner
            .tags
            .values()
            .filter(|t| t.owner_id == owner_id)
            .map(|t| Tag {
                bookmark_count: inner.links.iter().filter(|(_, tag)| *tag == t.id).count() as i64,
                ..t.clone()
            })
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_by_name(&self, owner_id: i64, name: &str) -> Result<Option<Tag>> {
        let inner = self.lock()?;
        Ok(inner
            .tag_id_by_name(owner_id, name.trim())
            .and_then(|id| inner.tags.get(&id))
            .map(|t| Tag {
                bookmark_count: inner.links.iter().filter(|(_, tag)| *tag == t.id).count() as i64,
                ..t.clone()
            }))
    }
}

#[async_trait]
impl BookmarkRepository for MemoryStore {
    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<Bookmark>> {
        let inner = self.lock()?;
        Ok(inner
            .bookmarks
            .get(&id)
            .filter(|b| b.owner_id == owner_id)
            .map(|b| inner.view_bookmark(b)))
    }

    async fn list(&self, owner_id: i64, req: &ListBookmarksRequest) -> Result<Vec<Bookmark>> {
        let inner = self.lock()?;
        let mut rows: Vec<Bookmark> = inner
            .bookmarks
            .values()
            .filter(|b| b.owner_id == owner_id)
            .filter(|b| req.category_id.is_none() || b.category_id == req.category_id)
            .cloned()
            .collect();

        let direction = req.order_direction.unwrap_or_default();
        match req.order_by {
            Some(BookmarkOrder::Title) => {
                sort_by_direction(&mut rows, direction, |b| (b.title.clone(), b.id))
            }
            Some(BookmarkOrder::Importance) => {
                sort_by_direction(&mut rows, direction, |b| (b.importance, b.id))
            }
            Some(BookmarkOrder::OpenedLast) => {
                sort_by_direction(&mut rows, direction, |b| (b.opened_last, b.id))
            }
            Some(BookmarkOrder::Created) => {
                sort_by_direction(&mut rows, direction, |b| (b.created, b.id))
            }
            None => sort_by_direction(&mut rows, SortDirection::Desc, |b| (b.created, b.id)),
        }

        Ok(paginate(rows, req.limit, req.offset()?)
            .iter()
            .map(|b| inner.view_bookmark(b))
            .collect())
    }

    async fn count(&self, owner_id: i64, category_id: Option<i64>) -> Result<i64> {
        let inner = self.lock()?;
        Ok(inner
            .bookmarks
            .values()
            .filter(|b| b.owner_id == owner_id)
            .filter(|b| category_id.is_none() || b.category_id == category_id)
            .count() as i64)
    }

    async fn create(&self, owner_id: i64, req: SaveBookmarkRequest) -> Result<Bookmark> {
        let mut inner = self.lock()?;
        let slots = inner.plan_tags(owner_id, &req.tags)?;
        inner.check_category(owner_id, req.draft.category_id)?;

        let tag_ids = inner.apply_tags(owner_id, slots);
        let main_image_id = req.main_image.as_ref().map(|f| inner.store_file(owner_id, f).id);
        let icon_id = req.icon.as_ref().map(|f| inner.store_file(owner_id, f).id);

        let id = inner.next_id();
        let now = Utc::now();
        let d = req.draft;
        let bookmark = Bookmark {
            id,
            url: d.url,
            domain: d.domain,
            title: d.title,
            description: d.description,
            author: d.author,
            content_text: d.content_text,
            content_html: d.content_html,
            content_type: d.content_type,
            content_published_date: d.content_published_date,
            note: d.note,
            main_image_url: d.main_image_url,
            icon_url: d.icon_url,
            main_image_id,
            icon_id,
            importance: d.importance,
            flagged: d.flagged,
            read: None,
            opened_times: 0,
            opened_last: None,
            category_id: d.category_id,
            owner_id,
            created: now,
            updated: now,
            tags: Vec::new(),
        };
        inner.bookmarks.insert(id, bookmark.clone());
        for tag_id in tag_ids {
            inner.links.insert((id, tag_id));
        }
        Ok(inner.view_bookmark(&bookmark))
    }

    async fn update(&self, id: i64, owner_id: i64, req: SaveBookmarkRequest) -> Result<Bookmark> {
        let mut inner = self.lock()?;
        if inner.owned_bookmark_mut(id, owner_id).is_none() {
            return Err(Error::NotFound(format!("Bookmark {}", id)));
        }
        let slots = inner.plan_tags(owner_id, &req.tags)?;
        inner.check_category(owner_id, req.draft.category_id)?;

        let tag_ids = inner.apply_tags(owner_id, slots);
        let main_image_id = req.main_image.as_ref().map(|f| inner.store_file(owner_id, f).id);
        let icon_id = req.icon.as_ref().map(|f| inner.store_file(owner_id, f).id);

        let d = req.draft;
        let bookmark = inner
            .owned_bookmark_mut(id, owner_id)
            .ok_or_else(|| Error::NotFound(format!("Bookmark {}", id)))?;
        bookmark.url = d.url;
        bookmark.domain = d.domain;
        bookmark.title = d.title;
        bookmark.description = d.description;
        bookmark.author = d.author;
        bookmark.content_text = d.content_text;
        bookmark.content_html = d.content_html;
        bookmark.content_type = d.content_type;
        bookmark.content_published_date = d.content_published_date;
        bookmark.note = d.note;
        bookmark.main_image_url = d.main_image_url;
        bookmark.icon_url = d.icon_url;
        if main_image_id.is_some() {
            bookmark.main_image_id = main_image_id;
        }
        if icon_id.is_some() {
            bookmark.icon_id = icon_id;
        }
        bookmark.importance = d.importance;
        bookmark.flagged = d.flagged;
        bookmark.category_id = d.category_id;
        bookmark.updated = Utc::now();
        let bookmark = bookmark.clone();

        inner.links.retain(|(b, t)| *b != id || tag_ids.contains(t));
        for tag_id in tag_ids {
            inner.links.insert((id, tag_id));
        }
        Ok(inner.view_bookmark(&bookmark))
    }

    async fn update_status(
        &self,
        id: i64,
        owner_id: i64,
        patch: BookmarkStatusPatch,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(bookmark) = inner.owned_bookmark_mut(id, owner_id) else {
            return Ok(false);
        };
        if let Some(flagged) = patch.flagged {
            bookmark.flagged = flagged;
        }
        if let Some(read) = patch.read {
            bookmark.read = read;
        }
        if let Some(importance) = patch.importance {
            bookmark.importance = importance;
        }
        bookmark.updated = Utc::now();
        Ok(true)
    }

    async fn increment_opened(&self, id: i64, owner_id: i64) -> Result<Option<i32>> {
        let mut inner = self.lock()?;
        Ok(inner.owned_bookmark_mut(id, owner_id).map(|bookmark| {
            bookmark.opened_times += 1;
            bookmark.opened_last = Some(Utc::now());
            bookmark.opened_times
        }))
    }

    async fn delete(&self, id: i64, owner_id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        if inner.owned_bookmark_mut(id, owner_id).is_none() {
            return Ok(false);
        }
        inner.bookmarks.remove(&id);
        inner.links.retain(|(b, _)| *b != id);
        Ok(true)
    }

    async fn add_tag(&self, bookmark_id: i64, owner_id: i64, tag_id: i64) -> Result<()> {
        let mut inner = self.lock()?;
        let tag_owned = inner.tags.get(&tag_id).is_some_and(|t| t.owner_id == owner_id);
        if inner.owned_bookmark_mut(bookmark_id, owner_id).is_none() || !tag_owned {
            return Err(Error::NotFound(format!(
                "Bookmark {} or tag {}",
                bookmark_id, tag_id
            )));
        }
        inner.links.insert((bookmark_id, tag_id));
        Ok(())
    }
}

#[async_trait]
impl FileRepository for MemoryStore {
    async fn store_file(&self, owner_id: i64, file: NewFile) -> Result<StoredFile> {
        Ok(self.lock()?.store_file(owner_id, &file))
    }

    async fn get(&self, id: i64, owner_id: i64) -> Result<Option<StoredFile>> {
        let inner = self.lock()?;
        Ok(inner
            .files
            .get(&id)
            .filter(|(f, _)| f.owner_id == owner_id)
            .map(|(f, _)| f.clone()))
    }

    async fn read(&self, id: i64, owner_id: i64) -> Result<Option<(StoredFile, Vec<u8>)>> {
        let inner = self.lock()?;
        Ok(inner
            .files
            .get(&id)
            .filter(|(f, _)| f.owner_id == owner_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markbox_core::BookmarkDraft;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_user(1, "alice").unwrap();
        store.insert_user(2, "bob").unwrap();
        store
    }

    fn draft(title: &str) -> BookmarkDraft {
        BookmarkDraft {
            url: format!("https://example.com/{}", title),
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn category(owner_id: i64, name: &str) -> CreateCategoryRequest {
        CreateCategoryRequest {
            owner_id,
            name: name.to_string(),
            slug: markbox_core::create_slug(name),
            description: None,
            icon: None,
            color: None,
            parent_id: None,
            archived: None,
            public: None,
            initial: false,
        }
    }

    #[tokio::test]
    async fn prepare_tags_is_idempotent() {
        let store = store();
        let first = TagRepository::prepare_tags(&store, 1, &[TagInput::name("rust")])
            .await
            .unwrap();
        let second = TagRepository::prepare_tags(&store, 1, &[TagInput::name(" rust ")])
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(TagRepository::list(&store, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn prepare_tags_rejects_foreign_id() {
        let store = store();
        let bobs = TagRepository::prepare_tags(&store, 2, &[TagInput::name("private")])
            .await
            .unwrap();
        let err = TagRepository::prepare_tags(&store, 1, &[TagInput::Id(bobs[0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn prepare_tags_dedupes_and_skips_blank() {
        let store = store();
        let ids = TagRepository::prepare_tags(
            &store,
            1,
            &[TagInput::name("a"), TagInput::name(""), TagInput::name("a")],
        )
        .await
        .unwrap();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn owner_isolation_for_bookmarks() {
        let store = store();
        let created = BookmarkRepository::create(
            &store,
            2,
            SaveBookmarkRequest {
                draft: draft("secret"),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(BookmarkRepository::get(&store, created.id, 1).await.unwrap().is_none());
        assert!(!BookmarkRepository::delete(&store, created.id, 1).await.unwrap());
        assert_eq!(
            BookmarkRepository::increment_opened(&store, created.id, 1)
                .await
                .unwrap(),
            None
        );
        assert!(BookmarkRepository::get(&store, created.id, 2).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_save_writes_nothing() {
        let store = store();
        let before = store.row_count().unwrap();
        let err = BookmarkRepository::create(
            &store,
            1,
            SaveBookmarkRequest {
                draft: BookmarkDraft {
                    category_id: Some(999),
                    ..draft("orphan")
                },
                tags: vec![TagInput::name("new-tag")],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.row_count().unwrap(), before);
    }

    #[tokio::test]
    async fn update_replaces_tag_set() {
        let store = store();
        let created = BookmarkRepository::create(
            &store,
            1,
            SaveBookmarkRequest {
                draft: draft("post"),
                tags: vec![TagInput::name("old"), TagInput::name("kept")],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let updated = BookmarkRepository::update(
            &store,
            created.id,
            1,
            SaveBookmarkRequest {
                draft: draft("post"),
                tags: vec![TagInput::name("kept"), TagInput::name("new")],
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let names: Vec<_> = updated.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["kept", "new"]);
    }

    #[tokio::test]
    async fn deleting_category_detaches_children_and_bookmarks() {
        let store = store();
        let parent = CategoryRepository::create(&store, category(1, "Parent")).await.unwrap();
        let child = CategoryRepository::create(
            &store,
            CreateCategoryRequest {
                parent_id: Some(parent.id),
                ..category(1, "Child")
            },
        )
        .await
        .unwrap();
        assert_eq!(child.parent.as_ref().map(|p| p.id), Some(parent.id));

        let bookmark = BookmarkRepository::create(
            &store,
            1,
            SaveBookmarkRequest {
                draft: BookmarkDraft {
                    category_id: Some(parent.id),
                    ..draft("x")
                },
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(CategoryRepository::delete(&store, parent.id, 1).await.unwrap());
        let child = CategoryRepository::get(&store, child.id, 1, &[]).await.unwrap().unwrap();
        assert_eq!(child.parent_id, None);
        let bookmark = BookmarkRepository::get(&store, bookmark.id, 1).await.unwrap().unwrap();
        assert_eq!(bookmark.category_id, None);
    }

    #[tokio::test]
    async fn category_cannot_move_under_descendant() {
        let store = store();
        let top = CategoryRepository::create(&store, category(1, "Top")).await.unwrap();
        let mid = CategoryRepository::create(
            &store,
            CreateCategoryRequest {
                parent_id: Some(top.id),
                ..category(1, "Mid")
            },
        )
        .await
        .unwrap();
        let leaf = CategoryRepository::create(
            &store,
            CreateCategoryRequest {
                parent_id: Some(mid.id),
                ..category(1, "Leaf")
            },
        )
        .await
        .unwrap();

        let move_top = |parent_id| UpdateCategoryRequest {
            name: "Top".to_string(),
            slug: "top".to_string(),
            description: None,
            icon: None,
            color: None,
            parent_id,
            archived: None,
            public: None,
        };
        let err = CategoryRepository::update(&store, top.id, 1, move_top(Some(leaf.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let top_now = CategoryRepository::get(&store, top.id, 1, &[]).await.unwrap().unwrap();
        assert_eq!(top_now.parent_id, None);

        // Moving a leaf elsewhere in the tree is still allowed.
        let other = CategoryRepository::create(&store, category(1, "Other")).await.unwrap();
        CategoryRepository::update(&store, top.id, 1, move_top(Some(other.id)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn category_list_paginates() {
        let store = store();
        for i in 0..25 {
            CategoryRepository::create(&store, category(1, &format!("cat {:02}", i)))
                .await
                .unwrap();
        }
        let page = CategoryRepository::list(
            &store,
            1,
            &ListCategoriesRequest {
                order_by: Some(CategoryOrder::Name),
                order_direction: Some(SortDirection::Asc),
                limit: Some(10),
                page: Some(2),
            },
            &[],
        )
        .await
        .unwrap();
        let names: Vec<_> = page.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"cat 10"));
        assert_eq!(names.len(), 10);
    }
}
