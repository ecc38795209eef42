//! Entities and databases shared by the unit tests.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use tablekit_core::attribute::{
    get_datetime, get_number, get_optional_string, get_string, Item,
};
use tablekit_core::context::Context;
use tablekit_core::schema::{EntitySchema, KeyAttribute, KeySchema, Projection};
use tablekit_core::storage::{Entity, NaturalKey, Result};

use crate::config::Config;
use crate::database::Database;
use crate::storage::InMemoryStore;

// ============================================================================
// SimpleThing
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleThing {
    pub name: String,
}

impl SimpleThing {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

static SIMPLE_THING_SCHEMA: LazyLock<EntitySchema> =
    LazyLock::new(|| EntitySchema::new("SimpleThing", KeyAttribute::string("name")));

impl Entity for SimpleThing {
    fn schema() -> &'static EntitySchema {
        &SIMPLE_THING_SCHEMA
    }

    fn to_item(&self) -> Result<Item> {
        let mut item = Item::new();
        item.insert("name".to_string(), self.name.as_str().into());
        Ok(item)
    }

    fn from_item(item: &Item) -> Result<Self> {
        Ok(Self {
            name: get_string(item, "name")?,
        })
    }
}

// ============================================================================
// Thing
// ============================================================================

/// Versioned entity with a unique id, a creation-time index and a sparse
/// category index.
#[derive(Debug, Clone, PartialEq)]
pub struct Thing {
    pub name: String,
    pub version: i64,
    pub id: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

static THING_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("Thing", KeyAttribute::string("name"))
        .with_range(KeyAttribute::number("version"))
        .with_index(
            "thingID",
            KeySchema::new(KeyAttribute::string("id")),
            Projection::All,
        )
        .with_index(
            "name-createdAt",
            KeySchema::new(KeyAttribute::string("name"))
                .with_range(KeyAttribute::string("createdAt")),
            Projection::All,
        )
        .with_index(
            "category",
            KeySchema::new(KeyAttribute::string("category")),
            Projection::All,
        )
});

impl Entity for Thing {
    fn schema() -> &'static EntitySchema {
        &THING_SCHEMA
    }

    fn to_item(&self) -> Result<Item> {
        let mut item = Item::new();
        item.insert("name".to_string(), self.name.as_str().into());
        item.insert("version".to_string(), self.version.into());
        item.insert("id".to_string(), self.id.as_str().into());
        item.insert("createdAt".to_string(), self.created_at.into());
        if let Some(category) = &self.category {
            item.insert("category".to_string(), category.into());
        }
        Ok(item)
    }

    fn from_item(item: &Item) -> Result<Self> {
        Ok(Self {
            name: get_string(item, "name")?,
            version: get_number(item, "version")?,
            id: get_string(item, "id")?,
            category: get_optional_string(item, "category"),
            created_at: get_datetime(item, "createdAt")?,
        })
    }
}

pub fn thing(name: &str, version: i64) -> Thing {
    let created_at = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default();
    Thing {
        name: name.to_string(),
        version,
        id: format!("{name}-{version}"),
        category: None,
        created_at,
    }
}

pub fn thing_created(name: &str, version: i64, created_at: &str) -> Thing {
    Thing {
        created_at: DateTime::parse_from_rfc3339(created_at)
            .unwrap()
            .with_timezone(&Utc),
        ..thing(name, version)
    }
}

pub fn thing_key(name: &str, version: i64) -> NaturalKey {
    NaturalKey::new().with("name", name).with("version", version)
}

// ============================================================================
// ThingWithCompositeAttributes
// ============================================================================

/// Entity whose hash key and index key are composed from other fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ThingWithCompositeAttributes {
    pub name: String,
    pub branch: String,
    pub date: String,
    pub version: i64,
}

impl ThingWithCompositeAttributes {
    pub fn new(name: &str, branch: &str, date: &str, version: i64) -> Self {
        Self {
            name: name.to_string(),
            branch: branch.to_string(),
            date: date.to_string(),
            version,
        }
    }
}

static COMPOSITE_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new(
        "ThingWithCompositeAttributes",
        KeyAttribute::string("name_branch"),
    )
    .with_range(KeyAttribute::string("date"))
    .with_composite(
        "name_branch",
        vec![KeyAttribute::string("name"), KeyAttribute::string("branch")],
        '@',
    )
    .with_composite(
        "name_version",
        vec![KeyAttribute::string("name"), KeyAttribute::number("version")],
        ':',
    )
    .with_index(
        "nameVersion",
        KeySchema::new(KeyAttribute::string("name_version"))
            .with_range(KeyAttribute::string("date")),
        Projection::KeysOnly,
    )
});

impl Entity for ThingWithCompositeAttributes {
    fn schema() -> &'static EntitySchema {
        &COMPOSITE_SCHEMA
    }

    fn to_item(&self) -> Result<Item> {
        let mut item = Item::new();
        item.insert("name".to_string(), self.name.as_str().into());
        item.insert("branch".to_string(), self.branch.as_str().into());
        item.insert("date".to_string(), self.date.as_str().into());
        item.insert("version".to_string(), self.version.into());
        Ok(item)
    }

    fn from_item(item: &Item) -> Result<Self> {
        Ok(Self {
            name: get_string(item, "name")?,
            branch: get_string(item, "branch")?,
            date: get_string(item, "date")?,
            version: get_number(item, "version")?,
        })
    }
}

// ============================================================================
// Note
// ============================================================================

/// Entity whose schema allows overwrites, with an INCLUDE-projected index.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub name: String,
    pub body: String,
    pub author: Option<String>,
    pub tags: Option<String>,
}

impl Note {
    pub fn new(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            body: body.to_string(),
            author: None,
            tags: None,
        }
    }
}

static NOTE_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
    EntitySchema::new("Note", KeyAttribute::string("name"))
        .with_index(
            "byAuthor",
            KeySchema::new(KeyAttribute::string("author")),
            Projection::Include(vec!["body".to_string()]),
        )
        .allow_overwrites()
});

impl Entity for Note {
    fn schema() -> &'static EntitySchema {
        &NOTE_SCHEMA
    }

    fn to_item(&self) -> Result<Item> {
        let mut item = Item::new();
        item.insert("name".to_string(), self.name.as_str().into());
        item.insert("body".to_string(), self.body.as_str().into());
        if let Some(author) = &self.author {
            item.insert("author".to_string(), author.into());
        }
        if let Some(tags) = &self.tags {
            item.insert("tags".to_string(), tags.into());
        }
        Ok(item)
    }

    fn from_item(item: &Item) -> Result<Self> {
        Ok(Self {
            name: get_string(item, "name")?,
            body: get_string(item, "body")?,
            author: get_optional_string(item, "author"),
            tags: get_optional_string(item, "tags"),
        })
    }
}

// ============================================================================
// Databases
// ============================================================================

/// Database with prefix "test" and no tables.
pub fn empty_database() -> Database<InMemoryStore> {
    Database::new(InMemoryStore::new(), Config::default().with_prefix("test"))
}

/// Database with every fixture table created.
pub async fn database() -> Database<InMemoryStore> {
    with_tables(empty_database()).await
}

/// Database whose tables read `page_size` items per request.
pub async fn database_with_page_size(page_size: usize) -> Database<InMemoryStore> {
    let config = Config::default()
        .with_prefix("test")
        .with_page_size(page_size);
    with_tables(Database::new(InMemoryStore::new(), config)).await
}

async fn with_tables(db: Database<InMemoryStore>) -> Database<InMemoryStore> {
    let ctx = Context::background();
    db.table::<SimpleThing>().create(&ctx).await.unwrap();
    db.table::<Thing>().create(&ctx).await.unwrap();
    db.table::<ThingWithCompositeAttributes>()
        .create(&ctx)
        .await
        .unwrap();
    db.table::<Note>().create(&ctx).await.unwrap();
    db
}
