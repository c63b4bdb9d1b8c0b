// used for persistence
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;

use crate::datastore::{Datastore, Entity};
use crate::error::{LoaddataError, Result};
use crate::key::Key;
use crate::model::FieldValue;

/// Where a [`SqliteDatastore`] keeps its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// ------------- Persistence -------------
pub struct SqliteDatastore {
    connection: Connection,
}

impl SqliteDatastore {
    pub fn new(mode: PersistenceMode) -> Result<Self> {
        let connection = match &mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        Self::with_connection(connection)
    }
    pub fn with_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(
            "
            create table if not exists Entity (
                Entity_Key text not null,
                Kind text not null,
                Parent_Key text null,
                Depth integer not null,
                Properties text not null,
                constraint unique_and_referenceable_Entity_Key primary key (
                    Entity_Key
                )
            );-- STRICT;
            create index if not exists Entity_by_Kind on Entity (Kind);
            ",
        )?;
        Ok(Self { connection })
    }
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .connection
            .query_row("select count(*) from Entity", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}

fn restore_properties(key: &str, properties: &str) -> Result<BTreeMap<String, FieldValue>> {
    serde_json::from_str(properties).map_err(|e| {
        LoaddataError::Persistence(format!("stored properties of {} are corrupt: {}", key, e))
    })
}

impl Datastore for SqliteDatastore {
    fn get(&self, key: &Key) -> Result<Option<Entity>> {
        let key_text = key.to_string();
        let properties = self
            .connection
            .query_row(
                "
                select Properties
                    from Entity
                    where Entity_Key = ?
                ",
                params![&key_text],
                |r| r.get::<_, String>(0),
            )
            .optional()?;
        match properties {
            Some(properties) => Ok(Some(Entity::new(
                key.clone(),
                restore_properties(&key_text, &properties)?,
            ))),
            None => Ok(None),
        }
    }
    fn put(&self, entity: Entity) -> Result<()> {
        let key = entity.key();
        self.connection.execute(
            "
            insert or replace into Entity (
                Entity_Key,
                Kind,
                Parent_Key,
                Depth,
                Properties
            ) values (?, ?, ?, ?, ?)
            ",
            params![
                key.to_string(),
                key.kind(),
                key.parent().map(|p| p.to_string()),
                key.depth() as i64,
                serde_json::to_string(entity.properties())?
            ],
        )?;
        Ok(())
    }
    fn scan(&self) -> Result<Vec<Entity>> {
        let mut statement = self.connection.prepare(
            "
            select Entity_Key, Properties
                from Entity
                order by Depth, Entity_Key
            ",
        )?;
        let rows = statement.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))?;
        let mut entities = Vec::new();
        for row in rows {
            let (key_text, properties) = row?;
            let key: Key = key_text.parse().map_err(|e| {
                LoaddataError::Persistence(format!("stored key '{}' is corrupt: {}", key_text, e))
            })?;
            entities.push(Entity::new(key, restore_properties(&key_text, &properties)?));
        }
        entities.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(entities)
    }
    fn flush(&self) -> Result<usize> {
        Ok(self.connection.execute("delete from Entity", [])?)
    }
}
