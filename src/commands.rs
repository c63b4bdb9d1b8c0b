//! The `load`, `dump` and `flush` operations behind the command-line tool,
//! written against the [`Datastore`] seam so any store can back them.
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::datastore::Datastore;
use crate::deserialize::{DeserializeOptions, deserialize};
use crate::error::Result;
use crate::model::Model;
use crate::record::read_records;
use crate::registry::{ModelRegistry, Registry};
use crate::serialize::serialize;
use crate::settings::LoadContext;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub installed: usize,
    pub skipped: usize,
    pub fixtures: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub removed: usize,
    /// Objects reinstalled from the initial data fixture.
    pub installed: usize,
}

/// Loads the fixtures in order and saves every deserialized object.
///
/// Without `keep_going` the first failing record aborts the load; objects
/// saved before it stay saved.
pub fn load_fixtures(
    store: &dyn Datastore,
    registry: &dyn ModelRegistry,
    context: &LoadContext,
    fixtures: &[PathBuf],
    options: &DeserializeOptions,
    keep_going: bool,
) -> Result<LoadSummary> {
    let mut summary = LoadSummary {
        fixtures: fixtures.len(),
        ..LoadSummary::default()
    };
    for fixture in fixtures {
        let records = read_records(BufReader::new(File::open(fixture)?))?;
        for object in deserialize(records, registry, store, context, options)? {
            match object.and_then(|mut object| object.save(store)) {
                Ok(_) => summary.installed += 1,
                Err(e) if keep_going => {
                    warn!(fixture = %fixture.display(), error = %e, "skipping record");
                    summary.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
    info!(
        skipped = summary.skipped,
        "Installed {} object(s) from {} fixture(s)", summary.installed, summary.fixtures
    );
    Ok(summary)
}

/// Writes every stored entity as a pretty-printed JSON array of records,
/// ancestors first, and returns how many were written.
pub fn dump<W: Write>(store: &dyn Datastore, registry: &Registry, mut writer: W) -> Result<usize> {
    let mut models = Vec::new();
    for entity in store.scan()? {
        let descriptor = registry.resolve_kind(entity.kind())?;
        models.push(Model::from_entity(descriptor, entity)?);
    }
    let records = serialize(&models);
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writeln!(writer)?;
    writer.flush()?;
    info!(entities = records.len(), "dumped datastore");
    Ok(records.len())
}

/// Deletes every stored entity, then reinstalls `initial_data` when that
/// fixture exists.
pub fn flush(
    store: &dyn Datastore,
    registry: &dyn ModelRegistry,
    context: &LoadContext,
    initial_data: &Path,
    options: &DeserializeOptions,
) -> Result<FlushSummary> {
    let removed = store.flush()?;
    let installed = if initial_data.is_file() {
        load_fixtures(store, registry, context, &[initial_data.to_path_buf()], options, false)?.installed
    } else {
        debug!(fixture = %initial_data.display(), "no initial data");
        0
    };
    info!(removed, installed, "flushed datastore");
    Ok(FlushSummary { removed, installed })
}
