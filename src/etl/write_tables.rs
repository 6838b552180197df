use std::fs::{create_dir_all, File};
use std::path::Path;

use csv::{Writer, WriterBuilder};
use serde::Serialize;

use crate::data::{ShapedElement, Table};
use crate::errors::{Error, ErrorKind, Result};

/// The five CSV output tables of one run.
///
/// Files are truncated and given their header row on creation. Every writer is
/// flushed when the value is dropped, so rows written before a failure stay on disk.
pub struct Tables {
    nodes: Writer<File>,
    nodes_tags: Writer<File>,
    ways: Writer<File>,
    ways_nodes: Writer<File>,
    ways_tags: Writer<File>,
}

fn open_table(dir: &Path, table: Table) -> Result<Writer<File>> {
    let path = dir.join(table.file_name());
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(|err| Error::new(ErrorKind::Io, format!("could not create {}: {}", path.display(), err)))?;
    writer.write_record(table.columns())?;
    writer.flush()?;
    Ok(writer)
}

fn write_rows<R: Serialize>(writer: &mut Writer<File>, rows: &[R]) -> Result<()> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(())
}

impl Tables {
    pub fn create(dir: &Path) -> Result<Tables> {
        create_dir_all(dir)?;
        Ok(Tables {
            nodes: open_table(dir, Table::Nodes)?,
            nodes_tags: open_table(dir, Table::NodesTags)?,
            ways: open_table(dir, Table::Ways)?,
            ways_nodes: open_table(dir, Table::WaysNodes)?,
            ways_tags: open_table(dir, Table::WaysTags)?,
        })
    }

    /// Appends the parent row first, then tags, then (for ways) way nodes.
    pub fn write(&mut self, shaped: &ShapedElement) -> Result<()> {
        match shaped {
            ShapedElement::Node { node, tags } => {
                self.nodes.serialize(node)?;
                write_rows(&mut self.nodes_tags, tags)?;
            },
            ShapedElement::Way { way, nodes, tags } => {
                self.ways.serialize(way)?;
                write_rows(&mut self.ways_tags, tags)?;
                write_rows(&mut self.ways_nodes, nodes)?;
            },
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for writer in [
            &mut self.nodes,
            &mut self.nodes_tags,
            &mut self.ways,
            &mut self.ways_nodes,
            &mut self.ways_tags,
        ] {
            writer.flush()?;
        }
        Ok(())
    }
}
