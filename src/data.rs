use serde::Serialize;

use crate::errors::Result;

use self::osm::Attributes;

pub mod osm;

pub const NODE_FIELDS: &[&str] = &["id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp"];
pub const WAY_FIELDS: &[&str] = &["id", "user", "uid", "version", "changeset", "timestamp"];
pub const TAG_FIELDS: &[&str] = &["id", "key", "value", "type"];
pub const WAY_NODE_FIELDS: &[&str] = &["id", "node_id", "position"];

/// A flat record that becomes one row of an output table.
pub trait Row: Serialize {
    const COLUMNS: &'static [&'static str];

    /// Column name and textual value pairs, in column order.
    fn fields(&self) -> Vec<(&'static str, String)>;
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: String,
    pub lat: String,
    pub lon: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

impl NodeRecord {
    pub fn from_attributes(attributes: &Attributes) -> Result<NodeRecord> {
        let get = |name: &str| attributes.require("node", name).map(str::to_string);
        Ok(NodeRecord {
            id: get("id")?,
            lat: get("lat")?,
            lon: get("lon")?,
            user: get("user")?,
            uid: get("uid")?,
            version: get("version")?,
            changeset: get("changeset")?,
            timestamp: get("timestamp")?,
        })
    }
}

impl Row for NodeRecord {
    const COLUMNS: &'static [&'static str] = NODE_FIELDS;

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("lat", self.lat.clone()),
            ("lon", self.lon.clone()),
            ("user", self.user.clone()),
            ("uid", self.uid.clone()),
            ("version", self.version.clone()),
            ("changeset", self.changeset.clone()),
            ("timestamp", self.timestamp.clone()),
        ]
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WayRecord {
    pub id: String,
    pub user: String,
    pub uid: String,
    pub version: String,
    pub changeset: String,
    pub timestamp: String,
}

impl WayRecord {
    pub fn from_attributes(attributes: &Attributes) -> Result<WayRecord> {
        let get = |name: &str| attributes.require("way", name).map(str::to_string);
        Ok(WayRecord {
            id: get("id")?,
            user: get("user")?,
            uid: get("uid")?,
            version: get("version")?,
            changeset: get("changeset")?,
            timestamp: get("timestamp")?,
        })
    }
}

impl Row for WayRecord {
    const COLUMNS: &'static [&'static str] = WAY_FIELDS;

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("user", self.user.clone()),
            ("uid", self.uid.clone()),
            ("version", self.version.clone()),
            ("changeset", self.changeset.clone()),
            ("timestamp", self.timestamp.clone()),
        ]
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

impl Row for TagRecord {
    const COLUMNS: &'static [&'static str] = TAG_FIELDS;

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("key", self.key.clone()),
            ("value", self.value.clone()),
            ("type", self.tag_type.clone()),
        ]
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WayNodeRecord {
    pub id: String,
    pub node_id: String,
    pub position: usize,
}

impl Row for WayNodeRecord {
    const COLUMNS: &'static [&'static str] = WAY_NODE_FIELDS;

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("node_id", self.node_id.clone()),
            ("position", self.position.to_string()),
        ]
    }
}

/// All records produced from a single source element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapedElement {
    Node {
        node: NodeRecord,
        tags: Vec<TagRecord>,
    },
    Way {
        way: WayRecord,
        nodes: Vec<WayNodeRecord>,
        tags: Vec<TagRecord>,
    },
}

impl ShapedElement {
    pub fn id(&self) -> &str {
        match self {
            ShapedElement::Node { node, .. } => &node.id,
            ShapedElement::Way { way, .. } => &way.id,
        }
    }

    pub fn tags(&self) -> &[TagRecord] {
        match self {
            ShapedElement::Node { tags, .. } | ShapedElement::Way { tags, .. } => tags,
        }
    }
}

/// The five output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Nodes,
    NodesTags,
    Ways,
    WaysNodes,
    WaysTags,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Table::Nodes,
        Table::NodesTags,
        Table::Ways,
        Table::WaysNodes,
        Table::WaysTags,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Table::Nodes => "nodes.csv",
            Table::NodesTags => "nodes_tags.csv",
            Table::Ways => "ways.csv",
            Table::WaysNodes => "ways_nodes.csv",
            Table::WaysTags => "ways_tags.csv",
        }
    }

    /// Section name used for this table's records in the validation schema.
    pub fn section(&self) -> &'static str {
        match self {
            Table::Nodes => "node",
            Table::NodesTags => "node_tags",
            Table::Ways => "way",
            Table::WaysNodes => "way_nodes",
            Table::WaysTags => "way_tags",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Nodes => NodeRecord::COLUMNS,
            Table::NodesTags | Table::WaysTags => TagRecord::COLUMNS,
            Table::Ways => WayRecord::COLUMNS,
            Table::WaysNodes => WayNodeRecord::COLUMNS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_record_copies_attributes_verbatim() {
        let attributes: Attributes = [
            ("id", "1"), ("lat", "47.1"), ("lon", "-122.3"), ("user", "u"),
            ("uid", "2"), ("version", "1"), ("changeset", "3"), ("timestamp", "t"),
            ("visible", "true"),
        ].into_iter().collect();

        let node = NodeRecord::from_attributes(&attributes).unwrap();
        let values: Vec<String> = node.fields().into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec!["1", "47.1", "-122.3", "u", "2", "1", "3", "t"]);
    }

    #[test]
    fn way_record_requires_every_field() {
        let attributes: Attributes = [
            ("id", "9"), ("user", "u"), ("version", "1"), ("changeset", "3"), ("timestamp", "t"),
        ].into_iter().collect();

        let err = WayRecord::from_attributes(&attributes).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::MissingAttribute);
        assert!(err.message.contains("'uid'"));
    }

    #[test]
    fn field_lists_follow_column_order() {
        for table in Table::ALL {
            assert!(!table.columns().is_empty());
        }
        let tag = TagRecord {
            id: "1".into(),
            key: "city".into(),
            value: "Seattle".into(),
            tag_type: "addr".into(),
        };
        let names: Vec<&str> = tag.fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, TagRecord::COLUMNS);
    }
}
