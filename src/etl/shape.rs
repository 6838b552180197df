use crate::data::osm::{Attributes, Element, ElementKind};
use crate::data::{NodeRecord, ShapedElement, TagRecord, WayNodeRecord, WayRecord};
use crate::errors::Result;
use crate::normalize::{
    normalize_city, normalize_city_legacy, normalize_postcode, normalize_street, Compatibility,
    StreetMapping,
};

pub const DEFAULT_TAG_TYPE: &str = "regular";
pub const FIXME_PREFIX: &str = "fixme:";

/// Characters that disqualify a raw tag key. Tags with such keys are dropped.
const PROBLEM_CHARS: [char; 20] = [
    '=', '+', '/', '&', '<', '>', ';', '\'', '"', '?', '%', '#', '$', '@', ',', '.', ' ', '\t',
    '\r', '\n',
];

pub fn has_problem_chars(raw_key: &str) -> bool {
    raw_key.contains(&PROBLEM_CHARS[..])
}

/// Splits a raw tag key into `(type, key)` at the first colon.
pub fn split_key(raw_key: &str) -> (&str, &str) {
    raw_key.split_once(':').unwrap_or((DEFAULT_TAG_TYPE, raw_key))
}

/// Shapes source elements into table records, auditing city, street and postcode values.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    mapping: StreetMapping,
    compat: Compatibility,
}

impl Extractor {
    pub fn new(mapping: StreetMapping, compat: Compatibility) -> Extractor {
        Extractor { mapping, compat }
    }

    pub fn extract(&self, element: &Element) -> Result<ShapedElement> {
        match element.kind {
            ElementKind::Node => {
                let node = NodeRecord::from_attributes(&element.attributes)?;
                let tags = self.shape_tags(&node.id, element)?;
                Ok(ShapedElement::Node { node, tags })
            },
            ElementKind::Way => {
                let way = WayRecord::from_attributes(&element.attributes)?;
                let tags = self.shape_tags(&way.id, element)?;
                let nodes = element.nds.iter()
                    .enumerate()
                    .map(|(position, nd)| {
                        Ok(WayNodeRecord {
                            id: way.id.clone(),
                            node_id: nd.require_child("nd", &way.id, "ref")?.to_string(),
                            position,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ShapedElement::Way { way, nodes, tags })
            },
        }
    }

    fn shape_tags(&self, id: &str, element: &Element) -> Result<Vec<TagRecord>> {
        let mut tags = Vec::with_capacity(element.tags.len());
        for tag in &element.tags {
            if let Some(record) = self.shape_tag(id, tag)? {
                tags.push(record);
            }
        }
        Ok(tags)
    }

    fn shape_tag(&self, id: &str, tag: &Attributes) -> Result<Option<TagRecord>> {
        let value = tag.require_child("tag", id, "v")?;
        let raw_key = tag.require_child("tag", id, "k")?;
        if has_problem_chars(raw_key) {
            return Ok(None);
        }
        let (tag_type, key) = split_key(raw_key);

        Ok(Some(TagRecord {
            id: id.to_string(),
            key: key.to_string(),
            value: self.audit_value(key, value),
            tag_type: tag_type.to_string(),
        }))
    }

    fn audit_value(&self, key: &str, value: &str) -> String {
        let mut value = value.to_string();

        if key == "city" {
            value = if self.compat.legacy_city_suffix {
                normalize_city_legacy(&value)
            } else {
                normalize_city(&value)
            };
        }

        if self.compat.legacy_street_scope || key == "street" || key == "street:name" {
            value = normalize_street(&value, &self.mapping);
        }

        if key == "postcode" {
            let (invalid, postcode) = normalize_postcode(&value);
            value = if invalid {
                format!("{}{}", FIXME_PREFIX, postcode)
            } else {
                postcode
            };
        }

        value
    }
}
